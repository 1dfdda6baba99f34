pub const KEY_VALUES_TABLE_NAME: &str = "KeyValues";
pub const NAMESPACE: &str = "namespace";
pub const KEY: &str = "key";
pub const VALUE: &str = "value";
pub const UPDATED_AT: &str = "updated_at";
