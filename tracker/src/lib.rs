pub mod clock;
pub mod config;
pub mod driver;
pub mod location;
pub mod subscription;
