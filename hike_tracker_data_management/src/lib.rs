use const_format::concatcp;
use hike_tracker_lib::error::SessionError;

pub mod store;
pub mod gpx_util;
mod data_manager;
mod hikes;
mod images;
mod social;
mod transfer;
mod users;

pub use data_manager::*;
pub use hikes::*;
pub use images::*;
pub use social::*;
pub use users::*;

pub const DATA_DIR: &str = "data/";
pub const DATABASE_PATH: &str = concatcp!(DATA_DIR, "hikes.db");

#[derive(Debug, thiserror::Error)]
pub enum DataManagerError {
    #[error("Database error: {0}")]
    Database(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No user is logged in")]
    NotLoggedIn,
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("GPX error: {0}")]
    Gpx(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}
