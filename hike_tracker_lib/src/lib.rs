pub mod error;
pub mod geo;
pub mod hike_record;
pub mod hike_session;
pub mod stats;
pub mod track_point;
