pub mod capabilities_handler;
pub mod cluster_handler;
pub mod discovery_handler;
pub mod health_handler;
pub mod trigger_handler;

mod error;

pub use error::ApiError;
