// Models module for trolley-backend
// Records, capability caches and HTTP request/response shapes

pub mod capabilities;
pub mod cluster;
pub mod request;
pub mod response;

pub use capabilities::*;
pub use cluster::*;
pub use request::*;
pub use response::*;
