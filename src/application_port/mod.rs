mod auth_service;
mod group_service;
mod log_service;
mod profile_service;

pub use auth_service::*;
pub use group_service::*;
pub use log_service::*;
pub use profile_service::*;
