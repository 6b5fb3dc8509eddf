mod optimistic;

mod auth_service_fake;
mod auth_service_impl;
mod group_service_impl;
mod invite_code_generator_nanoid;
mod log_service_impl;
mod profile_service_impl;

pub use auth_service_fake::*;
pub use auth_service_impl::*;
pub use group_service_impl::*;
pub use invite_code_generator_nanoid::*;
pub use log_service_impl::*;
pub use profile_service_impl::*;
