mod group;
mod invite;
mod log_entry;
mod user;

pub use group::*;
pub use invite::*;
pub use log_entry::*;
pub use user::*;
