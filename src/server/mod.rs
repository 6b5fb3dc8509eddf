mod repair_queue;
mod server;

pub use repair_queue::*;
pub use server::*;
