// store

mod document;
mod document_store;
pub mod paths;

pub use document::*;
pub use document_store::*;

// collaborators

mod invite_code_generator;
mod repair_scheduler;

pub use invite_code_generator::*;
pub use repair_scheduler::*;
