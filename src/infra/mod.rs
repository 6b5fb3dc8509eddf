//! Store mechanics shared by the document store backends.

mod staging;

pub use staging::*;
