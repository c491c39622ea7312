//! Wire-level constants and URL construction for the document store.

pub mod constants;
pub mod path;

pub use constants::*;
pub use path::*;
