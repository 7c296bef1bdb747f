//! Schema module - Configuration and reporting types for search runs.

mod progress;
mod search;

pub use progress::*;
pub use search::*;
