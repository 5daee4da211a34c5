//! Utility helpers - console styling and progress indicators

pub mod progress;
pub mod styling;

pub use progress::*;
pub use styling::*;
