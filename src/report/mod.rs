//! Report module - comparing the trained models

pub mod export;
pub mod results;

pub use export::*;
pub use results::*;
