//! Scarp: Landslide Susceptibility Library
//!
//! Turns a ten-band terrain raster into a balanced, labelled pixel table and
//! compares a random forest, an RBF support vector machine and a neural
//! network on it.

pub mod cli;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod utils;
