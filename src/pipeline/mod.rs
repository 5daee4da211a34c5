//! Pipeline module - raster to trained models, one stage per file

pub mod balance;
pub mod cleaner;
pub mod export;
pub mod geotiff;
pub mod loader;
pub mod scaler;
pub mod split;
pub mod target;
pub mod trainer;

pub use balance::*;
pub use cleaner::*;
pub use export::*;
pub use loader::*;
pub use scaler::*;
pub use split::*;
pub use target::*;
pub use trainer::*;
