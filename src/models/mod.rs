//! Data models

pub mod dataset;
pub mod feedback;
pub mod prediction;
pub mod training;

pub use dataset::*;
pub use feedback::*;
pub use prediction::*;
pub use training::*;
