//! HTTP handlers

pub mod health;
pub mod datasets;
pub mod features;
pub mod predict;
pub mod training;
pub mod feedback;
