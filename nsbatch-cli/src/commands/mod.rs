//! Mode handlers

pub mod batch;
pub mod status;
