//! Route handlers

pub mod analyze;
pub mod pipeline;
pub mod stream;
