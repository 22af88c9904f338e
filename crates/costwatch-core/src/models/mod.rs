//! Data models for CostWatch

mod alert;
mod cost;

pub use alert::*;
pub use cost::*;
