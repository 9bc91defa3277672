//! Interactive layer over the reconciler
//!
//! 1. Displaying - render the plan
//! 2. Executing - confirm, apply with progress, summarize

pub mod differ;
pub mod executor;

pub use differ::display_plan;
pub use executor::{RunOptions, execute};
