//! Account management functionality
//!
//! This module keeps the ordered set of accounts derived from the session
//! seed and validates the addresses funds are sent to.

pub mod address;
mod registry;

pub use address::*;
pub use registry::*;
