//! Utility modules.

pub mod bootstrap;
