//! Small shared value types, time source, and the crate error type.

pub mod core;
pub mod error;
