//! Post-processing effects: the effect node, its pass, and the built-in pass
//! programs.

pub mod effect;
pub mod library;
pub mod pass;
