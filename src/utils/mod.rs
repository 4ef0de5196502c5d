//! Cross-cutting utilities.
//!
//! - [`log`]: leveled logging and the crate-wide log macros

pub mod log;
#[cfg(test)]
pub mod test_utils;
