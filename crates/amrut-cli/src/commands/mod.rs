//! Command implementations.

pub mod diff;
pub mod inspect;
pub mod review;
