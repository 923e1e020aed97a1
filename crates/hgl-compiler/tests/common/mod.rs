//! Common utilities for compiler integration tests

mod fixtures;

pub use fixtures::*;
