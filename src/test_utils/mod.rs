//! Fixtures shared by the unit tests: an in-memory page, a handler recorder,
//! and mocked trees for subscription accounting.
mod common;
mod mock;

pub(crate) use common::*;
pub(crate) use mock::*;
