//! Mocked [`Tree`](crate::Tree) collaborators.
//!
//! Used where a test has to count subscribe/unsubscribe calls exactly, or
//! drive notification batches by hand instead of through a `MemTree`.
mod mock_tree;

pub(crate) use mock_tree::*;
