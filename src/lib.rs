//! Bounded, composable "wait until observed" resolution over a live tree.
//!
//! [`ElementWatcher`] watches a mutable, observable [`Tree`] for nodes
//! matching selectors:
//! - [`ElementWatcher::watch_children`]: direct children, one-shot or continuous
//! - [`ElementWatcher::watch_descendants`]: anywhere in a subtree
//! - [`ElementWatcher::watch_any_descendant`]: the first node added to an empty subtree
//! - [`ElementWatcher::watch_chain`]: a path of selectors resolved parent after
//!   parent under one deadline
//!
//! Every subscription is owned by exactly one [`WatchHandle`] or
//! [`ChainScope`] and is released deterministically.
//!
//! ```ignore
//! let tree = Arc::new(MemTree::new());
//! let watcher = ElementWatcher::new(tree.clone());
//! let outcome = watcher
//!     .watch_chain(&["#app", "main", "video"], |video| play(video), Some(Duration::from_secs(5)))
//!     .await?;
//! ```

mod config;
mod constants;
mod errors;
pub mod selector;
mod tree;
mod watcher;

pub use config::*;
pub use errors::*;
pub use tree::*;
pub use watcher::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub(crate) mod test_utils;
