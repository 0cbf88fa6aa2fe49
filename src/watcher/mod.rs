//! Element watching: one-shot and continuous child watches, subtree watches,
//! and selector chains bounded by a single deadline.

mod chain;
mod dispatch;
mod element_watcher;
mod handle;
mod request;
pub use chain::*;
pub use element_watcher::*;
pub use handle::WatchHandle;
pub use request::Handler;
pub use request::WatchRequest;

pub(crate) use handle::HandleInner;
pub(crate) use request::PendingSet;
