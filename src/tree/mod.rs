//! Tree collaborator.
//!
//! The watcher only needs a narrow view of the tree it observes: selector
//! matching, subtree search, ordered child enumeration, and a way to be told
//! about nodes added under a given node. [`MemTree`] is the in-memory
//! implementation shipped with the crate.

mod mem_tree;
mod node;
pub use mem_tree::*;
pub use node::*;


use std::fmt::Debug;

#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::Result;

/// Identifies one live subscription handed out by [`Tree::subscribe`].
pub type SubscriptionId = u64;

/// Which mutations a subscription is told about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserveScope {
    /// Nodes added directly under the observed node
    Children,
    /// Nodes added or removed anywhere below the observed node
    Subtree,
}

/// One notification for a single tree operation: the nodes it added (in
/// insertion order) or the roots of the subtrees it removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationBatch<N> {
    pub added: Vec<N>,
    pub removed: Vec<N>,
}

impl<N> MutationBatch<N> {
    pub fn added(nodes: Vec<N>) -> Self {
        Self {
            added: nodes,
            removed: Vec::new(),
        }
    }

    pub fn removed(nodes: Vec<N>) -> Self {
        Self {
            added: Vec::new(),
            removed: nodes,
        }
    }
}

/// A live registration for mutation notifications.
///
/// Batches arrive on `receiver` in the order the tree produced them. The
/// registration stays live until [`Tree::unsubscribe`] is called with `id`.
#[derive(Debug)]
pub struct Subscription<N> {
    pub id: SubscriptionId,
    pub receiver: mpsc::UnboundedReceiver<MutationBatch<N>>,
}

#[cfg_attr(test, automock(type Node = crate::NodeId;))]
pub trait Tree: Send + Sync + 'static {
    type Node: Clone + Debug + PartialEq + Send + Sync + 'static;

    /// Node selectors are resolved against when no parent is given
    fn root(&self) -> Self::Node;

    /// Rejects selectors the tree cannot evaluate
    fn check_selector(
        &self,
        selector: &str,
    ) -> Result<()>;

    fn matches(
        &self,
        node: &Self::Node,
        selector: &str,
    ) -> bool;

    /// First descendant of `root` (document order) matching `selector`
    fn find(
        &self,
        root: &Self::Node,
        selector: &str,
    ) -> Option<Self::Node>;

    /// Direct children of `node` in document order
    fn children(
        &self,
        node: &Self::Node,
    ) -> Vec<Self::Node>;

    fn subscribe(
        &self,
        node: &Self::Node,
        scope: ObserveScope,
    ) -> Result<Subscription<Self::Node>>;

    /// Releases a subscription. Unknown or already released ids are ignored.
    fn unsubscribe(
        &self,
        id: SubscriptionId,
    );
}
