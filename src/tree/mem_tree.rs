use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::trace;
use tracing::warn;

use super::MutationBatch;
use super::NodeId;
use super::NodeSnapshot;
use super::NodeSpec;
use super::ObserveScope;
use super::Subscription;
use super::SubscriptionId;
use super::Tree;
use crate::selector::ElementTree;
use crate::selector::SelectorList;
use crate::Error;
use crate::Result;

/// In-memory, thread-safe DOM-like tree.
///
/// The root is a document node: it is never matched by a selector, so
/// `find(root, "html")` finds a top-level `<html>` element the way a
/// document query would. Every insertion notifies `Children` subscribers of
/// the parent and `Subtree` subscribers of the parent and all its ancestors,
/// with one batch per operation.
pub struct MemTree {
    state: RwLock<TreeState>,
    subscribers: DashMap<SubscriptionId, Subscriber>,
    selectors: DashMap<String, Arc<SelectorList>>,
    next_subscription_id: AtomicU64,
}

struct Subscriber {
    target: NodeId,
    scope: ObserveScope,
    sender: mpsc::UnboundedSender<MutationBatch<NodeId>>,
}

pub(crate) struct TreeState {
    nodes: Vec<Option<NodeData>>,
    root: NodeId,
}

struct NodeData {
    // `None` for the document node
    tag: Option<String>,
    attrs: BTreeMap<String, String>,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Default for MemTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemTree {
    pub fn new() -> Self {
        let document = NodeData {
            tag: None,
            attrs: BTreeMap::new(),
            parent: None,
            children: Vec::new(),
        };
        Self {
            state: RwLock::new(TreeState {
                nodes: vec![Some(document)],
                root: NodeId(0),
            }),
            subscribers: DashMap::new(),
            selectors: DashMap::new(),
            next_subscription_id: AtomicU64::new(1),
        }
    }

    pub fn root_id(&self) -> NodeId {
        self.state.read().root
    }

    /// Inserts `spec` (with its whole subtree) as the last child of `parent`.
    pub fn insert(
        &self,
        parent: NodeId,
        spec: NodeSpec,
    ) -> Result<NodeId> {
        let mut ids = self.append_batch(parent, vec![spec])?;
        ids.pop().ok_or(Error::UnknownNode(parent))
    }

    /// Appends several subtrees under `parent` as one mutation, so observers
    /// receive them in a single batch.
    pub fn append_batch(
        &self,
        parent: NodeId,
        specs: Vec<NodeSpec>,
    ) -> Result<Vec<NodeId>> {
        let mut state = self.state.write();
        if state.get(parent).is_none() {
            return Err(Error::UnknownNode(parent));
        }

        let added: Vec<NodeId> = specs.into_iter().map(|spec| state.build(parent, spec)).collect();
        if let Some(data) = state.get_mut(parent) {
            data.children.extend(added.iter().copied());
        }

        trace!(%parent, count = added.len(), "nodes appended");
        self.notify(&state, parent, MutationBatch::added(added.clone()));
        Ok(added)
    }

    /// Detaches `node` and its subtree. Subscriptions targeting a removed
    /// node are closed.
    pub fn remove(
        &self,
        node: NodeId,
    ) -> Result<()> {
        let mut state = self.state.write();
        if node == state.root {
            return Err(Error::RootRemoval);
        }
        let parent = state
            .get(node)
            .ok_or(Error::UnknownNode(node))?
            .parent
            .ok_or(Error::UnknownNode(node))?;

        if let Some(data) = state.get_mut(parent) {
            data.children.retain(|child| *child != node);
        }
        let removed = state.detach_subtree(node);
        self.subscribers.retain(|_, subscriber| !removed.contains(&subscriber.target));

        trace!(%node, count = removed.len(), "subtree removed");
        self.notify(&state, parent, MutationBatch::removed(vec![node]));
        Ok(())
    }

    /// Sets or replaces an attribute of `node`.
    ///
    /// Attribute changes are not child-list mutations: no subscriber is
    /// notified. A pending `watch_children` never re-offers a node it already
    /// saw, so a node that only starts matching through `set_attr` is not
    /// reported. `watch_descendants` re-runs its lookups on the next subtree
    /// batch and picks the change up then.
    pub fn set_attr(
        &self,
        node: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let mut state = self.state.write();
        let data = state.get_mut(node).ok_or(Error::UnknownNode(node))?;
        let key = key.into();
        trace!(%node, key = key.as_str(), "attribute set");
        data.attrs.insert(key, value.into());
        Ok(())
    }

    /// Snapshot of `node`, or `None` if it does not exist (or was removed).
    pub fn node(
        &self,
        id: NodeId,
    ) -> Option<NodeSnapshot> {
        self.state.read().get(id).map(|data| NodeSnapshot {
            id,
            tag: data.tag.clone(),
            attrs: data.attrs.clone(),
            parent: data.parent,
            children: data.children.clone(),
        })
    }

    pub fn contains(
        &self,
        node: NodeId,
    ) -> bool {
        self.state.read().get(node).is_some()
    }

    pub fn tag(
        &self,
        node: NodeId,
    ) -> Option<String> {
        self.state.read().get(node).and_then(|data| data.tag.clone())
    }

    pub fn attr(
        &self,
        node: NodeId,
        key: &str,
    ) -> Option<String> {
        self.state.read().get(node).and_then(|data| data.attrs.get(key).cloned())
    }

    pub fn parent(
        &self,
        node: NodeId,
    ) -> Option<NodeId> {
        self.state.read().get(node).and_then(|data| data.parent)
    }

    /// Number of subscriptions not yet released.
    pub fn live_subscriptions(&self) -> usize {
        self.subscribers.len()
    }

    fn selector(
        &self,
        selector: &str,
    ) -> Result<Arc<SelectorList>> {
        if let Some(parsed) = self.selectors.get(selector) {
            return Ok(parsed.clone());
        }
        let parsed = Arc::new(SelectorList::parse(selector)?);
        self.selectors.insert(selector.to_string(), parsed.clone());
        Ok(parsed)
    }

    fn parsed_or_warn(
        &self,
        selector: &str,
    ) -> Option<Arc<SelectorList>> {
        match self.selector(selector) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("ignoring selector: {}", e);
                None
            }
        }
    }

    // Called with the state lock held so batches keep operation order.
    fn notify(
        &self,
        state: &TreeState,
        parent: NodeId,
        batch: MutationBatch<NodeId>,
    ) {
        let ancestors = state.ancestors_inclusive(parent);
        for entry in self.subscribers.iter() {
            let subscriber = entry.value();
            let interested = match subscriber.scope {
                ObserveScope::Children => subscriber.target == parent && !batch.added.is_empty(),
                ObserveScope::Subtree => ancestors.contains(&subscriber.target),
            };
            if interested && subscriber.sender.send(batch.clone()).is_err() {
                trace!(subscription = entry.key(), "receiver already dropped");
            }
        }
    }
}

impl TreeState {
    fn get(
        &self,
        id: NodeId,
    ) -> Option<&NodeData> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    fn get_mut(
        &mut self,
        id: NodeId,
    ) -> Option<&mut NodeData> {
        self.nodes.get_mut(id.0).and_then(Option::as_mut)
    }

    fn build(
        &mut self,
        parent: NodeId,
        spec: NodeSpec,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Some(NodeData {
            tag: Some(spec.tag),
            attrs: spec.attrs,
            parent: Some(parent),
            children: Vec::new(),
        }));

        let children: Vec<NodeId> = spec.children.into_iter().map(|child| self.build(id, child)).collect();
        if let Some(data) = self.get_mut(id) {
            data.children = children;
        }
        id
    }

    fn detach_subtree(
        &mut self,
        node: NodeId,
    ) -> Vec<NodeId> {
        let mut removed = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(data) = self.nodes.get_mut(id.0).and_then(Option::take) {
                stack.extend(data.children);
                removed.push(id);
            }
        }
        removed
    }

    fn ancestors_inclusive(
        &self,
        node: NodeId,
    ) -> Vec<NodeId> {
        let mut chain = vec![node];
        let mut cursor = self.get(node).and_then(|data| data.parent);
        while let Some(id) = cursor {
            chain.push(id);
            cursor = self.get(id).and_then(|data| data.parent);
        }
        chain
    }

    /// Pre-order walk below `root`, stopping at the first node `visit` accepts.
    fn first_descendant(
        &self,
        root: NodeId,
        mut visit: impl FnMut(NodeId) -> bool,
    ) -> Option<NodeId> {
        let mut stack: Vec<NodeId> = self.get(root)?.children.iter().rev().copied().collect();
        while let Some(id) = stack.pop() {
            if visit(id) {
                return Some(id);
            }
            if let Some(data) = self.get(id) {
                stack.extend(data.children.iter().rev().copied());
            }
        }
        None
    }
}

impl ElementTree for TreeState {
    type Id = NodeId;

    fn tag_name(
        &self,
        id: NodeId,
    ) -> Option<&str> {
        self.get(id).and_then(|data| data.tag.as_deref())
    }

    fn attribute(
        &self,
        id: NodeId,
        name: &str,
    ) -> Option<&str> {
        self.get(id).and_then(|data| data.attrs.get(name).map(String::as_str))
    }

    fn parent_of(
        &self,
        id: NodeId,
    ) -> Option<NodeId> {
        self.get(id).and_then(|data| data.parent)
    }
}

impl Tree for MemTree {
    type Node = NodeId;

    fn root(&self) -> NodeId {
        self.root_id()
    }

    fn check_selector(
        &self,
        selector: &str,
    ) -> Result<()> {
        self.selector(selector).map(|_| ())
    }

    fn matches(
        &self,
        node: &NodeId,
        selector: &str,
    ) -> bool {
        let Some(parsed) = self.parsed_or_warn(selector) else {
            return false;
        };
        parsed.matches(&*self.state.read(), *node)
    }

    fn find(
        &self,
        root: &NodeId,
        selector: &str,
    ) -> Option<NodeId> {
        let parsed = self.parsed_or_warn(selector)?;
        let state = self.state.read();
        state.first_descendant(*root, |id| parsed.matches(&*state, id))
    }

    fn children(
        &self,
        node: &NodeId,
    ) -> Vec<NodeId> {
        self.state
            .read()
            .get(*node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    fn subscribe(
        &self,
        node: &NodeId,
        scope: ObserveScope,
    ) -> Result<Subscription<NodeId>> {
        let state = self.state.read();
        if state.get(*node).is_none() {
            return Err(Error::UnknownNode(*node));
        }

        let (sender, receiver) = mpsc::unbounded_channel();
        let id = self.next_subscription_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(
            id,
            Subscriber {
                target: *node,
                scope,
                sender,
            },
        );
        trace!(subscription = id, %node, ?scope, "subscribed");
        Ok(Subscription { id, receiver })
    }

    fn unsubscribe(
        &self,
        id: SubscriptionId,
    ) {
        if self.subscribers.remove(&id).is_some() {
            trace!(subscription = id, "unsubscribed");
        }
    }
}
