use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::debug;
use tracing::info;
use tracing::instrument;
use tracing::trace;
use tracing::warn;

use super::dispatch::current_runtime;
use super::dispatch::spawn_dispatch;
use super::dispatch::Flow;
use super::ChainOutcome;
use super::ChainScope;
use super::PendingSet;
use super::WatchHandle;
use super::WatchRequest;
use crate::Error;
use crate::NodeId;
use crate::ObserveScope;
use crate::Result;
use crate::Tree;
use crate::WatcherConfig;

/// Where a watch is anchored: a node, or a selector resolved against the
/// watcher's root when the watch starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target<N> {
    Node(N),
    Selector(String),
}

impl<N> Target<N> {
    pub fn selector(selector: impl Into<String>) -> Self {
        Target::Selector(selector.into())
    }
}

impl<N> From<&str> for Target<N> {
    fn from(selector: &str) -> Self {
        Target::Selector(selector.to_string())
    }
}

impl<N> From<String> for Target<N> {
    fn from(selector: String) -> Self {
        Target::Selector(selector)
    }
}

impl From<NodeId> for Target<NodeId> {
    fn from(node: NodeId) -> Self {
        Target::Node(node)
    }
}

/// Waits for nodes to show up in a live [`Tree`].
///
/// Watches that cannot be satisfied by an initial synchronous scan subscribe
/// to the tree and are served by a task on the current tokio runtime;
/// handlers for later matches run on that task. A current-thread runtime
/// gives the single-queue, run-to-completion ordering of a browser event
/// loop.
pub struct ElementWatcher<T: Tree> {
    tree: Arc<T>,
    root: T::Node,
    config: WatcherConfig,
}

impl<T: Tree> Clone for ElementWatcher<T> {
    fn clone(&self) -> Self {
        Self {
            tree: self.tree.clone(),
            root: self.root.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: Tree> ElementWatcher<T> {
    pub fn new(tree: Arc<T>) -> Self {
        let root = tree.root();
        Self::with_root(tree, root)
    }

    /// Resolves selectors against `root` instead of the tree's root.
    pub fn with_root(
        tree: Arc<T>,
        root: T::Node,
    ) -> Self {
        Self {
            tree,
            root,
            config: WatcherConfig::default(),
        }
    }

    pub fn with_config(
        mut self,
        config: WatcherConfig,
    ) -> Self {
        self.config = config;
        self
    }

    pub fn tree(&self) -> &Arc<T> {
        &self.tree
    }

    pub fn root(&self) -> &T::Node {
        &self.root
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Watches the direct children of `parent` for each selector of
    /// `requests`.
    ///
    /// Current children are scanned synchronously first (document order,
    /// then declaration order). In one-shot mode each selector fires at most
    /// once and the subscription is released as soon as every selector has
    /// fired; if the scan already satisfied everything, the subscription is
    /// released before this returns. In `continuous` mode handlers fire for
    /// every match until the handle is disposed or the timeout elapses.
    ///
    /// `timeout`: `None` falls back to the configured default, a zero
    /// duration disables the deadline.
    #[must_use = "the returned handle owns the subscription"]
    pub fn watch_children(
        &self,
        parent: impl Into<Target<T::Node>>,
        requests: WatchRequest<T::Node>,
        continuous: bool,
        timeout: Option<Duration>,
    ) -> Result<WatchHandle> {
        let parent = self.resolve(parent.into())?;
        self.observe_children(parent, requests, continuous, self.watch_timeout(timeout))
    }

    /// Watches the whole subtree of `ancestor`. One-shot: each selector fires
    /// once, with the first matching descendant in document order.
    #[must_use = "the returned handle owns the subscription"]
    pub fn watch_descendants(
        &self,
        ancestor: impl Into<Target<T::Node>>,
        requests: WatchRequest<T::Node>,
        timeout: Option<Duration>,
    ) -> Result<WatchHandle> {
        let ancestor = self.resolve(ancestor.into())?;
        self.check_request(&requests)?;

        // Subscribed before the scan: nodes inserted by scan handlers arrive
        // as batches.
        let subscription = self.tree.subscribe(&ancestor, ObserveScope::Subtree)?;
        let handle = self.live_handle(subscription.id);

        let mut pending = PendingSet::new(requests, false);
        pending.resolve_with(|selector| self.tree.find(&ancestor, selector));
        if pending.is_exhausted() {
            trace!(?ancestor, "descendants already present");
            handle.dispose();
            return Ok(WatchHandle::resolved());
        }

        let runtime = current_runtime().inspect_err(|_| handle.dispose())?;
        debug!(
            subscription = subscription.id,
            ?ancestor,
            pending = pending.remaining(),
            "watching descendants"
        );

        if let Some(shared) = handle.share() {
            let tree = self.tree.clone();
            spawn_dispatch(
                &runtime,
                shared,
                subscription.receiver,
                self.watch_timeout(timeout),
                move |_, _batch| {
                    pending.resolve_with(|selector| tree.find(&ancestor, selector));
                    if pending.is_exhausted() {
                        Flow::Done
                    } else {
                        Flow::Continue
                    }
                },
            );
        }
        Ok(handle)
    }

    /// Runs `handler` once `ancestor` has at least one child.
    ///
    /// Returns `None` when the ancestor is already populated (the handler ran
    /// synchronously). Otherwise the first subtree notification releases the
    /// subscription and then runs the handler.
    #[must_use = "the returned handle owns the subscription"]
    pub fn watch_any_descendant<F>(
        &self,
        ancestor: impl Into<Target<T::Node>>,
        handler: F,
        timeout: Option<Duration>,
    ) -> Result<Option<WatchHandle>>
    where
        F: FnOnce() + Send + 'static,
    {
        let ancestor = self.resolve(ancestor.into())?;
        let subscription = self.tree.subscribe(&ancestor, ObserveScope::Subtree)?;
        let handle = self.live_handle(subscription.id);
        if !self.tree.children(&ancestor).is_empty() {
            trace!(?ancestor, "ancestor already populated");
            handle.dispose();
            handler();
            return Ok(None);
        }

        let runtime = current_runtime().inspect_err(|_| handle.dispose())?;
        debug!(subscription = subscription.id, ?ancestor, "watching for any descendant");

        if let Some(shared) = handle.share() {
            let mut handler = Some(handler);
            spawn_dispatch(
                &runtime,
                shared,
                subscription.receiver,
                self.watch_timeout(timeout),
                move |handle, _batch| {
                    handle.dispose();
                    if let Some(handler) = handler.take() {
                        handler();
                    }
                    Flow::Done
                },
            );
        }
        Ok(Some(handle))
    }

    /// Resolves `chain` one selector at a time and runs `handler` with the
    /// last node.
    ///
    /// `chain[0]` is looked up under the root immediately; each following
    /// selector is awaited as a direct child of the node before it. One
    /// deadline bounds the whole chain. A chain broken by its deadline or an
    /// abort returns the matching [`ChainOutcome`] without running
    /// `handler`; every subscription the chain created is released before
    /// this returns.
    pub async fn watch_chain<S, F>(
        &self,
        chain: &[S],
        handler: F,
        timeout: Option<Duration>,
    ) -> Result<ChainOutcome>
    where
        S: AsRef<str>,
        F: FnOnce(T::Node) + Send,
    {
        let scope = ChainScope::new(self.chain_timeout(timeout));
        self.watch_chain_in(&scope, chain, handler).await
    }

    /// Same as [`watch_chain`](Self::watch_chain), inside a caller-owned
    /// scope. The scope's own timeout applies; it is released when this
    /// returns and cannot be reused.
    #[instrument(skip_all, fields(len = chain.len()))]
    pub async fn watch_chain_in<S, F>(
        &self,
        scope: &ChainScope,
        chain: &[S],
        handler: F,
    ) -> Result<ChainOutcome>
    where
        S: AsRef<str>,
        F: FnOnce(T::Node) + Send,
    {
        let (head, links) = chain.split_first().ok_or(Error::EmptyChain)?;
        self.config.chain.check_length(chain.len())?;
        if scope.is_released() {
            return Err(Error::ScopeReleased);
        }
        let _release = scope.release_guard();

        for selector in chain {
            self.tree.check_selector(selector.as_ref())?;
        }
        let mut node = self.resolve_selector(head.as_ref())?;
        scope.arm()?;

        for (step, selector) in links.iter().enumerate() {
            let selector: &str = selector.as_ref();
            match self.next_link(scope, &node, selector).await {
                Ok(child) => node = child,
                Err(e) if e.is_cancellation() => {
                    info!(step = step + 1, selector, "chain broken: {}", e);
                    return Ok(ChainOutcome::from_cancellation(&e));
                }
                Err(e) => return Err(e),
            }
        }

        // aborted before or while the last link resolved
        if scope.signal().is_cancelled() {
            let e = scope.cancellation_error();
            info!("chain broken before completion: {}", e);
            return Ok(ChainOutcome::from_cancellation(&e));
        }

        debug!(?node, "chain completed");
        handler(node);
        Ok(ChainOutcome::Completed)
    }

    /// Waits for `selector` to appear as a direct child of `parent`, or for
    /// the scope's signal, whichever comes first.
    async fn next_link(
        &self,
        scope: &ChainScope,
        parent: &T::Node,
        selector: &str,
    ) -> Result<T::Node> {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let request = WatchRequest::new().on(selector, move |node| {
            if let Some(tx) = tx.take() {
                // receiver is gone once the step was abandoned
                let _ = tx.send(node);
            }
        });

        let handle = self.observe_children(parent.clone(), request, false, None)?;
        scope.register(handle);

        tokio::select! {
            biased;
            _ = scope.signal().cancelled() => Err(scope.cancellation_error()),
            node = rx => node.map_err(|_| scope.cancellation_error()),
        }
    }

    fn observe_children(
        &self,
        parent: T::Node,
        requests: WatchRequest<T::Node>,
        continuous: bool,
        timeout: Option<Duration>,
    ) -> Result<WatchHandle> {
        self.check_request(&requests)?;

        // Subscribed before the scan: nodes inserted while it runs (by a scan
        // handler or another thread) arrive as batches.
        let subscription = self.tree.subscribe(&parent, ObserveScope::Children)?;
        let handle = self.live_handle(subscription.id);

        let mut pending = PendingSet::new(requests, continuous);
        let scanned = self.tree.children(&parent);
        for child in &scanned {
            pending.offer(child, |node, selector| self.tree.matches(node, selector));
            if pending.is_exhausted() {
                trace!(?parent, "children already present");
                handle.dispose();
                return Ok(WatchHandle::resolved());
            }
        }

        let runtime = current_runtime().inspect_err(|_| handle.dispose())?;
        debug!(
            subscription = subscription.id,
            ?parent,
            continuous,
            pending = pending.remaining(),
            "watching children"
        );

        if let Some(shared) = handle.share() {
            let tree = self.tree.clone();
            spawn_dispatch(
                &runtime,
                shared,
                subscription.receiver,
                timeout,
                move |handle, batch| {
                    for node in batch.added {
                        if !handle.is_live() {
                            return Flow::Done;
                        }
                        // inserted between subscribe and the scan: already offered
                        if scanned.contains(&node) {
                            continue;
                        }
                        pending.offer(&node, |node, selector| tree.matches(node, selector));
                        if pending.is_exhausted() {
                            return Flow::Done;
                        }
                    }
                    Flow::Continue
                },
            );
        }
        Ok(handle)
    }

    fn live_handle(
        &self,
        subscription: crate::SubscriptionId,
    ) -> WatchHandle {
        let tree = self.tree.clone();
        WatchHandle::live(subscription, move || tree.unsubscribe(subscription))
    }

    fn check_request(
        &self,
        requests: &WatchRequest<T::Node>,
    ) -> Result<()> {
        if requests.is_empty() {
            return Err(Error::EmptyRequest);
        }
        for selector in requests.selectors() {
            self.tree.check_selector(selector)?;
        }
        Ok(())
    }

    fn resolve(
        &self,
        target: Target<T::Node>,
    ) -> Result<T::Node> {
        match target {
            Target::Node(node) => Ok(node),
            Target::Selector(selector) => {
                self.tree.check_selector(&selector)?;
                self.resolve_selector(&selector)
            }
        }
    }

    fn resolve_selector(
        &self,
        selector: &str,
    ) -> Result<T::Node> {
        self.tree.find(&self.root, selector).ok_or_else(|| {
            warn!(selector, "failed to resolve selector");
            Error::Resolution {
                selector: selector.to_string(),
            }
        })
    }

    fn watch_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Option<Duration> {
        effective_timeout(timeout, self.config.timeouts.watch_timeout())
    }

    fn chain_timeout(
        &self,
        timeout: Option<Duration>,
    ) -> Option<Duration> {
        effective_timeout(timeout, self.config.timeouts.chain_timeout())
    }
}

/// Explicit values win over the configured fallback; zero disables.
fn effective_timeout(
    explicit: Option<Duration>,
    fallback: Option<Duration>,
) -> Option<Duration> {
    explicit.or(fallback).filter(|timeout| !timeout.is_zero())
}
