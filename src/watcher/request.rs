use std::fmt;

/// Callback invoked with a matching node.
pub type Handler<N> = Box<dyn FnMut(N) + Send + 'static>;

/// Selector-to-handler mapping for one `watch_*` call.
///
/// Selectors form a set kept in declaration order: registering a selector
/// twice replaces its handler but keeps its original position.
pub struct WatchRequest<N> {
    entries: Vec<(String, Handler<N>)>,
}

impl<N> Default for WatchRequest<N> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<N> fmt::Debug for WatchRequest<N> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WatchRequest")
            .field("selectors", &self.selectors().collect::<Vec<_>>())
            .finish()
    }
}

impl<N> WatchRequest<N> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn on<F>(
        mut self,
        selector: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: FnMut(N) + Send + 'static,
    {
        self.insert(selector, handler);
        self
    }

    pub fn insert<F>(
        &mut self,
        selector: impl Into<String>,
        handler: F,
    ) where
        F: FnMut(N) + Send + 'static,
    {
        let selector = selector.into();
        let handler: Handler<N> = Box::new(handler);
        match self.entries.iter_mut().find(|(existing, _)| *existing == selector) {
            Some(entry) => entry.1 = handler,
            None => self.entries.push((selector, handler)),
        }
    }

    pub fn selectors(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(selector, _)| selector.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

struct PendingEntry<N> {
    selector: String,
    handler: Handler<N>,
    retired: bool,
}

/// The selectors of one watch that can still fire.
///
/// Offering a node is done in two steps: hits are collected first, then
/// retired and fired, so handlers never run while the set is being walked.
pub(crate) struct PendingSet<N> {
    entries: Vec<PendingEntry<N>>,
    remaining: usize,
    continuous: bool,
}

impl<N: Clone> PendingSet<N> {
    pub(crate) fn new(
        request: WatchRequest<N>,
        continuous: bool,
    ) -> Self {
        let entries: Vec<PendingEntry<N>> = request
            .entries
            .into_iter()
            .map(|(selector, handler)| PendingEntry {
                selector,
                handler,
                retired: false,
            })
            .collect();
        Self {
            remaining: entries.len(),
            entries,
            continuous,
        }
    }

    /// One-shot set with every selector fired.
    pub(crate) fn is_exhausted(&self) -> bool {
        !self.continuous && self.remaining == 0
    }

    pub(crate) fn remaining(&self) -> usize {
        self.remaining
    }

    /// Offers one node to every active selector, in declaration order.
    /// Returns how many handlers fired.
    pub(crate) fn offer(
        &mut self,
        node: &N,
        mut matches: impl FnMut(&N, &str) -> bool,
    ) -> usize {
        let hits: Vec<usize> = self
            .active()
            .filter(|(_, entry)| matches(node, &entry.selector))
            .map(|(idx, _)| idx)
            .collect();

        for &idx in &hits {
            self.fire(idx, node.clone());
        }
        hits.len()
    }

    /// Looks every active selector up independently (subtree search), in
    /// declaration order. Each lookup runs after the handlers fired before
    /// it, so it sees what they changed. Returns how many handlers fired.
    pub(crate) fn resolve_with(
        &mut self,
        mut lookup: impl FnMut(&str) -> Option<N>,
    ) -> usize {
        let mut fired = 0;
        for idx in 0..self.entries.len() {
            if self.entries[idx].retired {
                continue;
            }
            if let Some(node) = lookup(&self.entries[idx].selector) {
                self.fire(idx, node);
                fired += 1;
            }
        }
        fired
    }

    fn active(&self) -> impl Iterator<Item = (usize, &PendingEntry<N>)> {
        self.entries.iter().enumerate().filter(|(_, entry)| !entry.retired)
    }

    fn fire(
        &mut self,
        idx: usize,
        node: N,
    ) {
        let entry = &mut self.entries[idx];
        if !self.continuous {
            entry.retired = true;
            self.remaining -= 1;
        }
        (entry.handler)(node);
    }
}
