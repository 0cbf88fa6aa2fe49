use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::SubscriptionId;

type Release = Box<dyn FnOnce() + Send + 'static>;

/// Owner of one live mutation subscription.
///
/// The subscription is released when the watch is satisfied (one-shot), when
/// its timeout elapses, when its chain scope is released, or when
/// [`dispose`](Self::dispose) is called. Dropping the handle detaches it
/// without disposing: the watch keeps running until one of those happens.
#[must_use = "dropping a WatchHandle detaches it; a continuous watch without a timeout then runs until the tree goes away"]
pub struct WatchHandle {
    inner: Option<Arc<HandleInner>>,
}

pub(crate) struct HandleInner {
    subscription: SubscriptionId,
    token: CancellationToken,
    release: Mutex<Option<Release>>,
}

impl WatchHandle {
    /// Handle for a request fully satisfied by the initial scan. It owns no
    /// subscription.
    pub(crate) fn resolved() -> Self {
        Self { inner: None }
    }

    pub(crate) fn live<F>(
        subscription: SubscriptionId,
        release: F,
    ) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner: Some(Arc::new(HandleInner {
                subscription,
                token: CancellationToken::new(),
                release: Mutex::new(Some(Box::new(release))),
            })),
        }
    }

    /// Shared state for the dispatch task serving this handle.
    pub(crate) fn share(&self) -> Option<Arc<HandleInner>> {
        self.inner.clone()
    }

    /// Releases the subscription. Safe to call any number of times.
    pub fn dispose(&self) {
        if let Some(inner) = &self.inner {
            inner.dispose();
        }
    }

    /// Whether the subscription is still held.
    pub fn is_live(&self) -> bool {
        self.inner.as_ref().is_some_and(|inner| inner.is_live())
    }

    /// `true` for handles that never subscribed.
    pub fn is_resolved(&self) -> bool {
        self.inner.is_none()
    }

    pub fn subscription_id(&self) -> Option<SubscriptionId> {
        self.inner.as_ref().map(|inner| inner.subscription)
    }

    /// Completes once the handle has been disposed and its subscription
    /// released. Resolved handles complete immediately.
    pub async fn disposed(&self) {
        if let Some(inner) = &self.inner {
            inner.token.cancelled().await;
        }
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("subscription", &self.subscription_id())
            .field("live", &self.is_live())
            .finish()
    }
}

impl HandleInner {
    pub(crate) fn dispose(&self) {
        let release = self.release.lock().take();
        if let Some(release) = release {
            release();
            self.token.cancel();
            debug!(subscription = self.subscription, "watch disposed");
        }
    }

    pub(crate) fn is_live(&self) -> bool {
        self.release.lock().is_some()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub(crate) fn subscription(&self) -> SubscriptionId {
        self.subscription
    }
}
