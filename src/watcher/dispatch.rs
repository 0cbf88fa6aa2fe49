use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep_until;
use tokio::time::Instant;
use tracing::debug;
use tracing::trace;

use super::HandleInner;
use crate::Error;
use crate::MutationBatch;
use crate::Result;

/// What the dispatch loop does after a batch was handled.
pub(crate) enum Flow {
    Continue,
    Done,
}

pub(crate) fn current_runtime() -> Result<Handle> {
    Handle::try_current().map_err(|_| Error::RuntimeUnavailable)
}

/// Serves one subscription: batches are handed to `on_batch` in arrival
/// order until it returns [`Flow::Done`], the handle is disposed, the
/// optional deadline passes, or the tree closes the channel. The handle is
/// always disposed on exit.
pub(crate) fn spawn_dispatch<N, F>(
    runtime: &Handle,
    handle: Arc<HandleInner>,
    mut receiver: UnboundedReceiver<MutationBatch<N>>,
    timeout: Option<Duration>,
    mut on_batch: F,
) where
    N: Send + 'static,
    F: FnMut(&HandleInner, MutationBatch<N>) -> Flow + Send + 'static,
{
    let deadline = timeout.map(|timeout| Instant::now() + timeout);

    runtime.spawn(async move {
        let expired = async move {
            match deadline {
                Some(deadline) => sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        loop {
            tokio::select! {
                biased;
                _ = handle.token().cancelled() => break,
                _ = &mut expired => {
                    debug!(subscription = handle.subscription(), ?timeout, "watch timed out");
                    break;
                }
                batch = receiver.recv() => {
                    let Some(batch) = batch else {
                        trace!(subscription = handle.subscription(), "notification channel closed");
                        break;
                    };
                    if let Flow::Done = on_batch(&handle, batch) {
                        break;
                    }
                }
            }
        }

        handle.dispose();
    });
}
