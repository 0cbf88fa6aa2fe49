use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::MemTree;
use crate::NodeId;
use crate::NodeSpec;
use crate::Tree;

/// `<html><body id="main"></body></html>` under the document root.
pub(crate) fn page() -> (Arc<MemTree>, NodeId) {
    let tree = Arc::new(MemTree::new());
    let html = tree
        .insert(tree.root_id(), NodeSpec::new("html").child(NodeSpec::new("body").id("main")))
        .expect("insert html");
    let body = tree.children(&html)[0];
    (tree, body)
}

/// Lets every dispatch task drain its queue. Tests run with a paused clock,
/// so the runtime only advances time once all ready tasks are idle.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Collects `(label, node)` pairs in the order handlers ran.
#[derive(Clone, Default)]
pub(crate) struct Recorder {
    calls: Arc<Mutex<Vec<(String, NodeId)>>>,
}

impl Recorder {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn handler(
        &self,
        label: &str,
    ) -> impl FnMut(NodeId) + Send + 'static {
        let calls = self.calls.clone();
        let label = label.to_string();
        move |node| calls.lock().push((label.clone(), node))
    }

    pub(crate) fn calls(&self) -> Vec<(String, NodeId)> {
        self.calls.lock().clone()
    }

    pub(crate) fn labels(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(label, _)| label.clone()).collect()
    }

    pub(crate) fn count(
        &self,
        label: &str,
    ) -> usize {
        self.calls.lock().iter().filter(|(l, _)| l == label).count()
    }
}
