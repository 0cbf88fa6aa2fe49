use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tree_watch::MemTree;
use tree_watch::NodeId;
use tree_watch::NodeSpec;
use tree_watch::Tree;

/// A document with `<html><body id="main">` already rendered.
pub fn page() -> (Arc<MemTree>, NodeId) {
    let tree = Arc::new(MemTree::new());
    let html = tree
        .insert(tree.root_id(), NodeSpec::new("html").child(NodeSpec::new("body").id("main")))
        .expect("insert html");
    let body = tree.children(&html)[0];
    (tree, body)
}

/// Yields to every dispatch task. Tests run on a paused clock.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn record(
    log: &Log,
    entry: &str,
) -> impl FnMut(NodeId) + Send + 'static {
    let log = log.clone();
    let entry = entry.to_string();
    move |_| log.lock().push(entry.clone())
}
