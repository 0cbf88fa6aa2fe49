use std::time::Duration;

use futures::future::join_all;
use tree_watch::ChainOutcome;
use tree_watch::ChainScope;
use tree_watch::ElementWatcher;
use tree_watch::NodeSpec;
use tree_watch::WatcherConfig;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn test_concurrent_chains_share_one_tree() {
    let (tree, body) = page();
    let watcher = ElementWatcher::new(tree.clone());
    let log = log();

    let chains = [
        ["#main", "header", "nav"],
        ["#main", "header", "h1"],
        ["#main", "footer", "small"],
    ];
    let running = join_all(chains.iter().map(|chain| {
        let handler = record(&log, chain[2]);
        watcher.watch_chain(chain, handler, Some(Duration::from_millis(200)))
    }));
    let render = async {
        settle().await;
        let header = tree.insert(body, NodeSpec::new("header")).unwrap();
        settle().await;
        tree.append_batch(header, vec![NodeSpec::new("h1"), NodeSpec::new("nav")])
            .unwrap();
    };

    let (outcomes, _) = tokio::join!(running, render);
    let outcomes: Vec<ChainOutcome> = outcomes.into_iter().map(|outcome| outcome.unwrap()).collect();

    assert_eq!(
        outcomes,
        vec![ChainOutcome::Completed, ChainOutcome::Completed, ChainOutcome::TimedOut]
    );
    let mut seen = log.lock().clone();
    seen.sort();
    assert_eq!(seen, vec!["h1", "nav"]);
    assert_eq!(tree.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_removed_link_aborts_chain() {
    let (tree, body) = page();
    let panel = tree.insert(body, NodeSpec::new("div").id("panel")).unwrap();
    let watcher = ElementWatcher::new(tree.clone());
    let log = log();

    let (outcome, _) = tokio::join!(
        watcher.watch_chain(&["#panel", "p"], record(&log, "p"), None),
        async {
            settle().await;
            tree.remove(panel).unwrap();
        }
    );

    assert_eq!(outcome.unwrap(), ChainOutcome::Aborted);
    assert!(log.lock().is_empty());
    assert_eq!(tree.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_scope_cancel_from_another_task() {
    let (tree, _) = page();
    let watcher = ElementWatcher::new(tree.clone());
    let scope = ChainScope::new(None);
    let abort = scope.abort_handle();

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        abort.abort();
    });
    let outcome = watcher
        .watch_chain_in(&scope, &["#main", "section", "table"], |_| {})
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(outcome, ChainOutcome::Aborted);
    assert!(scope.is_released());
    assert_eq!(scope.live_handles(), 0);
    assert_eq!(tree.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_default_chain_timeout_from_config() {
    let (tree, _) = page();
    let mut config = WatcherConfig::default();
    config.timeouts.default_chain_timeout_ms = 250;
    let watcher = ElementWatcher::new(tree.clone()).with_config(config);
    let start = tokio::time::Instant::now();

    let outcome = watcher.watch_chain(&["#main", "form"], |_| {}, None).await.unwrap();

    assert_eq!(outcome, ChainOutcome::TimedOut);
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(250));
    assert!(elapsed < Duration::from_millis(260));
    assert_eq!(tree.live_subscriptions(), 0);
}
