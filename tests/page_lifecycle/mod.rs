use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tree_watch::ElementWatcher;
use tree_watch::Error;
use tree_watch::NodeSpec;
use tree_watch::Target;
use tree_watch::Tree;
use tree_watch::WatchRequest;

use crate::common::*;

#[tokio::test(start_paused = true)]
async fn test_app_shell_renders_in_stages() {
    let (tree, body) = page();
    let watcher = ElementWatcher::new(tree.clone());
    let log = log();

    let shell = watcher
        .watch_children(
            Target::selector("body"),
            WatchRequest::new()
                .on("#app", record(&log, "app"))
                .on("noscript", record(&log, "noscript")),
            false,
            Some(Duration::from_secs(5)),
        )
        .unwrap();
    let widgets = watcher
        .watch_descendants(
            body,
            WatchRequest::new()
                .on("#app .toolbar > button.play", record(&log, "play"))
                .on("[data-role=player]", record(&log, "player")),
            None,
        )
        .unwrap();
    assert_eq!(tree.live_subscriptions(), 2);

    let app = tree.insert(body, NodeSpec::new("div").id("app")).unwrap();
    settle().await;
    assert_eq!(*log.lock(), vec!["app"]);

    tree.insert(
        app,
        NodeSpec::new("div")
            .class("toolbar")
            .child(NodeSpec::new("button").class("play")),
    )
    .unwrap();
    tree.insert(app, NodeSpec::new("video").attr("data-role", "player")).unwrap();
    settle().await;
    assert_eq!(*log.lock(), vec!["app", "play", "player"]);
    assert!(!widgets.is_live());
    assert!(shell.is_live());

    // the shell watch still waits for <noscript> until its deadline
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert!(!shell.is_live());
    assert_eq!(tree.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_continuous_feed_until_disposed() {
    let (tree, body) = page();
    let feed = tree.insert(body, NodeSpec::new("ol").class("feed")).unwrap();
    let watcher = ElementWatcher::new(tree.clone());
    let log = log();

    let handle = watcher
        .watch_children(
            ".feed",
            WatchRequest::new()
                .on("li.post", record(&log, "post"))
                .on("li.ad", record(&log, "ad")),
            true,
            None,
        )
        .unwrap();

    for kind in ["post", "ad", "post", "post"] {
        tree.insert(feed, NodeSpec::new("li").class(kind)).unwrap();
    }
    settle().await;
    handle.dispose();
    tree.insert(feed, NodeSpec::new("li").class("post")).unwrap();
    settle().await;

    assert_eq!(*log.lock(), vec!["post", "ad", "post", "post"]);
    assert_eq!(tree.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_lazy_container_fills_once() {
    let (tree, body) = page();
    let lazy = tree.insert(body, NodeSpec::new("section").id("comments")).unwrap();
    let watcher = ElementWatcher::new(tree.clone());
    let filled = Arc::new(AtomicBool::new(false));
    let flag = filled.clone();

    let handle = watcher
        .watch_any_descendant("#comments", move || flag.store(true, Ordering::SeqCst), None)
        .unwrap()
        .expect("container starts empty");
    settle().await;
    assert!(!filled.load(Ordering::SeqCst));

    tree.append_batch(lazy, vec![NodeSpec::new("article"), NodeSpec::new("article")])
        .unwrap();
    settle().await;

    assert!(filled.load(Ordering::SeqCst));
    assert!(!handle.is_live());
    assert_eq!(tree.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_removed_parent_ends_watch() {
    let (tree, body) = page();
    let modal = tree.insert(body, NodeSpec::new("dialog")).unwrap();
    let watcher = ElementWatcher::new(tree.clone());
    let log = log();

    let handle = watcher
        .watch_children(modal, WatchRequest::new().on("form", record(&log, "form")), false, None)
        .unwrap();
    tree.remove(modal).unwrap();
    settle().await;

    assert!(!handle.is_live());
    assert!(log.lock().is_empty());
    assert_eq!(tree.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_scoped_root_limits_resolution() {
    let (tree, body) = page();
    let sidebar = tree
        .insert(body, NodeSpec::new("aside").child(NodeSpec::new("nav").class("menu")))
        .unwrap();
    tree.insert(body, NodeSpec::new("footer").child(NodeSpec::new("nav").class("links")))
        .unwrap();
    let watcher = ElementWatcher::with_root(tree.clone(), sidebar);
    let log = log();

    let menu_links = watcher
        .watch_children("nav", WatchRequest::new().on("a", record(&log, "menu-link")), false, None)
        .unwrap();
    assert!(matches!(
        watcher.watch_children("footer", WatchRequest::new().on("a", |_| {}), false, None),
        Err(Error::Resolution { .. })
    ));

    let menu = tree.children(&sidebar)[0];
    tree.insert(menu, NodeSpec::new("a")).unwrap();
    settle().await;
    assert_eq!(*log.lock(), vec!["menu-link"]);
    assert!(!menu_links.is_live());
}
