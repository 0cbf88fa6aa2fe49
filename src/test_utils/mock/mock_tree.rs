use tokio::sync::mpsc;

use crate::MockTree;
use crate::MutationBatch;
use crate::NodeId;
use crate::Subscription;

pub(crate) const MOCK_ROOT: NodeId = NodeId(0);
pub(crate) const MOCK_PARENT: NodeId = NodeId(1);
pub(crate) const MOCK_SUBSCRIPTION: u64 = 7;

/// A mocked tree whose `MOCK_PARENT` has no children and matches a node
/// against a selector when the selector is `"#<index>"`. `subscribe` may be
/// called once; batches are fed through the returned sender. `unsubscribe`
/// must be called exactly `unsubscribes` times.
pub(crate) fn mock_tree_with_feed(unsubscribes: usize) -> (MockTree, mpsc::UnboundedSender<MutationBatch<NodeId>>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let mut tree = MockTree::new();

    tree.expect_root().return_const(MOCK_ROOT);
    tree.expect_check_selector().returning(|_| Ok(()));
    tree.expect_children().returning(|_| Vec::new());
    tree.expect_find().returning(|_, selector| match selector {
        "#parent" => Some(MOCK_PARENT),
        _ => None,
    });
    tree.expect_matches()
        .returning(|node, selector| selector == format!("#{}", node.index()));
    tree.expect_subscribe().times(1).return_once(move |_, _| {
        Ok(Subscription {
            id: MOCK_SUBSCRIPTION,
            receiver,
        })
    });
    tree.expect_unsubscribe()
        .withf(|id| *id == MOCK_SUBSCRIPTION)
        .times(unsubscribes)
        .return_const(());

    (tree, sender)
}
