use std::collections::BTreeMap;
use std::fmt;

/// Arena index of a [`MemTree`](super::MemTree) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Description of a node (and its subtree) to insert into a `MemTree`.
///
/// ```ignore
/// let spec = NodeSpec::new("ul")
///     .id("menu")
///     .child(NodeSpec::new("li").class("entry"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSpec {
    pub(crate) tag: String,
    pub(crate) attrs: BTreeMap<String, String>,
    pub(crate) children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Default::default()
        }
    }

    pub fn id(
        self,
        id: impl Into<String>,
    ) -> Self {
        self.attr("id", id)
    }

    /// Appends to the `class` attribute.
    pub fn class(
        mut self,
        class_name: impl Into<String>,
    ) -> Self {
        let class_name = class_name.into();
        self.attrs
            .entry("class".to_string())
            .and_modify(|classes| {
                classes.push(' ');
                classes.push_str(&class_name);
            })
            .or_insert(class_name);
        self
    }

    pub fn attr(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn child(
        mut self,
        child: NodeSpec,
    ) -> Self {
        self.children.push(child);
        self
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

/// Point-in-time copy of one `MemTree` node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSnapshot {
    pub id: NodeId,
    /// `None` for the document node
    pub tag: Option<String>,
    pub attrs: BTreeMap<String, String>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}
