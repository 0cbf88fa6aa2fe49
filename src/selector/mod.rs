//! A small CSS-like selector engine.
//!
//! Supported syntax: type selectors, `*`, `#id`, `.class`, attribute
//! conditions (`[k]`, `[k=v]`, `[k~=v]`, `[k^=v]`, `[k$=v]`, `[k*=v]`),
//! descendant (whitespace) and child (`>`) combinators, and `,` groups.
//! Pseudo-classes and sibling combinators are rejected at parse time.

mod parser;

use std::str::FromStr;

use crate::Error;

/// Read access a tree must offer to evaluate selectors against its nodes.
pub trait ElementTree {
    type Id: Copy;

    fn tag_name(
        &self,
        id: Self::Id,
    ) -> Option<&str>;

    fn attribute(
        &self,
        id: Self::Id,
        name: &str,
    ) -> Option<&str>;

    fn parent_of(
        &self,
        id: Self::Id,
    ) -> Option<Self::Id>;
}

/// A parsed, comma-separated selector group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorList {
    selectors: Vec<ComplexSelector>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ComplexSelector {
    // Left to right, as written.
    pub(crate) parts: Vec<SelectorPart>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) compound: Compound,
    // Relation to the previous (left) part; `None` on the first part.
    pub(crate) combinator: Option<Combinator>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrCondition>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    Includes { key: String, value: String },
    Prefix { key: String, value: String },
    Suffix { key: String, value: String },
    Substring { key: String, value: String },
}

impl SelectorList {
    pub fn parse(selector: &str) -> Result<Self, Error> {
        parser::parse_selector_list(selector)
    }

    /// Whether `node` matches any selector of the group.
    pub fn matches<T: ElementTree>(
        &self,
        tree: &T,
        node: T::Id,
    ) -> bool {
        self.selectors
            .iter()
            .any(|selector| matches_part(tree, node, &selector.parts, selector.parts.len() - 1))
    }

    pub(crate) fn from_selectors(selectors: Vec<ComplexSelector>) -> Self {
        Self { selectors }
    }

    #[cfg(test)]
    pub(crate) fn selectors(&self) -> &[ComplexSelector] {
        &self.selectors
    }
}

impl FromStr for SelectorList {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

fn matches_part<T: ElementTree>(
    tree: &T,
    node: T::Id,
    parts: &[SelectorPart],
    idx: usize,
) -> bool {
    if !matches_compound(tree, node, &parts[idx].compound) {
        return false;
    }
    if idx == 0 {
        return true;
    }

    match parts[idx].combinator.unwrap_or(Combinator::Descendant) {
        Combinator::Child => tree
            .parent_of(node)
            .is_some_and(|parent| matches_part(tree, parent, parts, idx - 1)),
        Combinator::Descendant => {
            let mut cursor = tree.parent_of(node);
            while let Some(ancestor) = cursor {
                if matches_part(tree, ancestor, parts, idx - 1) {
                    return true;
                }
                cursor = tree.parent_of(ancestor);
            }
            false
        }
    }
}

fn matches_compound<T: ElementTree>(
    tree: &T,
    node: T::Id,
    compound: &Compound,
) -> bool {
    let Some(tag_name) = tree.tag_name(node) else {
        return false;
    };

    if let Some(tag) = &compound.tag {
        if !tag_name.eq_ignore_ascii_case(tag) {
            return false;
        }
    }

    if let Some(id) = &compound.id {
        if tree.attribute(node, "id") != Some(id.as_str()) {
            return false;
        }
    }

    if !compound.classes.is_empty() {
        let class_attr = tree.attribute(node, "class").unwrap_or_default();
        if compound
            .classes
            .iter()
            .any(|class_name| !class_attr.split_ascii_whitespace().any(|c| c == class_name))
        {
            return false;
        }
    }

    compound.attrs.iter().all(|cond| match cond {
        AttrCondition::Exists { key } => tree.attribute(node, key).is_some(),
        AttrCondition::Eq { key, value } => tree.attribute(node, key) == Some(value.as_str()),
        AttrCondition::Includes { key, value } => tree
            .attribute(node, key)
            .is_some_and(|v| v.split_ascii_whitespace().any(|token| token == value)),
        AttrCondition::Prefix { key, value } => tree
            .attribute(node, key)
            .is_some_and(|v| !value.is_empty() && v.starts_with(value.as_str())),
        AttrCondition::Suffix { key, value } => tree
            .attribute(node, key)
            .is_some_and(|v| !value.is_empty() && v.ends_with(value.as_str())),
        AttrCondition::Substring { key, value } => tree
            .attribute(node, key)
            .is_some_and(|v| !value.is_empty() && v.contains(value.as_str())),
    })
}
