//! The raw YAML value tree (§3 "YAML value", §4.4).
//!
//! This is the immediate output of [`crate::config::parser`]: a tagged-union
//! tree with insertion-ordered mappings and a source [`Location`] on every
//! node, built directly from the scanner's event stream rather than from a
//! convenience loader, so that anchors/aliases survive unresolved for the
//! builder to match up itself (§4.5).

use crate::common::Location;

/// Opaque correlation key for a YAML anchor (`&foo`) / alias (`*foo`) pair.
///
/// yaml-rust2's event scanner consumes the anchor's textual name and hands
/// back only a renumbered integer id shared between the defining node and
/// every alias referencing it; that is exactly the identity this type needs
/// (the builder only ever uses anchors to correlate a definition site with
/// its reference sites, never to print the original name), so no
/// information the builder depends on is lost.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnchorId(pub usize);

/// A scalar, sequence, mapping, or alias — the four shapes a YAML node can
/// take in this configuration language.
#[derive(Clone, Debug)]
pub enum YamlValue {
    /// A leaf scalar. Interpreted as string/int/float/bool lazily by the
    /// config-context typed accessors (§4.4); never tokenized at parse time.
    Scalar(String),
    /// An unresolved `*name` reference to a node anchored elsewhere with
    /// `&name`.
    Alias(AnchorId),
    /// A YAML sequence.
    Array(Vec<YamlNode>),
    /// A YAML mapping. Order-preserving: this configuration format relies on
    /// definitions being visitable in the order they were written for
    /// diagnostics, even though lookup is also by key.
    Mapping(Vec<(String, YamlNode)>),
}

/// One node in the parsed tree: a value plus the location it came from, and
/// — if this exact node was the target of a `&name` anchor — the anchor id
/// it defines.
#[derive(Clone, Debug)]
pub struct YamlNode {
    /// The node's shape and payload.
    pub value: YamlValue,
    /// Where this node appears in its source file.
    pub location: Location,
    /// `Some(id)` if this node was anchored (`&name`); aliases elsewhere
    /// referencing the same anchor carry `YamlValue::Alias(id)`.
    pub anchor: Option<AnchorId>,
}

impl YamlNode {
    /// Builds a scalar node.
    #[must_use]
    pub fn scalar(text: impl Into<String>, location: Location) -> Self {
        Self {
            value: YamlValue::Scalar(text.into()),
            location,
            anchor: None,
        }
    }

    /// Returns the node's mapping entries, if it is a mapping.
    #[must_use]
    pub fn as_mapping(&self) -> Option<&[(String, YamlNode)]> {
        match &self.value {
            YamlValue::Mapping(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a key in this node's mapping, if it is one.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&YamlNode> {
        self.as_mapping()?
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
    }

    /// Returns the node's scalar text, if it is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match &self.value {
            YamlValue::Scalar(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Returns the node's elements, if it is an array.
    #[must_use]
    pub fn as_array(&self) -> Option<&[YamlNode]> {
        match &self.value {
            YamlValue::Array(items) => Some(items),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: Vec<(&str, YamlNode)>) -> YamlNode {
        YamlNode {
            value: YamlValue::Mapping(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect()),
            location: Location::synthetic(),
            anchor: None,
        }
    }

    #[test]
    fn get_finds_a_key_in_an_order_preserving_mapping() {
        let node = mapping(vec![
            ("class", YamlNode::scalar("SimpleMemory", Location::synthetic())),
            ("latency", YamlNode::scalar("2", Location::synthetic())),
        ]);
        assert_eq!(node.get("class").and_then(YamlNode::as_scalar), Some("SimpleMemory"));
        assert_eq!(node.get("latency").and_then(YamlNode::as_scalar), Some("2"));
        assert!(node.get("missing").is_none());
    }

    #[test]
    fn scalar_node_has_no_mapping_or_array_view() {
        let node = YamlNode::scalar("42", Location::synthetic());
        assert!(node.as_mapping().is_none());
        assert!(node.as_array().is_none());
        assert_eq!(node.as_scalar(), Some("42"));
    }

    #[test]
    fn alias_node_carries_no_scalar_text() {
        let node = YamlNode { value: YamlValue::Alias(AnchorId(3)), location: Location::synthetic(), anchor: None };
        assert!(node.as_scalar().is_none());
        assert!(matches!(node.value, YamlValue::Alias(AnchorId(3))));
    }
}
