//! Recursive-descent tree builder over yaml-rust2's event stream.
//!
//! We deliberately do not use `yaml_rust2::YamlLoader`: it resolves aliases
//! into cloned subtrees as it loads, which destroys the "unresolved name
//! reference" shape the builder needs (§4.5 depends on aliases staying
//! distinct from the node they point to, so forward references and shared
//! instances can be told apart). Implementing `MarkedEventReceiver`
//! ourselves, the way `YamlLoader` itself is implemented internally, gets us
//! the location-tagged event stream with aliases left intact.

use yaml_rust2::parser::{Event, MarkedEventReceiver, Parser};
use yaml_rust2::scanner::Marker;

use super::value::{AnchorId, YamlNode, YamlValue};
use crate::common::{Location, SimError, SimResult};

enum Frame {
    Mapping {
        entries: Vec<(String, YamlNode)>,
        pending_key: Option<String>,
        location: Location,
        anchor: Option<AnchorId>,
    },
    Sequence {
        items: Vec<YamlNode>,
        location: Location,
        anchor: Option<AnchorId>,
    },
}

struct TreeBuilder {
    file: String,
    stack: Vec<Frame>,
    root: Option<YamlNode>,
    error: Option<SimError>,
}

fn anchor_of(aid: usize) -> Option<AnchorId> {
    // yaml-rust2 uses anchor id 0 as the "no anchor" sentinel.
    if aid == 0 {
        None
    } else {
        Some(AnchorId(aid))
    }
}

impl TreeBuilder {
    fn new(file: String) -> Self {
        Self {
            file,
            stack: Vec::new(),
            root: None,
            error: None,
        }
    }

    fn loc(&self, mark: Marker) -> Location {
        Location::new(self.file.clone(), mark.line() as u32, mark.col() as u32 + 1)
    }

    fn fail(&mut self, location: Location, message: impl Into<String>) {
        if self.error.is_none() {
            self.error = Some(SimError::ConfigParse {
                location,
                message: message.into(),
            });
        }
    }

    fn push_value(&mut self, node: YamlNode) {
        match self.stack.last_mut() {
            None => self.root = Some(node),
            Some(Frame::Sequence { items, .. }) => items.push(node),
            Some(Frame::Mapping {
                entries,
                pending_key,
                ..
            }) => match pending_key.take() {
                None => match &node.value {
                    YamlValue::Scalar(s) => *pending_key = Some(s.clone()),
                    _ => {
                        let location = node.location.clone();
                        self.fail(location, "mapping keys must be plain scalars");
                    }
                },
                Some(key) => entries.push((key, node)),
            },
        }
    }
}

impl MarkedEventReceiver for TreeBuilder {
    fn on_event(&mut self, ev: Event, mark: Marker) {
        if self.error.is_some() {
            return;
        }
        let location = self.loc(mark);
        match ev {
            Event::Nothing
            | Event::StreamStart
            | Event::StreamEnd
            | Event::DocumentStart
            | Event::DocumentEnd => {}
            Event::Alias(aid) => {
                let node = YamlNode {
                    value: YamlValue::Alias(AnchorId(aid)),
                    location,
                    anchor: None,
                };
                self.push_value(node);
            }
            Event::Scalar(text, _style, aid, _tag) => {
                let node = YamlNode {
                    value: YamlValue::Scalar(text),
                    location,
                    anchor: anchor_of(aid),
                };
                self.push_value(node);
            }
            Event::SequenceStart(aid, _tag) => {
                self.stack.push(Frame::Sequence {
                    items: Vec::new(),
                    location,
                    anchor: anchor_of(aid),
                });
            }
            Event::SequenceEnd => {
                if let Some(Frame::Sequence {
                    items,
                    location,
                    anchor,
                }) = self.stack.pop()
                {
                    self.push_value(YamlNode {
                        value: YamlValue::Array(items),
                        location,
                        anchor,
                    });
                } else {
                    self.fail(location, "unbalanced sequence end");
                }
            }
            Event::MappingStart(aid, _tag) => {
                self.stack.push(Frame::Mapping {
                    entries: Vec::new(),
                    pending_key: None,
                    location,
                    anchor: anchor_of(aid),
                });
            }
            Event::MappingEnd => {
                if let Some(Frame::Mapping {
                    entries,
                    location,
                    anchor,
                    ..
                }) = self.stack.pop()
                {
                    self.push_value(YamlNode {
                        value: YamlValue::Mapping(entries),
                        location,
                        anchor,
                    });
                } else {
                    self.fail(location, "unbalanced mapping end");
                }
            }
        }
    }
}

/// Parses `text` (the contents of `file`, used only for diagnostics) into a
/// single root [`YamlNode`]. Does not resolve `include:`; see
/// [`super::include::load_with_includes`] for the full pipeline.
pub fn parse_str(file: &str, text: &str) -> SimResult<YamlNode> {
    let mut builder = TreeBuilder::new(file.to_string());
    let mut parser = Parser::new(text.chars());
    parser.load(&mut builder, false).map_err(|e| SimError::ConfigParse {
        location: Location::new(file.to_string(), e.marker().line() as u32, e.marker().col() as u32 + 1),
        message: e.info().to_string(),
    })?;
    if let Some(err) = builder.error {
        return Err(err);
    }
    builder.root.ok_or_else(|| SimError::ConfigParse {
        location: Location::new(file.to_string(), 1, 1),
        message: "empty document".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_mapping_with_scalars() {
        let node = parse_str("t.yaml", "class: SimpleMemory\nlatency: 4\n").unwrap();
        let entries = node.as_mapping().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "class");
        assert_eq!(entries[0].1.as_scalar(), Some("SimpleMemory"));
        assert_eq!(entries[1].1.as_scalar(), Some("4"));
    }

    #[test]
    fn preserves_anchor_and_alias_identity() {
        let node = parse_str(
            "t.yaml",
            "mem: &shared\n  class: SimpleMemory\ncore1:\n  dataMemory: *shared\n",
        )
        .unwrap();
        let mem_node = node.get("mem").unwrap();
        let anchor = mem_node.anchor.expect("mem should carry an anchor id");
        let alias_node = node.get("core1").unwrap().get("dataMemory").unwrap();
        match &alias_node.value {
            YamlValue::Alias(id) => assert_eq!(*id, anchor),
            other => panic!("expected alias, got {other:?}"),
        }
    }

    #[test]
    fn reports_location_on_bad_key() {
        let err = parse_str("t.yaml", "[1,2]:\n  x: 1\n");
        assert!(err.is_err());
    }
}
