//! Configuration model: the YAML value tree, its parser, and file-include
//! resolution (§4.4). The typed accessors and [`crate::builder::ConfigContext`]
//! that components actually call during wiring live in [`crate::builder`],
//! since resolving a `component_reference` parameter requires the builder's
//! live instance/definition tables, not just the raw parsed tree.

mod include;
mod parser;
mod value;

pub use include::load_file;
pub use parser::parse_str;
pub use value::{AnchorId, YamlNode, YamlValue};
