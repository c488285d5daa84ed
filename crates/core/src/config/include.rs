//! File-inclusion resolution (§4.4 "Include directive").
//!
//! If a mapping's top-level `include` key names one or more paths, those
//! files are parsed (resolving their own `include` directives first) and
//! their key/value pairs are spliced in ahead of the file's own entries —
//! equivalent to textually concatenating the included files before the
//! current one and then parsing the result.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::parser::parse_str;
use super::value::{YamlNode, YamlValue};
use crate::common::{Location, SimError, SimResult};

/// Parses `path` from disk and fully resolves its `include` directives
/// (recursively, so an included file may itself include further files).
pub fn load_file(path: &Path) -> SimResult<YamlNode> {
    let text = fs::read_to_string(path).map_err(|e| SimError::ConfigParse {
        location: Location::new(path.display().to_string(), 0, 0),
        message: format!("cannot read file: {e}"),
    })?;
    let label = path.display().to_string();
    let root = parse_str(&label, &text)?;
    resolve_includes(root, path)
}

fn resolve_includes(node: YamlNode, path: &Path) -> SimResult<YamlNode> {
    let YamlValue::Mapping(entries) = &node.value else {
        return Ok(node);
    };

    let Some((_, include_val)) = entries.iter().find(|(k, _)| k == "include") else {
        return Ok(node);
    };
    let include_val = include_val.clone();
    let entries = entries.clone();

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    let included_paths = collect_include_paths(&include_val)?;

    let mut merged: Vec<(String, YamlNode)> = Vec::new();
    let mut seen: HashMap<String, Location> = HashMap::new();
    for rel in included_paths {
        let included_root = load_file(&base_dir.join(&rel))?;
        match included_root.value {
            YamlValue::Mapping(inc_entries) => {
                for (key, value) in inc_entries {
                    if let Some(first) = seen.get(&key) {
                        return Err(SimError::semantic(
                            value.location.clone(),
                            &key,
                            format!("key also defined at {first}, via an earlier include"),
                        ));
                    }
                    seen.insert(key.clone(), value.location.clone());
                    merged.push((key, value));
                }
            }
            _ => {
                return Err(SimError::semantic(
                    include_val.location.clone(),
                    "include",
                    format!("included file '{rel}' must parse to a mapping, not a scalar/sequence"),
                ));
            }
        }
    }
    for (key, value) in entries {
        if key == "include" {
            continue;
        }
        if let Some(first) = seen.get(&key) {
            return Err(SimError::semantic(
                value.location.clone(),
                &key,
                format!("key also defined at {first}, by an included file"),
            ));
        }
        seen.insert(key.clone(), value.location.clone());
        merged.push((key, value));
    }

    Ok(YamlNode {
        value: YamlValue::Mapping(merged),
        location: node.location,
        anchor: node.anchor,
    })
}

fn collect_include_paths(include_val: &YamlNode) -> SimResult<Vec<String>> {
    match &include_val.value {
        YamlValue::Scalar(s) => Ok(vec![s.clone()]),
        YamlValue::Array(items) => items
            .iter()
            .map(|item| match &item.value {
                YamlValue::Scalar(s) => Ok(s.clone()),
                _ => Err(SimError::semantic(
                    item.location.clone(),
                    "include",
                    "array elements must be plain strings naming a file",
                )),
            })
            .collect(),
        _ => Err(SimError::semantic(
            include_val.location.clone(),
            "include",
            "must be a string path or an array of string paths",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn splices_single_include_ahead_of_own_entries() {
        let dir = tempfile::tempdir().unwrap();
        let a_path = dir.path().join("a.yaml");
        let mut a = fs::File::create(&a_path).unwrap();
        writeln!(a, "shared: {{class: SimpleMemory}}").unwrap();

        let root_path = dir.path().join("root.yaml");
        let mut root = fs::File::create(&root_path).unwrap();
        writeln!(root, "include: a.yaml\ncore: {{class: SimpleCore}}").unwrap();

        let merged = load_file(&root_path).unwrap();
        let entries = merged.as_mapping().unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["shared", "core"]);
    }

    #[test]
    fn array_of_includes_concatenates_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "a_key: {class: A}\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "b_key: {class: B}\n").unwrap();
        fs::write(
            dir.path().join("root.yaml"),
            "include: [a.yaml, b.yaml]\nown_key: {class: C}\n",
        )
        .unwrap();

        let merged = load_file(&dir.path().join("root.yaml")).unwrap();
        let keys: Vec<&str> = merged
            .as_mapping()
            .unwrap()
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["a_key", "b_key", "own_key"]);
    }

    #[test]
    fn duplicate_key_across_include_and_own_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "shared: {class: A}\n").unwrap();
        fs::write(
            dir.path().join("root.yaml"),
            "include: a.yaml\nshared: {class: B}\n",
        )
        .unwrap();

        let err = load_file(&dir.path().join("root.yaml")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("shared"), "{message}");
        assert!(message.contains("a.yaml"), "{message}");
    }

    #[test]
    fn duplicate_key_across_two_includes_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), "shared: {class: A}\n").unwrap();
        fs::write(dir.path().join("b.yaml"), "shared: {class: B}\n").unwrap();
        fs::write(
            dir.path().join("root.yaml"),
            "include: [a.yaml, b.yaml]\nown_key: {class: C}\n",
        )
        .unwrap();

        let err = load_file(&dir.path().join("root.yaml")).unwrap_err();
        assert!(err.to_string().contains("shared"));
    }
}
