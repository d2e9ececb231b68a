//! YAML frontmatter splitting shared by the primitive parser and the
//! workflow (`*.prompt.md`) loader.

use indexmap::IndexMap;
use serde_yaml::Value;

/// A markdown document split into frontmatter metadata and body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrontmatterDocument {
    /// Frontmatter keys in document order. Empty when the file carries no
    /// frontmatter.
    pub metadata: IndexMap<String, Value>,
    /// Markdown body after the closing delimiter.
    pub body: String,
}

/// Split a document into frontmatter and body.
///
/// Frontmatter is delimited by a `---` line at the very start of the file and
/// a matching `---` line after it. A document that does not start with `---`
/// has no frontmatter; an opening delimiter without a closing one, or invalid
/// YAML between the delimiters, is an error.
pub fn split(text: &str) -> Result<FrontmatterDocument, String> {
    let Some(after_open) = strip_delimiter_line(text) else {
        return Ok(FrontmatterDocument {
            metadata: IndexMap::new(),
            body: text.to_string(),
        });
    };

    let mut offset = 0usize;
    for line in after_open.split_inclusive('\n') {
        if is_delimiter_line(line) {
            let yaml_text = &after_open[..offset];
            let body_start = offset + line.len();
            let body = after_open[body_start..]
                .strip_prefix('\n')
                .unwrap_or(&after_open[body_start..])
                .to_string();
            let metadata = parse_metadata(yaml_text)?;
            return Ok(FrontmatterDocument { metadata, body });
        }
        offset += line.len();
    }

    Err("unterminated frontmatter: missing closing '---' delimiter".to_string())
}

/// Re-emit a document with frontmatter. Keys are written in map order; the
/// body is appended byte-for-byte after a blank separator line.
pub fn serialize(metadata: &IndexMap<String, Value>, body: &str) -> String {
    if metadata.is_empty() {
        return body.to_string();
    }

    let mut mapping = serde_yaml::Mapping::new();
    for (key, value) in metadata {
        mapping.insert(Value::String(key.clone()), value.clone());
    }
    // serde_yaml always terminates the document with a newline.
    let yaml = serde_yaml::to_string(&mapping).unwrap_or_default();
    format!("---\n{yaml}---\n\n{body}")
}

/// Coerce a scalar frontmatter value to its string form. Returns `None` for
/// sequences, mappings, and null.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn parse_metadata(yaml_text: &str) -> Result<IndexMap<String, Value>, String> {
    if yaml_text.trim().is_empty() {
        return Ok(IndexMap::new());
    }
    let value: Value =
        serde_yaml::from_str(yaml_text).map_err(|err| format!("invalid frontmatter YAML: {err}"))?;
    match value {
        Value::Mapping(mapping) => {
            let mut metadata = IndexMap::new();
            for (key, value) in mapping {
                let Value::String(key) = key else {
                    return Err("frontmatter keys must be strings".to_string());
                };
                metadata.insert(key, value);
            }
            Ok(metadata)
        }
        Value::Null => Ok(IndexMap::new()),
        _ => Err("frontmatter must be a YAML mapping".to_string()),
    }
}

fn strip_delimiter_line(text: &str) -> Option<&str> {
    let rest = text.strip_prefix("---")?;
    rest.strip_prefix('\n')
        .or_else(|| rest.strip_prefix("\r\n"))
}

fn is_delimiter_line(line: &str) -> bool {
    line.trim_end_matches(['\r', '\n']) == "---"
}
