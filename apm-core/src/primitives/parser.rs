//! Parse one frontmatter-tagged markdown file into a typed primitive.

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use super::frontmatter::{self, FrontmatterDocument, scalar_to_string};
use super::models::{
    Chatmode, Context, ExtraAttributes, Instruction, Memory, Primitive, PrimitiveKind,
    PrimitiveSource,
};

/// Suffix of generic workflow files. Workflows are not primitives; they are
/// consumed by the script runner.
pub const WORKFLOW_SUFFIX: &str = ".prompt.md";

/// A file could not be parsed into a primitive.
#[derive(Debug, thiserror::Error)]
#[error("Failed to parse {}: {reason}", .path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub reason: String,
}

impl ParseError {
    fn new(path: &Path, reason: impl Into<String>) -> Self {
        Self {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

/// Determine the primitive kind for a path. The filename suffix is
/// authoritative; the structured directory segment (`.apm/instructions/`,
/// `.github/chatmodes/`, ...) decides only when the suffix is absent.
pub fn kind_from_path(path: &Path) -> Option<PrimitiveKind> {
    let file_name = path.file_name()?.to_str()?;
    for kind in PrimitiveKind::ALL {
        if file_name.ends_with(kind.suffix()) {
            return Some(kind);
        }
    }

    let parent = path.parent()?.file_name()?.to_str()?;
    PrimitiveKind::ALL
        .into_iter()
        .find(|kind| kind.directory() == parent)
}

/// Derive the canonical primitive name from a path by stripping the kind
/// suffix (`foo.instructions.md` → `foo`).
pub fn extract_primitive_name(path: &Path) -> String {
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("");
    for kind in PrimitiveKind::ALL {
        if let Some(stem) = file_name.strip_suffix(kind.suffix()) {
            return stem.to_string();
        }
    }
    if let Some(stem) = file_name.strip_suffix(WORKFLOW_SUFFIX) {
        return stem.to_string();
    }
    file_name.strip_suffix(".md").unwrap_or(file_name).to_string()
}

/// Parse a primitive file. The returned primitive is tagged
/// [`PrimitiveSource::Local`]; discovery re-tags dependency scopes.
pub fn parse_primitive_file(path: &Path) -> Result<Primitive, ParseError> {
    let kind = kind_from_path(path)
        .ok_or_else(|| ParseError::new(path, "unknown primitive kind".to_string()))?;

    let text = fs::read_to_string(path).map_err(|err| ParseError::new(path, err.to_string()))?;
    let document = frontmatter::split(&text).map_err(|reason| ParseError::new(path, reason))?;

    Ok(build_primitive(kind, path, document))
}

fn build_primitive(kind: PrimitiveKind, path: &Path, document: FrontmatterDocument) -> Primitive {
    let mut attributes = Attributes::take_from(document.metadata);
    let name = extract_primitive_name(path);
    let file_path = path.to_path_buf();
    let content = document.body;

    match kind {
        PrimitiveKind::Chatmode => Primitive::Chatmode(Chatmode {
            name,
            file_path,
            description: attributes.description.take(),
            apply_to: attributes.apply_to.take(),
            content,
            author: attributes.author.take(),
            version: attributes.version.take(),
            source: PrimitiveSource::Local,
            extra: attributes.extra,
        }),
        PrimitiveKind::Instruction => Primitive::Instruction(Instruction {
            name,
            file_path,
            description: attributes.description.take(),
            apply_to: attributes.apply_to.take().unwrap_or_default(),
            content,
            author: attributes.author.take(),
            version: attributes.version.take(),
            source: PrimitiveSource::Local,
            extra: attributes.extra,
        }),
        PrimitiveKind::Context => Primitive::Context(Context {
            name,
            file_path,
            description: attributes.description.take(),
            content,
            author: attributes.author.take(),
            version: attributes.version.take(),
            source: PrimitiveSource::Local,
            extra: attributes.extra,
        }),
        PrimitiveKind::Memory => Primitive::Memory(Memory {
            name,
            file_path,
            description: attributes.description.take(),
            content,
            author: attributes.author.take(),
            version: attributes.version.take(),
            source: PrimitiveSource::Local,
            extra: attributes.extra,
        }),
    }
}

struct Attributes {
    description: Option<String>,
    author: Option<String>,
    version: Option<String>,
    apply_to: Option<String>,
    extra: ExtraAttributes,
}

impl Attributes {
    fn take_from(metadata: IndexMap<String, serde_yaml::Value>) -> Self {
        let mut attributes = Attributes {
            description: None,
            author: None,
            version: None,
            apply_to: None,
            extra: ExtraAttributes::new(),
        };
        for (key, value) in metadata {
            match key.as_str() {
                "description" => attributes.description = scalar_to_string(&value),
                "author" => attributes.author = scalar_to_string(&value),
                "version" => attributes.version = scalar_to_string(&value),
                "applyTo" => attributes.apply_to = scalar_to_string(&value),
                _ => {
                    attributes.extra.insert(key, value);
                }
            }
        }
        attributes
    }
}

/// Re-emit a primitive as frontmatter-tagged markdown. Recognized keys are
/// written in a stable order; the body follows byte-for-byte.
pub fn serialize_primitive(primitive: &Primitive) -> String {
    use serde_yaml::Value;

    let mut metadata: IndexMap<String, Value> = IndexMap::new();
    let mut push = |key: &str, value: &Option<String>| {
        if let Some(value) = value {
            metadata.insert(key.to_string(), Value::String(value.clone()));
        }
    };

    let (content, extra) = match primitive {
        Primitive::Chatmode(p) => {
            push("description", &p.description);
            push("applyTo", &p.apply_to);
            push("author", &p.author);
            push("version", &p.version);
            (&p.content, &p.extra)
        }
        Primitive::Instruction(p) => {
            push("description", &p.description);
            push("applyTo", &Some(p.apply_to.clone()));
            push("author", &p.author);
            push("version", &p.version);
            (&p.content, &p.extra)
        }
        Primitive::Context(p) => {
            push("description", &p.description);
            push("author", &p.author);
            push("version", &p.version);
            (&p.content, &p.extra)
        }
        Primitive::Memory(p) => {
            push("description", &p.description);
            push("author", &p.author);
            push("version", &p.version);
            (&p.content, &p.extra)
        }
    };

    for (key, value) in extra {
        metadata.insert(key.clone(), value.clone());
    }

    frontmatter::serialize(&metadata, content)
}
