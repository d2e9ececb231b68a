//! Typed agent primitives and the collection that owns them.

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;

/// Frontmatter keys the parser does not interpret; preserved verbatim for
/// forward compatibility.
pub type ExtraAttributes = IndexMap<String, serde_yaml::Value>;

/// The four primitive kinds recognized by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveKind {
    Chatmode,
    Instruction,
    Context,
    Memory,
}

impl PrimitiveKind {
    pub const ALL: [PrimitiveKind; 4] = [
        PrimitiveKind::Chatmode,
        PrimitiveKind::Instruction,
        PrimitiveKind::Context,
        PrimitiveKind::Memory,
    ];

    /// Filename suffix that selects this kind.
    pub fn suffix(self) -> &'static str {
        match self {
            PrimitiveKind::Chatmode => ".chatmode.md",
            PrimitiveKind::Instruction => ".instructions.md",
            PrimitiveKind::Context => ".context.md",
            PrimitiveKind::Memory => ".memory.md",
        }
    }

    /// Directory segment under `.apm/` (or `.github/`) that holds this kind.
    pub fn directory(self) -> &'static str {
        match self {
            PrimitiveKind::Chatmode => "chatmodes",
            PrimitiveKind::Instruction => "instructions",
            PrimitiveKind::Context => "context",
            PrimitiveKind::Memory => "memory",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PrimitiveKind::Chatmode => "chatmode",
            PrimitiveKind::Instruction => "instruction",
            PrimitiveKind::Context => "context",
            PrimitiveKind::Memory => "memory",
        }
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where a primitive was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrimitiveSource {
    Local,
    /// Display name of the dependency that provided the primitive.
    Dependency(String),
}

impl PrimitiveSource {
    pub fn is_local(&self) -> bool {
        matches!(self, PrimitiveSource::Local)
    }
}

impl fmt::Display for PrimitiveSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimitiveSource::Local => f.write_str("local"),
            PrimitiveSource::Dependency(name) => f.write_str(name),
        }
    }
}

impl Default for PrimitiveSource {
    fn default() -> Self {
        PrimitiveSource::Local
    }
}

/// Persona definition, optionally scoped to a file pattern.
#[derive(Debug, Clone, PartialEq)]
pub struct Chatmode {
    pub name: String,
    pub file_path: PathBuf,
    pub description: Option<String>,
    pub apply_to: Option<String>,
    pub content: String,
    pub author: Option<String>,
    pub version: Option<String>,
    pub source: PrimitiveSource,
    pub extra: ExtraAttributes,
}

impl Chatmode {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self
            .description
            .as_deref()
            .is_none_or(|d| d.trim().is_empty())
        {
            errors.push("Missing 'description' in frontmatter".to_string());
        }
        if self.content.trim().is_empty() {
            errors.push("Empty content".to_string());
        }
        errors
    }
}

/// Prescriptive guidance for files matching a glob pattern. The pattern is
/// required.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub name: String,
    pub file_path: PathBuf,
    pub description: Option<String>,
    pub apply_to: String,
    pub content: String,
    pub author: Option<String>,
    pub version: Option<String>,
    pub source: PrimitiveSource,
    pub extra: ExtraAttributes,
}

impl Instruction {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.apply_to.trim().is_empty() {
            errors.push("Missing 'applyTo' in frontmatter".to_string());
        }
        if self.content.trim().is_empty() {
            errors.push("Empty content".to_string());
        }
        errors
    }
}

/// Freeform reference material, loaded verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Context {
    pub name: String,
    pub file_path: PathBuf,
    pub description: Option<String>,
    pub content: String,
    pub author: Option<String>,
    pub version: Option<String>,
    pub source: PrimitiveSource,
    pub extra: ExtraAttributes,
}

impl Context {
    pub fn validate(&self) -> Vec<String> {
        if self.content.trim().is_empty() {
            vec!["Empty content".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// Persisted agent notes. Same shape as [`Context`].
#[derive(Debug, Clone, PartialEq)]
pub struct Memory {
    pub name: String,
    pub file_path: PathBuf,
    pub description: Option<String>,
    pub content: String,
    pub author: Option<String>,
    pub version: Option<String>,
    pub source: PrimitiveSource,
    pub extra: ExtraAttributes,
}

impl Memory {
    pub fn validate(&self) -> Vec<String> {
        if self.content.trim().is_empty() {
            vec!["Empty content".to_string()]
        } else {
            Vec::new()
        }
    }
}

/// A parsed primitive of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Primitive {
    Chatmode(Chatmode),
    Instruction(Instruction),
    Context(Context),
    Memory(Memory),
}

impl Primitive {
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::Chatmode(_) => PrimitiveKind::Chatmode,
            Primitive::Instruction(_) => PrimitiveKind::Instruction,
            Primitive::Context(_) => PrimitiveKind::Context,
            Primitive::Memory(_) => PrimitiveKind::Memory,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Primitive::Chatmode(p) => &p.name,
            Primitive::Instruction(p) => &p.name,
            Primitive::Context(p) => &p.name,
            Primitive::Memory(p) => &p.name,
        }
    }

    pub fn file_path(&self) -> &PathBuf {
        match self {
            Primitive::Chatmode(p) => &p.file_path,
            Primitive::Instruction(p) => &p.file_path,
            Primitive::Context(p) => &p.file_path,
            Primitive::Memory(p) => &p.file_path,
        }
    }

    pub fn source(&self) -> &PrimitiveSource {
        match self {
            Primitive::Chatmode(p) => &p.source,
            Primitive::Instruction(p) => &p.source,
            Primitive::Context(p) => &p.source,
            Primitive::Memory(p) => &p.source,
        }
    }

    pub fn set_source(&mut self, source: PrimitiveSource) {
        match self {
            Primitive::Chatmode(p) => p.source = source,
            Primitive::Instruction(p) => p.source = source,
            Primitive::Context(p) => p.source = source,
            Primitive::Memory(p) => p.source = source,
        }
    }

    pub fn validate(&self) -> Vec<String> {
        match self {
            Primitive::Chatmode(p) => p.validate(),
            Primitive::Instruction(p) => p.validate(),
            Primitive::Context(p) => p.validate(),
            Primitive::Memory(p) => p.validate(),
        }
    }
}

/// Discovery-ordered collection of primitives, one sequence per kind.
///
/// Insertion order encodes precedence: local before dependency, earlier
/// dependency before later. Within a scope a later duplicate `(kind, name)`
/// replaces the earlier one in place; cross-scope precedence is enforced by
/// discovery, which skips lower-precedence duplicates before they get here.
#[derive(Debug, Clone, Default)]
pub struct PrimitiveCollection {
    pub chatmodes: Vec<Chatmode>,
    pub instructions: Vec<Instruction>,
    pub contexts: Vec<Context>,
    pub memories: Vec<Memory>,
}

impl PrimitiveCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a primitive, replacing an existing one with the same
    /// `(kind, name)` in place. Returns the replaced primitive, if any.
    pub fn add_primitive(&mut self, primitive: Primitive) -> Option<Primitive> {
        match primitive {
            Primitive::Chatmode(p) => {
                Self::insert(&mut self.chatmodes, p).map(Primitive::Chatmode)
            }
            Primitive::Instruction(p) => {
                Self::insert(&mut self.instructions, p).map(Primitive::Instruction)
            }
            Primitive::Context(p) => Self::insert(&mut self.contexts, p).map(Primitive::Context),
            Primitive::Memory(p) => Self::insert(&mut self.memories, p).map(Primitive::Memory),
        }
    }

    fn insert<T: Named>(items: &mut Vec<T>, item: T) -> Option<T> {
        match items
            .iter()
            .position(|existing| existing.primitive_name() == item.primitive_name())
        {
            Some(position) => Some(std::mem::replace(&mut items[position], item)),
            None => {
                items.push(item);
                None
            }
        }
    }

    /// Whether a primitive with this `(kind, name)` is already present.
    pub fn contains(&self, kind: PrimitiveKind, name: &str) -> bool {
        match kind {
            PrimitiveKind::Chatmode => self.chatmodes.iter().any(|p| p.name == name),
            PrimitiveKind::Instruction => self.instructions.iter().any(|p| p.name == name),
            PrimitiveKind::Context => self.contexts.iter().any(|p| p.name == name),
            PrimitiveKind::Memory => self.memories.iter().any(|p| p.name == name),
        }
    }

    pub fn find_chatmode(&self, name: &str) -> Option<&Chatmode> {
        self.chatmodes.iter().find(|c| c.name == name)
    }

    pub fn count(&self) -> usize {
        self.chatmodes.len() + self.instructions.len() + self.contexts.len() + self.memories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    /// All primitives in kind order (chatmodes, instructions, contexts,
    /// memories), cloned into the enum representation.
    pub fn all_primitives(&self) -> Vec<Primitive> {
        let mut all = Vec::with_capacity(self.count());
        all.extend(self.chatmodes.iter().cloned().map(Primitive::Chatmode));
        all.extend(self.instructions.iter().cloned().map(Primitive::Instruction));
        all.extend(self.contexts.iter().cloned().map(Primitive::Context));
        all.extend(self.memories.iter().cloned().map(Primitive::Memory));
        all
    }
}

trait Named {
    fn primitive_name(&self) -> &str;
}

impl Named for Chatmode {
    fn primitive_name(&self) -> &str {
        &self.name
    }
}

impl Named for Instruction {
    fn primitive_name(&self) -> &str {
        &self.name
    }
}

impl Named for Context {
    fn primitive_name(&self) -> &str {
        &self.name
    }
}

impl Named for Memory {
    fn primitive_name(&self) -> &str {
        &self.name
    }
}
