//! Agent primitives: typed model, frontmatter parser, and discovery.

pub mod discovery;
pub mod frontmatter;
pub mod models;
pub mod parser;

pub use discovery::{Scope, discover_primitives, discover_with_dependencies, find_primitive_files};
pub use models::{
    Chatmode, Context, Instruction, Memory, Primitive, PrimitiveCollection, PrimitiveKind,
    PrimitiveSource,
};
pub use parser::{ParseError, extract_primitive_name, parse_primitive_file, serialize_primitive};
