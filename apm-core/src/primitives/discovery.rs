//! Walk the project and dependency scopes for primitive files.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::debug;

use crate::diagnostics::Diagnostic;

use super::models::{Primitive, PrimitiveCollection, PrimitiveKind, PrimitiveSource};
use super::parser::parse_primitive_file;

/// A root directory contributing primitives, with the attribution tag used
/// for everything found inside it.
#[derive(Debug, Clone)]
pub struct Scope {
    pub source: PrimitiveSource,
    pub root: PathBuf,
}

impl Scope {
    pub fn local(root: &Path) -> Self {
        Self {
            source: PrimitiveSource::Local,
            root: root.to_path_buf(),
        }
    }

    pub fn dependency(name: &str, root: &Path) -> Self {
        Self {
            source: PrimitiveSource::Dependency(name.to_string()),
            root: root.to_path_buf(),
        }
    }
}

/// Enumerate primitive files in one scope, sorted lexicographically.
///
/// Locations searched: `.apm/{chatmodes,instructions,context,memory}/`,
/// the `.github/{chatmodes,instructions}/` compatibility shadow, and
/// top-level `*.{kind}.md` files.
pub fn find_primitive_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for kind in PrimitiveKind::ALL {
        collect_suffixed(&root.join(".apm").join(kind.directory()), kind, &mut files);
    }
    for kind in [PrimitiveKind::Chatmode, PrimitiveKind::Instruction] {
        collect_suffixed(
            &root.join(".github").join(kind.directory()),
            kind,
            &mut files,
        );
    }
    for kind in PrimitiveKind::ALL {
        collect_suffixed(root, kind, &mut files);
    }

    files.sort();
    files.dedup();
    files
}

fn collect_suffixed(dir: &Path, kind: PrimitiveKind, files: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let is_match = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(kind.suffix()));
        if is_match && path.is_file() {
            files.push(path);
        }
    }
}

/// Discover primitives in the local scope only.
pub fn discover_primitives(root: &Path) -> Result<(PrimitiveCollection, Vec<Diagnostic>)> {
    discover_in_scopes(std::iter::once(Scope::local(root)))
}

/// Discover primitives across the local scope followed by dependency scopes
/// in resolution order. Because the local scope is consumed first and
/// lower-precedence duplicates are skipped, local definitions always win and
/// earlier dependencies beat later ones.
pub fn discover_with_dependencies(
    root: &Path,
    dependency_scopes: &[Scope],
) -> Result<(PrimitiveCollection, Vec<Diagnostic>)> {
    let scopes = std::iter::once(Scope::local(root)).chain(dependency_scopes.iter().cloned());
    discover_in_scopes(scopes)
}

fn discover_in_scopes(
    scopes: impl Iterator<Item = Scope>,
) -> Result<(PrimitiveCollection, Vec<Diagnostic>)> {
    let mut collection = PrimitiveCollection::new();
    let mut diagnostics = Vec::new();
    // (kind, name) -> rank of the scope that provided the surviving copy.
    let mut provenance: HashMap<(PrimitiveKind, String), usize> = HashMap::new();

    for (rank, scope) in scopes.enumerate() {
        collect_scope(
            &scope,
            rank,
            &mut collection,
            &mut provenance,
            &mut diagnostics,
        );
    }

    Ok((collection, diagnostics))
}

fn collect_scope(
    scope: &Scope,
    rank: usize,
    collection: &mut PrimitiveCollection,
    provenance: &mut HashMap<(PrimitiveKind, String), usize>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for path in find_primitive_files(&scope.root) {
        let mut primitive = match parse_primitive_file(&path) {
            Ok(primitive) => primitive,
            Err(err) => {
                diagnostics.push(Diagnostic::warning(format!("Skipping {err}")));
                continue;
            }
        };

        let validation_errors = primitive.validate();
        if !validation_errors.is_empty() {
            diagnostics.push(Diagnostic::warning(format!(
                "Skipping {}: {}",
                path.display(),
                validation_errors.join("; ")
            )));
            continue;
        }

        primitive.set_source(scope.source.clone());
        let key = (primitive.kind(), primitive.name().to_string());

        match provenance.get(&key) {
            // An earlier (higher-precedence) scope already provided this
            // primitive; the later copy is dropped.
            Some(&existing_rank) if existing_rank < rank => {
                diagnostics.push(Diagnostic::info(format!(
                    "{} '{}' from {} overridden by a higher-precedence definition",
                    key.0, key.1, scope.source
                )));
                continue;
            }
            // Same scope: lexicographically later file wins.
            Some(_) => {
                debug!(
                    kind = %key.0,
                    name = %key.1,
                    "duplicate primitive within scope, last definition wins"
                );
            }
            None => {}
        }

        provenance.insert(key, rank);
        collection.add_primitive(primitive);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn instruction_file(description: &str, body: &str) -> String {
        format!("---\ndescription: {description}\napplyTo: \"**/*.py\"\n---\n\n{body}\n")
    }

    #[test]
    fn discovers_structured_and_top_level_files() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            ".apm/instructions/python.instructions.md",
            &instruction_file("Python", "Use type hints."),
        );
        write(
            tmp.path(),
            ".apm/chatmodes/reviewer.chatmode.md",
            "---\ndescription: Reviewer\n---\n\nYou review code.\n",
        );
        write(
            tmp.path(),
            ".github/instructions/style.instructions.md",
            &instruction_file("Style", "Follow the style guide."),
        );
        write(
            tmp.path(),
            "notes.context.md",
            "---\ndescription: Notes\n---\n\nBackground notes.\n",
        );
        // Not a primitive location: nested source directory.
        write(
            tmp.path(),
            "src/hidden.instructions.md",
            &instruction_file("Hidden", "Should not be found."),
        );

        let (collection, diagnostics) = discover_primitives(tmp.path()).unwrap();
        assert_eq!(collection.instructions.len(), 2);
        assert_eq!(collection.chatmodes.len(), 1);
        assert_eq!(collection.contexts.len(), 1);
        assert!(diagnostics.is_empty());
        assert!(collection.instructions.iter().all(|i| i.source.is_local()));
    }

    #[test]
    fn malformed_files_are_skipped_with_diagnostics() {
        let tmp = TempDir::new().unwrap();
        write(
            tmp.path(),
            ".apm/instructions/good.instructions.md",
            &instruction_file("Good", "Valid."),
        );
        write(
            tmp.path(),
            ".apm/instructions/bad.instructions.md",
            "---\ninvalid yaml: [\n---\n\nBody.\n",
        );

        let (collection, diagnostics) = discover_primitives(tmp.path()).unwrap();
        assert_eq!(collection.instructions.len(), 1);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_warning());
        assert!(diagnostics[0].message.contains("bad.instructions.md"));
    }

    #[test]
    fn invalid_primitives_are_excluded() {
        let tmp = TempDir::new().unwrap();
        // Instruction without applyTo fails validation.
        write(
            tmp.path(),
            ".apm/instructions/no-pattern.instructions.md",
            "---\ndescription: Missing pattern\n---\n\nBody.\n",
        );

        let (collection, diagnostics) = discover_primitives(tmp.path()).unwrap();
        assert!(collection.instructions.is_empty());
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].message.contains("applyTo"));
    }

    #[test]
    fn local_definition_beats_dependency() {
        let project = TempDir::new().unwrap();
        let dependency = TempDir::new().unwrap();

        write(
            project.path(),
            ".apm/instructions/legal-compliance.instructions.md",
            &instruction_file("Local rules", "Local compliance body."),
        );
        write(
            dependency.path(),
            ".apm/instructions/legal-compliance.instructions.md",
            &instruction_file("Dependency rules", "Dependency compliance body."),
        );

        let scopes = vec![Scope::dependency(
            "acme/compliance-rules",
            dependency.path(),
        )];
        let (collection, diagnostics) =
            discover_with_dependencies(project.path(), &scopes).unwrap();

        assert_eq!(collection.instructions.len(), 1);
        let survivor = &collection.instructions[0];
        assert_eq!(survivor.name, "legal-compliance");
        assert!(survivor.source.is_local());
        assert!(survivor.content.contains("Local compliance body."));
        assert!(
            diagnostics
                .iter()
                .any(|d| d.message.contains("overridden"))
        );
    }

    #[test]
    fn earlier_dependency_beats_later() {
        let project = TempDir::new().unwrap();
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();

        write(
            first.path(),
            ".apm/context/shared.context.md",
            "---\ndescription: First\n---\n\nFrom the first dependency.\n",
        );
        write(
            second.path(),
            ".apm/context/shared.context.md",
            "---\ndescription: Second\n---\n\nFrom the second dependency.\n",
        );

        let scopes = vec![
            Scope::dependency("acme/first", first.path()),
            Scope::dependency("acme/second", second.path()),
        ];
        let (collection, _) = discover_with_dependencies(project.path(), &scopes).unwrap();

        assert_eq!(collection.contexts.len(), 1);
        assert!(collection.contexts[0].content.contains("first dependency"));
        assert_eq!(
            collection.contexts[0].source,
            PrimitiveSource::Dependency("acme/first".to_string())
        );
    }

    #[test]
    fn empty_project_discovers_nothing() {
        let tmp = TempDir::new().unwrap();
        let (collection, diagnostics) = discover_primitives(tmp.path()).unwrap();
        assert!(collection.is_empty());
        assert!(diagnostics.is_empty());
    }
}
