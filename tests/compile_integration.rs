//! End-to-end compilation: discovery, precedence, constitution embedding,
//! and write-failure behavior.

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use apm_core::compilation::{AgentsCompiler, CompilationConfig, compute_constitution_hash};
use apm_core::deps::installed_scopes;
use apm_core::manifest::{APMPackage, CompilationStrategy};
use apm_core::primitives::discover_with_dependencies;

fn write(root: &Path, relative: &str, content: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn single_file_config() -> CompilationConfig {
    CompilationConfig {
        strategy: CompilationStrategy::SingleFile,
        resolve_links: false,
        ..CompilationConfig::default()
    }
}

/// Local primitives shadow dependency primitives with the same name; the
/// compiled output contains exactly one section, from the local source.
#[test]
fn local_primitive_overrides_dependency() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        "apm.yml",
        "name: host\nversion: 1.0.0\ndependencies:\n  apm:\n    - acme/compliance-rules\n",
    );
    write(
        tmp.path(),
        ".apm/instructions/legal-compliance.instructions.md",
        "---\ndescription: Local legal rules\napplyTo: \"**/*.md\"\n---\n\nLocal legal requirements apply here.\n",
    );
    write(
        tmp.path(),
        "apm_modules/acme/compliance-rules/apm.yml",
        "name: compliance-rules\nversion: 1.0.0\n",
    );
    write(
        tmp.path(),
        "apm_modules/acme/compliance-rules/.apm/instructions/legal-compliance.instructions.md",
        "---\ndescription: Upstream legal rules\napplyTo: \"**/*.md\"\n---\n\nUpstream legal requirements.\n",
    );

    let package = APMPackage::from_apm_yml(&tmp.path().join("apm.yml")).unwrap();
    let scopes = installed_scopes(tmp.path(), Some(&package));
    assert_eq!(scopes.len(), 1);

    let (primitives, _) = discover_with_dependencies(tmp.path(), &scopes).unwrap();
    assert_eq!(primitives.instructions.len(), 1);
    assert!(primitives.instructions[0].source.is_local());

    let compiler = AgentsCompiler::new(tmp.path());
    let result = compiler.compile(&single_file_config(), &primitives).unwrap();

    assert!(result.content.contains("Local legal requirements apply here."));
    assert!(!result.content.contains("Upstream legal requirements."));
}

/// Dependency primitives that the project does not shadow are compiled in.
#[test]
fn dependency_primitives_are_included() {
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), "apm.yml", "name: host\nversion: 1.0.0\n");
    write(
        tmp.path(),
        "apm_modules/acme/design-guidelines/.apm/instructions/design.instructions.md",
        "---\ndescription: Design rules\napplyTo: \"**/*.css\"\n---\n\nUse design tokens.\n",
    );

    let package = APMPackage::from_apm_yml(&tmp.path().join("apm.yml")).unwrap();
    let scopes = installed_scopes(tmp.path(), Some(&package));
    let (primitives, _) = discover_with_dependencies(tmp.path(), &scopes).unwrap();

    assert_eq!(primitives.instructions.len(), 1);
    assert!(!primitives.instructions[0].source.is_local());

    let compiler = AgentsCompiler::new(tmp.path());
    let result = compiler.compile(&single_file_config(), &primitives).unwrap();
    assert!(result.content.contains("Use design tokens."));
}

/// Compiling twice yields byte-identical output, including the constitution
/// hash.
#[test]
fn constitution_hash_is_stable_across_compiles() {
    let constitution = "Ship Fast.\nTest First.\n";
    let tmp = TempDir::new().unwrap();
    write(tmp.path(), ".specify/memory/constitution.md", constitution);
    write(
        tmp.path(),
        ".apm/instructions/test.instructions.md",
        "---\ndescription: Test\napplyTo: \"**/*.md\"\n---\n\nBody.\n",
    );

    let compile_once = || {
        let (primitives, _) = discover_with_dependencies(tmp.path(), &[]).unwrap();
        let compiler = AgentsCompiler::new(tmp.path());
        compiler
            .compile(&single_file_config(), &primitives)
            .unwrap()
            .content
    };

    let first = compile_once();
    let second = compile_once();
    assert_eq!(first, second);

    let expected_hash = compute_constitution_hash(constitution);
    assert_eq!(expected_hash.len(), 12);
    assert!(first.contains(&expected_hash));

    let other_hash = compute_constitution_hash("Ship Fast.\nTest First. ");
    assert_ne!(expected_hash, other_hash);
    assert!(!first.contains(&other_hash));
}

/// Written output equals the assembled content and lands atomically.
#[test]
fn compile_writes_agents_md_to_disk() {
    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        ".apm/instructions/python.instructions.md",
        "---\ndescription: Python\napplyTo: \"**/*.py\"\n---\n\nUse type hints.\n",
    );
    write(tmp.path(), "src/app.py", "print('hi')\n");

    let (primitives, _) = discover_with_dependencies(tmp.path(), &[]).unwrap();
    let compiler = AgentsCompiler::new(tmp.path());
    let config = CompilationConfig {
        resolve_links: false,
        ..CompilationConfig::default()
    };
    let result = compiler.compile(&config, &primitives).unwrap();

    assert!(!result.files_written.is_empty());
    for path in &result.files_written {
        let written = fs::read_to_string(path).unwrap();
        assert!(written.starts_with("# AGENTS.md"));
    }
}

/// A read-only project root fails with `Failed to write` and leaves no
/// partially written AGENTS.md behind.
#[cfg(unix)]
#[test]
fn read_only_root_fails_without_partial_output() {
    use std::os::unix::fs::PermissionsExt;

    let tmp = TempDir::new().unwrap();
    write(
        tmp.path(),
        ".apm/instructions/test.instructions.md",
        "---\ndescription: Test\napplyTo: \"**/*.md\"\n---\n\nBody.\n",
    );
    write(tmp.path(), ".specify/memory/constitution.md", "Rules.\n");

    let (primitives, _) = discover_with_dependencies(tmp.path(), &[]).unwrap();
    let compiler = AgentsCompiler::new(tmp.path());

    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o555)).unwrap();
    let outcome = compiler.compile(&single_file_config(), &primitives);
    fs::set_permissions(tmp.path(), fs::Permissions::from_mode(0o755)).unwrap();

    let err = outcome.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to write"));
    assert!(!tmp.path().join("AGENTS.md").exists());
}
