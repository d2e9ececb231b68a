//! Placement invariants: coverage, no data loss, determinism.

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use apm_core::compilation::{ContextOptimizer, PatternSet};
use apm_core::primitives::{Instruction, PrimitiveSource};

fn touch(root: &Path, relative: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, "content").unwrap();
}

fn instruction(name: &str, apply_to: &str) -> Instruction {
    Instruction {
        name: name.to_string(),
        file_path: PathBuf::from(format!("{name}.instructions.md")),
        description: Some(name.to_string()),
        apply_to: apply_to.to_string(),
        content: format!("{name} body"),
        author: None,
        version: None,
        source: PrimitiveSource::Local,
        extra: Default::default(),
    }
}

/// Every directory containing a matching file must find the instruction on
/// its inheritance chain.
fn assert_coverage(
    optimizer: &ContextOptimizer,
    placement: &apm_core::PlacementMap<'_>,
    root: &Path,
    instruction_name: &str,
    pattern: &str,
) {
    let pattern = PatternSet::new(pattern).unwrap();
    let mut matching_dirs = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().flatten() {
        if entry.file_type().is_file() {
            let relative = entry.path().strip_prefix(root).unwrap();
            if pattern.matches_path(relative) {
                matching_dirs.push(entry.path().parent().unwrap().to_path_buf());
            }
        }
    }
    assert!(!matching_dirs.is_empty(), "test needs matching files");

    for dir in matching_dirs {
        let covered = optimizer.inheritance_chain(&dir).iter().any(|link| {
            placement
                .get(link)
                .is_some_and(|placed| placed.iter().any(|i| i.name == instruction_name))
        });
        assert!(
            covered,
            "coverage gap: {} cannot inherit '{}'",
            dir.display(),
            instruction_name
        );
    }
}

#[test]
fn scenario_low_distribution_places_once_in_scripts() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "scripts/deploy.sh");
    touch(tmp.path(), "scripts/build.sh");
    for i in 0..8 {
        touch(tmp.path(), &format!("src/module{i}.rs"));
    }

    let shell = instruction("shell-standards", "**/*.sh");
    let mut optimizer = ContextOptimizer::new(tmp.path());
    let placement = optimizer.optimize_instruction_placement(std::slice::from_ref(&shell));

    assert_eq!(placement.len(), 1);
    let (directory, _) = placement.iter().next().unwrap();
    assert!(directory.ends_with("scripts"));
    assert_coverage(&optimizer, &placement, optimizer.base_dir(), "shell-standards", "**/*.sh");
}

#[test]
fn scenario_sibling_directories_share_an_ancestor_placement() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "frontend/components/Header.tsx");
    touch(tmp.path(), "src/components/ContactForm.tsx");

    let react = instruction("react-standards", "**/*.{tsx,jsx}");
    let mut optimizer = ContextOptimizer::new(tmp.path());
    let placement = optimizer.optimize_instruction_placement(std::slice::from_ref(&react));

    // Naive placement in only frontend/components/ would strand the sibling.
    assert_coverage(
        &optimizer,
        &placement,
        optimizer.base_dir(),
        "react-standards",
        "**/*.{tsx,jsx}",
    );
}

#[test]
fn every_instruction_is_placed_even_under_hostile_patterns() {
    let tmp = TempDir::new().unwrap();
    touch(tmp.path(), "a/one.py");
    touch(tmp.path(), "b/two.py");
    touch(tmp.path(), "c/three.css");

    let instructions = vec![
        instruction("python", "**/*.py"),
        instruction("css", "**/*.css"),
        instruction("unmatched", "**/*.zig"),
        instruction("global", ""),
        instruction("broken-glob", "**/*.[py"),
    ];

    let mut optimizer = ContextOptimizer::new(tmp.path());
    let placement = optimizer.optimize_instruction_placement(&instructions);

    let placed: usize = placement.values().map(Vec::len).sum();
    assert_eq!(placed, instructions.len());
}

#[test]
fn identical_projects_produce_identical_placements() {
    let build = || {
        let tmp = TempDir::new().unwrap();
        touch(tmp.path(), "server/api.py");
        touch(tmp.path(), "server/models.py");
        touch(tmp.path(), "tests/test_api.py");
        touch(tmp.path(), "styles/main.css");
        tmp
    };

    let shape = |tmp: &TempDir| {
        let instructions = vec![
            instruction("python", "**/*.py"),
            instruction("css", "**/*.css"),
        ];
        let mut optimizer = ContextOptimizer::new(tmp.path());
        let placement = optimizer.optimize_instruction_placement(&instructions);
        placement
            .iter()
            .map(|(directory, placed)| {
                (
                    directory
                        .strip_prefix(optimizer.base_dir())
                        .unwrap_or(directory)
                        .to_path_buf(),
                    placed.iter().map(|i| i.name.clone()).collect::<Vec<_>>(),
                )
            })
            .collect::<Vec<_>>()
    };

    let first = build();
    let second = build();
    assert_eq!(shape(&first), shape(&second));
}

#[test]
fn empty_project_places_instructions_at_root() {
    let tmp = TempDir::new().unwrap();
    let global = instruction("global", "**/*.py");
    let mut optimizer = ContextOptimizer::new(tmp.path());
    let placement = optimizer.optimize_instruction_placement(std::slice::from_ref(&global));

    assert_eq!(placement.len(), 1);
    assert!(placement.contains_key(&optimizer.base_dir().to_path_buf()));
}
