//! Init command implementation - scaffold a new APM project

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use console::style;

const SAMPLE_WORKFLOW: &str = "---\ndescription: Sample workflow that greets the project\n---\n\nGreet the user and summarize what this repository does.\n";

const SAMPLE_INSTRUCTION: &str = "---\ndescription: General coding guidance for every file\napplyTo: \"**\"\n---\n\n# General Standards\n\n- Prefer small, focused changes.\n- Keep documentation close to the code it describes.\n";

const SAMPLE_CHATMODE: &str = "---\ndescription: Default assistant persona for this project\n---\n\nYou are a careful engineer on this project. Favor clarity over cleverness.\n";

const SAMPLE_CONSTITUTION: &str = "# Project Constitution\n\n- Ship small, reviewed changes.\n- Tests accompany behavior changes.\n";

/// Handle the init command - write the project skeleton.
pub fn handle_init_command(base_dir: &Path, name: Option<String>, force: bool) -> Result<()> {
    let project_name = name.unwrap_or_else(|| {
        base_dir
            .file_name()
            .map(|segment| segment.to_string_lossy().to_string())
            .unwrap_or_else(|| "apm-project".to_string())
    });

    let manifest_path = base_dir.join("apm.yml");
    if manifest_path.exists() && !force {
        bail!(
            "apm.yml already exists at {} (use --force to overwrite)",
            manifest_path.display()
        );
    }

    let manifest = format!(
        "name: {project_name}\nversion: 0.1.0\ndescription: Agent-native project scaffolded by apm\n\nscripts:\n  start: \"codex hello-world.prompt.md\"\n\ndependencies:\n  apm: []\n",
    );

    let files: [(&Path, String); 5] = [
        (Path::new("apm.yml"), manifest),
        (Path::new("hello-world.prompt.md"), SAMPLE_WORKFLOW.to_string()),
        (
            Path::new(".apm/instructions/general.instructions.md"),
            SAMPLE_INSTRUCTION.to_string(),
        ),
        (
            Path::new(".apm/chatmodes/assistant.chatmode.md"),
            SAMPLE_CHATMODE.to_string(),
        ),
        (
            Path::new(".specify/memory/constitution.md"),
            SAMPLE_CONSTITUTION.to_string(),
        ),
    ];

    for (relative, content) in files {
        let path = base_dir.join(relative);
        if path.exists() && !force {
            println!(
                "{} {} exists, skipping",
                style("Note:").dim(),
                relative.display()
            );
            continue;
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to write {}", parent.display()))?;
        }
        fs::write(&path, content)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("{} {}", style("Created").green(), relative.display());
    }

    println!(
        "{}",
        style(format!(
            "Project '{project_name}' initialized. Try `apm compile`."
        ))
        .cyan()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn scaffolds_project_files() {
        let tmp = TempDir::new().unwrap();
        handle_init_command(tmp.path(), Some("demo".to_string()), false).unwrap();

        assert!(tmp.path().join("apm.yml").is_file());
        assert!(tmp.path().join("hello-world.prompt.md").is_file());
        assert!(
            tmp.path()
                .join(".apm/instructions/general.instructions.md")
                .is_file()
        );
        assert!(
            tmp.path()
                .join(".apm/chatmodes/assistant.chatmode.md")
                .is_file()
        );
        assert!(
            tmp.path()
                .join(".specify/memory/constitution.md")
                .is_file()
        );

        let manifest = std::fs::read_to_string(tmp.path().join("apm.yml")).unwrap();
        assert!(manifest.contains("name: demo"));
    }

    #[test]
    fn refuses_to_overwrite_without_force() {
        let tmp = TempDir::new().unwrap();
        handle_init_command(tmp.path(), None, false).unwrap();
        let err = handle_init_command(tmp.path(), None, false).unwrap_err();
        assert!(err.to_string().contains("--force"));
    }
}
