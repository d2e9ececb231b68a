//! Run command implementation - execute a manifest script

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};
use console::style;

use crate::manifest::APMPackage;
use crate::scripts::ScriptRunner;

/// Handle the run command - prepare the script and hand it to the OS.
pub fn handle_run_command(base_dir: &Path, name: &str, raw_params: &[String]) -> Result<()> {
    let package = APMPackage::from_apm_yml(&base_dir.join("apm.yml"))
        .context("an apm.yml manifest is required to run scripts")?;

    let params = parse_params(raw_params)?;
    let runner = ScriptRunner::new(base_dir, &package);
    let prepared = runner.prepare(name, &params)?;

    println!(
        "{} {} {}",
        style("Running").cyan(),
        prepared.invocation.program,
        prepared.invocation.args.join(" ")
    );

    let mut command = Command::new(&prepared.invocation.program);
    command
        .args(&prepared.invocation.args)
        .current_dir(base_dir);
    for (key, value) in &prepared.invocation.env {
        command.env(key, value);
    }

    let status = command.status().with_context(|| {
        format!(
            "failed to launch runtime '{}'",
            prepared.invocation.program
        )
    })?;

    if !status.success() {
        bail!(
            "script '{name}' exited with status {}",
            status.code().unwrap_or(-1)
        );
    }
    Ok(())
}

fn parse_params(raw: &[String]) -> Result<Vec<(String, String)>> {
    raw.iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                Ok((key.to_string(), value.to_string()))
            }
            _ => bail!("invalid --param '{pair}': expected key=value"),
        })
        .collect()
}
