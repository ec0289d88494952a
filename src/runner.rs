use anyhow::{Context, Result, bail};
use std::process::Command;

/// Build a command running `script` through the platform shell
fn shell(script: &str) -> Command {
    #[cfg(windows)]
    {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", script]);
        cmd
    }

    #[cfg(not(windows))]
    {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]);
        cmd
    }
}

/// Run a shell script with extra environment variables and capture stdout
///
/// A non-zero exit is an error carrying the script's stderr.
pub fn run_shell(script: &str, envs: &[(&str, &str)]) -> Result<String> {
    let output = shell(script)
        .envs(envs.iter().copied())
        .output()
        .with_context(|| format!("Failed to execute: {script}"))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "Command failed ({}): {}",
            output.status,
            stderr.trim()
        )
    }
}
