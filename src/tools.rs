use anyhow::Result;
use log::debug;
use std::{path::PathBuf, process::Command};
use which::which;

use crate::error::HmasError;

/// Finds an external tool on PATH
pub fn find_executable(tool: &str) -> Result<PathBuf, HmasError> {
    which(tool).map_err(|_| HmasError::ToolNotFound {
        tool: tool.to_string(),
    })
}

/// Runs a prepared command to completion.  A non-zero exit becomes a tool execution error carrying
/// everything the tool wrote, and the output is returned otherwise
pub fn run_tool(command: &mut Command, tool: &str) -> Result<String> {
    debug!("Running {:?}", command);
    let output = command.output().map_err(|err| HmasError::ToolExecution {
        tool: tool.to_string(),
        status: "failed to start".to_string(),
        output: err.to_string(),
    })?;
    let mut captured = String::from_utf8_lossy(&output.stdout).to_string();
    captured.push_str(&String::from_utf8_lossy(&output.stderr));
    if !output.status.success() {
        return Err(HmasError::ToolExecution {
            tool: tool.to_string(),
            status: output.status.to_string(),
            output: captured,
        }
        .into());
    }
    Ok(captured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_tool_test() {
        let err = find_executable("surely-not-an-installed-aligner").unwrap_err();
        assert!(matches!(err, HmasError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn finds_shell_test() {
        let shell = find_executable("sh").unwrap();
        assert!(shell.is_absolute());
        assert!(shell.ends_with("sh"));
    }

    #[cfg(unix)]
    #[test]
    fn run_tool_status_test() {
        let output = run_tool(Command::new("sh").args(&["-c", "echo ran"]), "sh").unwrap();
        assert_eq!(output.trim(), "ran");
        let err = run_tool(
            Command::new("sh").args(&["-c", "echo broken >&2; exit 3"]),
            "sh",
        )
        .unwrap_err();
        match err.downcast_ref::<HmasError>() {
            Some(HmasError::ToolExecution { output, .. }) => assert!(output.contains("broken")),
            other => panic!("Expected a tool execution error, found {:?}", other),
        }
    }
}
