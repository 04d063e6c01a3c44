use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde::Serialize;
use tracing::{debug, info};

use crate::archive::find_files;
use crate::error::ReshakeError;

const TOOL_NAMES: &[&str] = &["ThermoRawFileParser", "ThermoRawFileParser.sh"];

#[derive(Debug, Clone, Serialize)]
pub struct ToolInfo {
    pub raw_converter: Option<String>,
}

/// Vendor raw files are turned into MGF by an external program.
pub trait RawConverter: Send + Sync {
    /// Convert `input` into `output_dir`, returning the produced MGF file.
    fn convert_raw(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ReshakeError>;
    fn tool_info(&self) -> ToolInfo;
}

#[derive(Clone)]
pub struct SystemRawConverter {
    program: Option<PathBuf>,
}

impl SystemRawConverter {
    pub fn new() -> Self {
        Self {
            program: TOOL_NAMES.iter().find_map(|name| find_in_path(name)),
        }
    }

    pub fn with_program(program: PathBuf) -> Self {
        Self {
            program: Some(program),
        }
    }

    fn run_cmd(&self, program: &Path, args: &[String]) -> Result<(), ReshakeError> {
        debug!(program = %program.display(), ?args, "running raw converter");
        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|err| ReshakeError::RawConversion(err.to_string()))?;
        if output.status.success() {
            return Ok(());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("command failed: {}", program.display())
        } else {
            stderr
        };
        Err(ReshakeError::RawConversion(message))
    }
}

impl Default for SystemRawConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl RawConverter for SystemRawConverter {
    fn convert_raw(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, ReshakeError> {
        let program = self
            .program
            .as_ref()
            .ok_or_else(|| ReshakeError::MissingTool(TOOL_NAMES[0].to_string()))?;
        fs::create_dir_all(output_dir).map_err(|err| ReshakeError::Filesystem(err.to_string()))?;

        let args = vec![
            format!("-i={}", input.display()),
            format!("-o={}", output_dir.display()),
            // format 0 is MGF
            "-f=0".to_string(),
        ];
        self.run_cmd(program, &args)?;

        let produced = find_files(output_dir, |name| {
            name.to_ascii_lowercase().ends_with(".mgf")
        });
        let mgf = produced.into_iter().next().ok_or_else(|| {
            ReshakeError::RawConversion(format!(
                "no MGF produced for {}",
                input.display()
            ))
        })?;
        info!(input = %input.display(), output = %mgf.display(), "raw file converted");
        Ok(mgf)
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            raw_converter: self
                .program
                .as_ref()
                .and_then(|path| tool_version(path, &["--version"])),
        }
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    for path in std::env::split_paths(&path_var) {
        let exe = path.join(format!("{name}.exe"));
        if exe.exists() {
            return Some(exe);
        }
        let plain = path.join(name);
        if plain.exists() {
            return Some(plain);
        }
    }
    None
}

fn tool_version(path: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(path).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if stdout.is_empty() { None } else { Some(stdout) }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn missing_tool_is_reported() {
        let converter = SystemRawConverter { program: None };
        let temp = tempfile::tempdir().unwrap();
        let err = converter
            .convert_raw(&temp.path().join("run.raw"), temp.path())
            .unwrap_err();
        assert_matches!(err, ReshakeError::MissingTool(_));
    }
}
