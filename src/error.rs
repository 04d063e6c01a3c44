use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum ReshakeError {
    #[error("file not found: {url}")]
    Unreachable { url: String },

    #[error("remote request failed: {0}")]
    Http(String),

    #[error("remote returned status {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("no usable spectra in {0}")]
    NoUsableSpectra(String),

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("invalid remote file: {0}")]
    InvalidRemoteFile(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("archive error: {0}")]
    Archive(String),

    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("failed to decode binary array: {0}")]
    BinaryDecode(String),

    #[error("required tool not found: {0}")]
    MissingTool(String),

    #[error("raw file conversion failed: {0}")]
    RawConversion(String),

    #[error("missing config file reshake.json in current directory")]
    MissingConfig,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("prompt failed: {0}")]
    Prompt(String),
}

impl ReshakeError {
    /// Failures that exclude one file from a batch without stopping it.
    pub fn is_file_scoped(&self) -> bool {
        matches!(
            self,
            ReshakeError::Unreachable { .. }
                | ReshakeError::Http(_)
                | ReshakeError::HttpStatus { .. }
                | ReshakeError::NoUsableSpectra(_)
                | ReshakeError::UnsupportedFormat(_)
                | ReshakeError::Archive(_)
                | ReshakeError::Xml(_)
                | ReshakeError::BinaryDecode(_)
                | ReshakeError::MissingTool(_)
                | ReshakeError::RawConversion(_)
        )
    }
}
