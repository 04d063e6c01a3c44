use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

use crate::app::BatchRequest;
use crate::domain::{Credentials, FileRole, RemoteFile};
use crate::error::ReshakeError;
use crate::inference::ParameterDefaults;

pub const DEFAULT_CONFIG: &str = "reshake.json";
pub const DEFAULT_WORK_DIR: &str = "reshake-work";

#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub work_dir: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub files: Vec<FileEntry>,
    /// Logical name or URL of the file to read search settings from.
    #[serde(default)]
    pub metadata_source: Option<String>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
    #[serde(default)]
    pub fasta: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub ptms: Option<String>,
    #[serde(default)]
    pub known_modifications: Vec<String>,
    #[serde(default)]
    pub defaults: Option<ParameterDefaults>,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum FileEntry {
    Shorthand(String),
    Detailed(FileEntryObject),
}

#[derive(Debug, Deserialize, Serialize)]
pub struct FileEntryObject {
    pub url: String,
    #[serde(default)]
    pub role: Option<FileRole>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub work_dir: Utf8PathBuf,
    pub cache_dir: Option<Utf8PathBuf>,
    pub request: BatchRequest,
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&str>) -> Result<ResolvedConfig, ReshakeError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG),
        };

        if path.is_none() && !config_path.exists() {
            return Err(ReshakeError::MissingConfig);
        }

        let content = fs::read_to_string(&config_path)
            .map_err(|_| ReshakeError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| ReshakeError::ConfigParse(err.to_string()))?;

        let mut resolved = Self::resolve_config(config)?;
        if resolved.request.credentials.is_none() {
            resolved.request.credentials = credentials_from_env();
        }
        Ok(resolved)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, ReshakeError> {
        let schema_version = config.schema_version.unwrap_or(1);

        let files = config
            .files
            .into_iter()
            .map(|entry| match entry {
                FileEntry::Shorthand(value) => value.parse::<RemoteFile>(),
                FileEntry::Detailed(obj) => {
                    let shorthand: RemoteFile = obj.url.parse()?;
                    let role = obj.role.unwrap_or(shorthand.role);
                    let mut file = RemoteFile::new(&obj.url, role)?.with_declared_size(obj.size);
                    if let Some(name) = obj.name.as_deref() {
                        file = file.with_logical_name(name);
                    }
                    Ok(file)
                }
            })
            .collect::<Result<Vec<_>, ReshakeError>>()?;

        let metadata_source = match config.metadata_source.as_deref() {
            Some(wanted) => Some(
                files
                    .iter()
                    .position(|file| file.logical_name == wanted || file.url == wanted)
                    .ok_or_else(|| {
                        ReshakeError::ConfigParse(format!(
                            "metadata_source {wanted} is not one of the listed files"
                        ))
                    })?,
            ),
            None => None,
        };

        Ok(ResolvedConfig {
            schema_version,
            work_dir: Utf8PathBuf::from(config.work_dir.as_deref().unwrap_or(DEFAULT_WORK_DIR)),
            cache_dir: config.cache_dir.map(Utf8PathBuf::from),
            request: BatchRequest {
                files,
                credentials: config.credentials,
                fasta: config.fasta,
                species: config.species,
                project_ptms: config.ptms,
                metadata_source,
                known_modifications: config.known_modifications,
                defaults: config.defaults.unwrap_or_default(),
            },
        })
    }
}

/// `PRIDE_USERNAME` / `PRIDE_PASSWORD`, both required.
pub fn credentials_from_env() -> Option<Credentials> {
    let username = std::env::var("PRIDE_USERNAME").ok()?;
    let password = std::env::var("PRIDE_PASSWORD").ok()?;
    Some(Credentials { username, password })
}
