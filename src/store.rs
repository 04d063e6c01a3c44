use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use directories::BaseDirs;
use serde::Serialize;

use crate::domain::Compression;
use crate::error::ReshakeError;

pub const PARAMETERS_FILE: &str = "search_parameters.json";
pub const REPORT_FILE: &str = "search_parameters.txt";

/// On-disk layout of one batch: a work directory for downloads and outputs,
/// and a shared cache directory consulted before downloading.
#[derive(Debug, Clone)]
pub struct Store {
    work_root: Utf8PathBuf,
    cache_root: Utf8PathBuf,
}

impl Store {
    pub fn new_with_paths(work_root: Utf8PathBuf, cache_root: Utf8PathBuf) -> Self {
        Self {
            work_root,
            cache_root,
        }
    }

    pub fn default_cache_root() -> Result<Utf8PathBuf, ReshakeError> {
        BaseDirs::new()
            .and_then(|dirs| {
                Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("reshake")).ok()
            })
            .ok_or_else(|| ReshakeError::Filesystem("unable to resolve cache directory".to_string()))
    }

    pub fn work_root(&self) -> &Utf8Path {
        &self.work_root
    }

    pub fn cache_root(&self) -> &Utf8Path {
        &self.cache_root
    }

    pub fn download_path(&self, file_name: &str) -> Utf8PathBuf {
        self.work_root.join("downloads").join(file_name)
    }

    pub fn cache_path(&self, file_name: &str) -> Utf8PathBuf {
        self.cache_root.join(file_name)
    }

    /// `<work>/mgf/<stem>.mgf`, the stem taken after dropping compression.
    pub fn mgf_path(&self, file_name: &str) -> Utf8PathBuf {
        let expanded = Compression::strip_suffix(file_name);
        let stem = Utf8Path::new(expanded).file_stem().unwrap_or(expanded);
        self.work_root.join("mgf").join(format!("{stem}.mgf"))
    }

    pub fn raw_output_dir(&self, file_name: &str) -> Utf8PathBuf {
        self.work_root.join("raw").join(file_name)
    }

    pub fn parameters_path(&self) -> Utf8PathBuf {
        self.work_root.join(PARAMETERS_FILE)
    }

    pub fn report_path(&self) -> Utf8PathBuf {
        self.work_root.join(REPORT_FILE)
    }

    /// A cached copy of `file_name`, compressed or already expanded.
    pub fn cached_copy(&self, file_name: &str) -> Option<Utf8PathBuf> {
        let exact = self.cache_path(file_name);
        if exact.as_std_path().is_file() {
            return Some(exact);
        }
        let expanded = Compression::strip_suffix(file_name);
        if expanded != file_name {
            let expanded = self.cache_path(expanded);
            if expanded.as_std_path().is_file() {
                return Some(expanded);
            }
        }
        None
    }

    pub fn ensure_work_root(&self) -> Result<(), ReshakeError> {
        fs::create_dir_all(self.work_root.as_std_path())
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))
    }

    pub fn ensure_cache_root(&self) -> Result<(), ReshakeError> {
        fs::create_dir_all(self.cache_root.as_std_path())
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))
    }

    pub fn write_json<T: Serialize>(path: &Utf8Path, value: &T) -> Result<(), ReshakeError> {
        let content = serde_json::to_vec_pretty(value)
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        Self::write_bytes_atomic(path, &content)
    }

    pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), ReshakeError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent.as_std_path())
                .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        }
        let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
        fs::write(tmp_path.as_std_path(), content)
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        fs::rename(tmp_path.as_std_path(), path.as_std_path())
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        Ok(())
    }

    pub fn copy_file_atomic(source: &Utf8Path, dest: &Utf8Path) -> Result<(), ReshakeError> {
        let parent = dest
            .parent()
            .ok_or_else(|| ReshakeError::Filesystem("invalid destination path".to_string()))?;
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        let temp = tempfile::Builder::new()
            .prefix("reshake-file")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        fs::copy(source.as_std_path(), temp.path())
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        if dest.as_std_path().exists() {
            fs::remove_file(dest.as_std_path())
                .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        }
        temp.persist(dest.as_std_path())
            .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
        Ok(())
    }
}
