use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::ReshakeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FileRole {
    Spectrum,
    Metadata,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::Spectrum => write!(f, "spectrum"),
            FileRole::Metadata => write!(f, "metadata"),
        }
    }
}

/// A file selected by the caller for one batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub url: String,
    pub declared_size: Option<u64>,
    pub role: FileRole,
    pub logical_name: String,
}

impl RemoteFile {
    pub fn new(url: &str, role: FileRole) -> Result<Self, ReshakeError> {
        let url = url.trim();
        let logical_name = file_name_from_url(url)
            .ok_or_else(|| ReshakeError::InvalidRemoteFile(url.to_string()))?;
        Ok(Self {
            url: url.to_string(),
            declared_size: None,
            role,
            logical_name,
        })
    }

    pub fn with_declared_size(mut self, size: Option<u64>) -> Self {
        self.declared_size = size;
        self
    }

    pub fn with_logical_name(mut self, name: &str) -> Self {
        self.logical_name = name.to_string();
        self
    }
}

impl FromStr for RemoteFile {
    type Err = ReshakeError;

    /// Shorthand form: a bare URL, role inferred from the file extension.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let name = file_name_from_url(value.trim())
            .ok_or_else(|| ReshakeError::InvalidRemoteFile(value.to_string()))?;
        let role = match FileFormat::from_name(&name) {
            FileFormat::MzIdentMl => FileRole::Metadata,
            _ => FileRole::Spectrum,
        };
        RemoteFile::new(value, role)
    }
}

/// Last non-empty path segment of a URL, without query or fragment.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let (scheme_less, has_scheme) = match without_query.split_once("://") {
        Some((_, rest)) => (rest, true),
        None => (without_query, false),
    };
    let path = if has_scheme {
        scheme_less.split_once('/').map(|(_, path)| path)?
    } else {
        scheme_less
    };
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Zip,
}

impl Compression {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        if lower.ends_with(".gz") {
            Compression::Gzip
        } else if lower.ends_with(".zip") {
            Compression::Zip
        } else {
            Compression::None
        }
    }

    pub fn suffix(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some(".gz"),
            Compression::Zip => Some(".zip"),
        }
    }

    /// Name of the expanded file, `foo.xml.gz` -> `foo.xml`.
    pub fn strip_suffix(name: &str) -> &str {
        match Self::from_name(name).suffix() {
            Some(suffix) => &name[..name.len() - suffix.len()],
            None => name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    PrideXml,
    Mgf,
    Raw,
    MzIdentMl,
    Unknown,
}

impl FileFormat {
    /// Classify by extension after removing any compression suffix.
    pub fn from_name(name: &str) -> Self {
        let lower = Compression::strip_suffix(name).to_ascii_lowercase();
        let ext = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
        match ext {
            "xml" => FileFormat::PrideXml,
            "mgf" => FileFormat::Mgf,
            "raw" => FileFormat::Raw,
            "mzid" | "mzidentml" => FileFormat::MzIdentMl,
            _ => FileFormat::Unknown,
        }
    }
}

/// Per-file pipeline state, discarded when the batch completes.
#[derive(Debug, Clone)]
pub struct DownloadTask {
    pub remote: RemoteFile,
    pub effective_url: Option<String>,
    pub local_path: PathBuf,
    pub compression: Compression,
    pub unzipped_path: Option<PathBuf>,
}

impl DownloadTask {
    pub fn new(remote: RemoteFile, local_path: PathBuf) -> Self {
        let compression = Compression::from_name(&remote.logical_name);
        Self {
            remote,
            effective_url: None,
            local_path,
            compression,
            unzipped_path: None,
        }
    }

    /// The file the later stages read: expanded if expansion happened.
    pub fn working_path(&self) -> &PathBuf {
        self.unzipped_path.as_ref().unwrap_or(&self.local_path)
    }
}

/// Result of a cancellable step. Cancellation is not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Done(T),
    Canceled,
}

impl<T> Outcome<T> {
    pub fn is_canceled(&self) -> bool {
        matches!(self, Outcome::Canceled)
    }
}

/// Observed precursor charges across every spectrum of a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeRange {
    min: Option<i32>,
    max: Option<i32>,
}

impl ChargeRange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, charge: i32) {
        self.min = Some(self.min.map_or(charge, |min| min.min(charge)));
        self.max = Some(self.max.map_or(charge, |max| max.max(charge)));
    }

    pub fn merge(&mut self, other: &ChargeRange) {
        for charge in [other.min, other.max].into_iter().flatten() {
            self.observe(charge);
        }
    }

    pub fn min(&self) -> Option<i32> {
        self.min
    }

    pub fn max(&self) -> Option<i32> {
        self.max
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none()
    }
}

/// Cooperative cancellation flag shared with whoever may stop the batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_canceled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn file_name_strips_query() {
        assert_eq!(
            file_name_from_url("https://ftp.pride.ebi.ac.uk/pride/data/a/b.xml.gz?x=1").as_deref(),
            Some("b.xml.gz")
        );
        assert_eq!(file_name_from_url("https://example.org/"), None);
    }

    #[test]
    fn shorthand_infers_role() {
        let mzid: RemoteFile = "https://example.org/search.mzid.gz".parse().unwrap();
        assert_eq!(mzid.role, FileRole::Metadata);
        let xml: RemoteFile = "https://example.org/PRIDE_Exp_1.xml".parse().unwrap();
        assert_eq!(xml.role, FileRole::Spectrum);
        assert_eq!(xml.logical_name, "PRIDE_Exp_1.xml");
    }

    #[test]
    fn shorthand_rejects_bare_host() {
        let err = "https://example.org".parse::<RemoteFile>().unwrap_err();
        assert_matches!(err, ReshakeError::InvalidRemoteFile(_));
    }

    #[test]
    fn compression_suffixes() {
        assert_eq!(Compression::from_name("a.XML.GZ"), Compression::Gzip);
        assert_eq!(Compression::strip_suffix("a.xml.gz"), "a.xml");
        assert_eq!(Compression::strip_suffix("a.zip"), "a");
        assert_eq!(Compression::strip_suffix("a.mgf"), "a.mgf");
    }

    #[test]
    fn charge_range_folds() {
        let mut range = ChargeRange::new();
        assert!(range.is_empty());
        for charge in [3, 2, 4, 2] {
            range.observe(charge);
        }
        assert_eq!(range.min(), Some(2));
        assert_eq!(range.max(), Some(4));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let creds = Credentials {
            username: "reviewer".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{creds:?}").contains("secret"));
    }
}
