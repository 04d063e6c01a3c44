use std::fmt;
use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::archive::{self, find_files};
use crate::catalog::EnzymeRef;
use crate::convert::{self, ConversionSummary};
use crate::domain::{
    ChargeRange, Compression, Credentials, DownloadTask, FileFormat, FileRole, Outcome,
    RemoteFile, file_name_from_url,
};
use crate::download::download;
use crate::error::ReshakeError;
use crate::inference::{InferenceEngine, InferenceInput, ParameterDefaults, SearchParameterSet};
use crate::metadata::{self, MetadataSummary};
use crate::raw::RawConverter;
use crate::remote::{RemoteClient, resolve};
use crate::store::Store;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Resolving,
    Downloading,
    Expanding,
    Converting,
    Extracting,
    Inferring,
    Done,
    Canceled,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Resolving => "Resolve",
            Phase::Downloading => "Download",
            Phase::Expanding => "Expand",
            Phase::Converting => "Convert",
            Phase::Extracting => "Extract",
            Phase::Inferring => "Infer",
            Phase::Done => "Done",
            Phase::Canceled => "Canceled",
            Phase::Failed => "Failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub phase: Phase,
    pub file_index: Option<usize>,
    pub message: String,
}

/// Where progress goes, and where cancellation comes from.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);

    /// Units done so far; `total` is `None` when indeterminate.
    fn progress(&self, _done: u64, _total: Option<u64>) {}

    fn is_canceled(&self) -> bool {
        false
    }
}

/// Questions the inference step cannot answer on its own.
pub trait Prompter {
    /// `None` declines; the enzyme is then recorded as unknown.
    fn ask_enzyme(&self, candidate: &str) -> Option<EnzymeRef>;
    fn ask_unknown_modification(&self, name: &str);
}

#[derive(Debug, Clone, Default)]
pub struct BatchOptions {
    pub force: bool,
    pub no_cache: bool,
}

#[derive(Debug, Clone, Default)]
pub struct BatchRequest {
    pub files: Vec<RemoteFile>,
    pub credentials: Option<Credentials>,
    pub fasta: Option<String>,
    pub species: Option<String>,
    pub project_ptms: Option<String>,
    /// Index into `files`. When unset the first metadata file is used,
    /// else the first PRIDE XML spectrum file.
    pub metadata_source: Option<usize>,
    pub known_modifications: Vec<String>,
    pub defaults: ParameterDefaults,
}

impl BatchRequest {
    pub fn metadata_index(&self) -> Option<usize> {
        self.metadata_source
            .filter(|index| *index < self.files.len())
            .or_else(|| {
                self.files
                    .iter()
                    .position(|file| file.role == FileRole::Metadata)
            })
            .or_else(|| {
                self.files.iter().position(|file| {
                    FileFormat::from_name(&file.logical_name) == FileFormat::PrideXml
                })
            })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub index: usize,
    pub name: String,
    pub role: FileRole,
    /// `cache` or `download`.
    pub action: String,
    pub local_path: String,
    pub mgf_path: Option<String>,
    pub spectra: Option<ConversionSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExcludedFile {
    pub index: usize,
    pub name: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Success {
        parameters_path: Utf8PathBuf,
        report_path: Utf8PathBuf,
        report: String,
        files: Vec<FileResult>,
    },
    PartialSuccess {
        parameters_path: Utf8PathBuf,
        report_path: Utf8PathBuf,
        report: String,
        files: Vec<FileResult>,
        excluded: Vec<ExcludedFile>,
    },
    Canceled,
    Failed {
        file_index: Option<usize>,
        reason: String,
        #[serde(skip)]
        error: ReshakeError,
    },
}

/// The persisted parameter file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterFile {
    pub tool: String,
    pub generated_at: String,
    pub parameters: SearchParameterSet,
}

#[derive(Default)]
struct BatchState {
    files: Vec<FileResult>,
    excluded: Vec<ExcludedFile>,
    first_failure: Option<(usize, ReshakeError)>,
    converted: usize,
    consumed: Vec<String>,
    metadata: Option<MetadataSummary>,
    notes: Vec<String>,
}

enum Step {
    Processed,
    Canceled,
}

pub struct Reshaker<C: RemoteClient, X: RawConverter> {
    store: Store,
    client: C,
    raw: X,
}

impl<C: RemoteClient, X: RawConverter> Reshaker<C, X> {
    pub fn new(store: Store, client: C, raw: X) -> Self {
        Self { store, client, raw }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Process every file in order, then infer and persist the search parameters.
    ///
    /// Per-file failures exclude the file; failures of the work directory are
    /// returned as `Err`.
    pub fn run(
        &self,
        request: &BatchRequest,
        options: &BatchOptions,
        sink: &dyn ProgressSink,
        prompter: &dyn Prompter,
    ) -> Result<BatchOutcome, ReshakeError> {
        self.store.ensure_work_root()?;
        let metadata_index = request.metadata_index();
        let mut charges = ChargeRange::new();
        let mut state = BatchState::default();

        for (index, remote) in request.files.iter().enumerate() {
            if sink.is_canceled() {
                return Ok(canceled(sink, Some(index)));
            }
            let is_metadata_source = metadata_index == Some(index);
            let step = self.process_file(
                index,
                remote,
                request,
                options,
                is_metadata_source,
                &mut charges,
                &mut state,
                sink,
            );
            match step {
                Ok(Step::Processed) => {}
                Ok(Step::Canceled) => return Ok(canceled(sink, Some(index))),
                Err(err) if err.is_file_scoped() => {
                    warn!(file = %remote.logical_name, error = %err, "file excluded from batch");
                    sink.event(ProgressEvent {
                        phase: Phase::Failed,
                        file_index: Some(index),
                        message: format!("phase=Failed; {}: {err}", remote.logical_name),
                    });
                    if is_metadata_source {
                        state.notes.push(format!(
                            "metadata source {} unavailable ({err}); defaults used",
                            remote.logical_name
                        ));
                    }
                    state.excluded.push(ExcludedFile {
                        index,
                        name: remote.logical_name.clone(),
                        reason: err.to_string(),
                    });
                    if state.first_failure.is_none() {
                        state.first_failure = Some((index, err));
                    }
                }
                Err(err) => return Err(err),
            }
        }

        if state.converted == 0 {
            let (file_index, error) = match state.first_failure.take() {
                Some((index, error)) => (Some(index), error),
                None => (
                    None,
                    ReshakeError::NoUsableSpectra("no spectrum file in batch".to_string()),
                ),
            };
            sink.event(ProgressEvent {
                phase: Phase::Failed,
                file_index,
                message: format!("phase=Failed; {error}"),
            });
            return Ok(BatchOutcome::Failed {
                file_index,
                reason: error.to_string(),
                error,
            });
        }

        sink.event(ProgressEvent {
            phase: Phase::Inferring,
            file_index: None,
            message: "phase=Infer; inferring search parameters".to_string(),
        });
        if metadata_index.is_none() {
            state
                .notes
                .push("no metadata source designated; defaults used".to_string());
        }
        let engine = InferenceEngine::new(&request.known_modifications);
        let input = InferenceInput {
            metadata: state.metadata.as_ref(),
            project_ptms: request.project_ptms.as_deref(),
            species: request.species.as_deref(),
            fasta: request.fasta.as_deref(),
            defaults: request.defaults.clone(),
            notes: state.notes.clone(),
            files: state.consumed.clone(),
        };
        let inference = engine.infer(&input, &charges, prompter);

        let parameters_path = self.store.parameters_path();
        let report_path = self.store.report_path();
        let report = inference.report.render();
        Store::write_json(
            &parameters_path,
            &ParameterFile {
                tool: format!("reshake/{}", env!("CARGO_PKG_VERSION")),
                generated_at: iso_timestamp(),
                parameters: inference.parameters,
            },
        )?;
        Store::write_bytes_atomic(&report_path, report.as_bytes())?;

        sink.event(ProgressEvent {
            phase: Phase::Done,
            file_index: None,
            message: format!("phase=Done; parameters written to {parameters_path}"),
        });
        info!(
            converted = state.converted,
            excluded = state.excluded.len(),
            "batch complete"
        );

        if state.excluded.is_empty() {
            Ok(BatchOutcome::Success {
                parameters_path,
                report_path,
                report,
                files: state.files,
            })
        } else {
            Ok(BatchOutcome::PartialSuccess {
                parameters_path,
                report_path,
                report,
                files: state.files,
                excluded: state.excluded,
            })
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn process_file(
        &self,
        index: usize,
        remote: &RemoteFile,
        request: &BatchRequest,
        options: &BatchOptions,
        is_metadata_source: bool,
        charges: &mut ChargeRange,
        state: &mut BatchState,
        sink: &dyn ProgressSink,
    ) -> Result<Step, ReshakeError> {
        let name = remote.logical_name.as_str();
        let announce = |phase: Phase, message: String| {
            sink.event(ProgressEvent {
                phase,
                file_index: Some(index),
                message: format!("phase={phase}; {message}"),
            });
        };

        announce(Phase::Resolving, name.to_string());
        // cache entries are stored under the served file name, not the display name
        let cache_name = file_name_from_url(&remote.url).unwrap_or_else(|| name.to_string());
        let cached = if options.force {
            None
        } else {
            self.store.cached_copy(&cache_name)
        };

        let (mut task, action) = match cached {
            Some(cached) => {
                announce(Phase::Resolving, format!("using cached {cached}"));
                let file_name = cached.file_name().unwrap_or(&cache_name);
                let local = self.store.download_path(file_name);
                Store::copy_file_atomic(&cached, &local)?;
                let mut task = DownloadTask::new(remote.clone(), local.into_std_path_buf());
                task.compression = Compression::from_name(file_name);
                (task, "cache")
            }
            None => {
                let resolution = resolve(&self.client, &remote.url, request.credentials.as_ref());
                if !resolution.reachable {
                    return Err(ReshakeError::Unreachable {
                        url: resolution.effective_url,
                    });
                }
                let file_name = file_name_from_url(&resolution.effective_url)
                    .unwrap_or_else(|| name.to_string());
                let local = self.store.download_path(&file_name);
                let mut task = DownloadTask::new(remote.clone(), local.clone().into_std_path_buf());
                task.compression = Compression::from_name(&file_name);
                task.effective_url = Some(resolution.effective_url.clone());

                announce(Phase::Downloading, resolution.effective_url.clone());
                let outcome = download(
                    &self.client,
                    &resolution.effective_url,
                    local.as_std_path(),
                    remote.declared_size,
                    request.credentials.as_ref(),
                    sink,
                )?;
                if outcome.is_canceled() {
                    return Ok(Step::Canceled);
                }
                if !options.no_cache {
                    self.store.ensure_cache_root()?;
                    Store::copy_file_atomic(&local, &self.store.cache_path(&file_name))?;
                }
                (task, "download")
            }
        };

        if let Step::Canceled = self.expand(&mut task, &announce, &mut state.notes, sink)? {
            return Ok(Step::Canceled);
        }

        let working = task.working_path().clone();
        let working_name = working
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or(name)
            .to_string();
        let mut result = FileResult {
            index,
            name: name.to_string(),
            role: remote.role,
            action: action.to_string(),
            local_path: working.display().to_string(),
            mgf_path: None,
            spectra: None,
        };

        if remote.role == FileRole::Metadata && !accepts(FileRole::Metadata, &working_name) {
            return Err(ReshakeError::UnsupportedFormat(format!(
                "{working_name} is not a PRIDE XML or mzIdentML file"
            )));
        }

        if remote.role == FileRole::Spectrum {
            announce(Phase::Converting, working_name.clone());
            let mgf = self.store.mgf_path(&working_name);
            let outcome = self.convert_spectra(&working, &working_name, &mgf, charges, sink)?;
            let summary = match outcome {
                Outcome::Done(summary) => summary,
                Outcome::Canceled => return Ok(Step::Canceled),
            };
            state.converted += 1;
            result.mgf_path = Some(mgf.to_string());
            result.spectra = Some(summary);
        }

        if is_metadata_source {
            announce(Phase::Extracting, working_name.clone());
            match metadata::extract(&working) {
                Ok(summary) => state.metadata = Some(summary),
                Err(err) => {
                    warn!(file = %working_name, error = %err, "metadata extraction failed");
                    state.notes.push(format!(
                        "metadata source {working_name} unreadable ({err}); defaults used"
                    ));
                }
            }
        }

        state.consumed.push(working_name);
        state.files.push(result);
        Ok(Step::Processed)
    }

    fn expand(
        &self,
        task: &mut DownloadTask,
        announce: &dyn Fn(Phase, String),
        notes: &mut Vec<String>,
        sink: &dyn ProgressSink,
    ) -> Result<Step, ReshakeError> {
        let local = task.local_path.clone();
        let local_name = local
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default()
            .to_string();
        match task.compression {
            Compression::None => {}
            Compression::Gzip => {
                let destination = local.with_file_name(Compression::strip_suffix(&local_name));
                announce(Phase::Expanding, local_name.clone());
                match archive::expand_gzip(&local, &destination, sink)? {
                    Outcome::Done(path) => task.unzipped_path = Some(path),
                    Outcome::Canceled => return Ok(Step::Canceled),
                }
            }
            Compression::Zip => {
                let directory =
                    local.with_file_name(format!("{}_extracted", Compression::strip_suffix(&local_name)));
                announce(Phase::Expanding, local_name.clone());
                if directory.exists() {
                    fs::remove_dir_all(&directory)
                        .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
                }
                fs::create_dir_all(&directory)
                    .map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
                let entries = archive::validate_zip(&local)?;
                announce(Phase::Expanding, format!("{local_name}: {entries} entries"));
                archive::extract_zip(&local, &directory)?;
                let role = task.remote.role;
                let mut usable = find_files(&directory, |name| accepts(role, name)).into_iter();
                let entry = usable.next().ok_or_else(|| {
                    ReshakeError::UnsupportedFormat(format!(
                        "{local_name} holds no usable {role} file"
                    ))
                })?;
                for skipped in usable {
                    warn!(
                        archive = %local_name,
                        used = %entry.display(),
                        skipped = %skipped.display(),
                        "extra archive entry ignored"
                    );
                    notes.push(format!(
                        "{local_name}: used {}, skipped {}",
                        display_entry(&directory, &entry),
                        display_entry(&directory, &skipped)
                    ));
                }
                task.unzipped_path = Some(entry);
            }
        }
        Ok(Step::Processed)
    }

    fn convert_spectra(
        &self,
        source: &Path,
        source_name: &str,
        mgf: &Utf8Path,
        charges: &mut ChargeRange,
        sink: &dyn ProgressSink,
    ) -> Result<Outcome<ConversionSummary>, ReshakeError> {
        match FileFormat::from_name(source_name) {
            FileFormat::PrideXml => convert::convert(source, mgf.as_std_path(), charges, sink),
            FileFormat::Mgf => convert::passthrough_mgf(source, mgf.as_std_path(), charges, sink),
            FileFormat::Raw => {
                let output_dir = self.store.raw_output_dir(source_name);
                let produced = self.raw.convert_raw(source, output_dir.as_std_path())?;
                convert::passthrough_mgf(&produced, mgf.as_std_path(), charges, sink)
            }
            FileFormat::MzIdentMl | FileFormat::Unknown => Err(ReshakeError::UnsupportedFormat(
                format!("{source_name} is not a spectrum file"),
            )),
        }
    }
}

fn accepts(role: FileRole, name: &str) -> bool {
    match (role, FileFormat::from_name(name)) {
        (FileRole::Spectrum, FileFormat::PrideXml | FileFormat::Mgf | FileFormat::Raw) => true,
        (FileRole::Metadata, FileFormat::PrideXml | FileFormat::MzIdentMl) => true,
        _ => false,
    }
}

fn display_entry(directory: &Path, entry: &Path) -> String {
    entry
        .strip_prefix(directory)
        .unwrap_or(entry)
        .display()
        .to_string()
}

fn canceled(sink: &dyn ProgressSink, file_index: Option<usize>) -> BatchOutcome {
    info!("batch canceled");
    sink.event(ProgressEvent {
        phase: Phase::Canceled,
        file_index,
        message: "phase=Canceled; stopped by user".to_string(),
    });
    BatchOutcome::Canceled
}

fn iso_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}
