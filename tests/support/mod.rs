#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::prelude::*;
use flate2::Compression;
use flate2::write::GzEncoder;

use reshake::app::{ProgressEvent, ProgressSink, Prompter};
use reshake::catalog::EnzymeRef;
use reshake::domain::Credentials;
use reshake::error::ReshakeError;
use reshake::raw::{RawConverter, ToolInfo};
use reshake::remote::{RemoteBody, RemoteClient};

pub struct TestSpectrum {
    pub id: String,
    pub ms_level: u8,
    pub precursor_mz: Option<f64>,
    pub charge: Option<i32>,
    pub peaks: Vec<(f64, f64)>,
}

impl TestSpectrum {
    pub fn ms2(id: usize, precursor_mz: f64, charge: Option<i32>) -> Self {
        Self {
            id: id.to_string(),
            ms_level: 2,
            precursor_mz: Some(precursor_mz),
            charge,
            peaks: vec![(110.07, 20.0), (175.12, 55.5), (262.15, 12.25)],
        }
    }

    pub fn ms1(id: usize) -> Self {
        Self {
            id: id.to_string(),
            ms_level: 1,
            precursor_mz: None,
            charge: None,
            peaks: vec![(400.0, 1000.0)],
        }
    }
}

fn encode(values: impl Iterator<Item = f64>) -> String {
    let bytes: Vec<u8> = values.flat_map(|value| value.to_le_bytes()).collect();
    BASE64_STANDARD.encode(bytes)
}

/// A PRIDE XML document with the given spectra and optional processing section.
pub fn pride_xml(spectra: &[TestSpectrum], processing: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<ExperimentCollection version=\"2.1\"><Experiment>\n");
    out.push_str("<mzData version=\"1.05\" accessionNumber=\"1\"><description>\n");
    out.push_str(&format!(
        "<dataProcessing><processingMethod>{processing}</processingMethod></dataProcessing>\n"
    ));
    out.push_str("</description>\n");
    out.push_str(&format!("<spectrumList count=\"{}\">\n", spectra.len()));
    for spectrum in spectra {
        out.push_str(&format!(
            "<spectrum id=\"{}\"><spectrumDesc><spectrumSettings><spectrumInstrument msLevel=\"{}\"/></spectrumSettings>",
            spectrum.id, spectrum.ms_level
        ));
        if let Some(mz) = spectrum.precursor_mz {
            out.push_str("<precursorList count=\"1\"><precursor msLevel=\"1\"><ionSelection>");
            out.push_str(&format!(
                "<cvParam cvLabel=\"PSI\" accession=\"PSI:1000040\" name=\"MassToChargeRatio\" value=\"{mz}\"/>"
            ));
            if let Some(charge) = spectrum.charge {
                out.push_str(&format!(
                    "<cvParam cvLabel=\"PSI\" accession=\"PSI:1000041\" name=\"ChargeState\" value=\"{charge}\"/>"
                ));
            }
            out.push_str("</ionSelection></precursor></precursorList>");
        }
        out.push_str("</spectrumDesc>");
        out.push_str(&format!(
            "<mzArrayBinary><data precision=\"64\" endian=\"little\" length=\"{}\">{}</data></mzArrayBinary>",
            spectrum.peaks.len(),
            encode(spectrum.peaks.iter().map(|(mz, _)| *mz))
        ));
        out.push_str(&format!(
            "<intenArrayBinary><data precision=\"64\" endian=\"little\" length=\"{}\">{}</data></intenArrayBinary>",
            spectrum.peaks.len(),
            encode(spectrum.peaks.iter().map(|(_, intensity)| *intensity))
        ));
        out.push_str("</spectrum>\n");
    }
    out.push_str("</spectrumList></mzData>\n</Experiment></ExperimentCollection>\n");
    out
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

/// Serves fixed bodies by URL and counts every call.
#[derive(Default)]
pub struct MockClient {
    bodies: HashMap<String, Vec<u8>>,
    pub probes: Mutex<Vec<String>>,
    pub opens: Mutex<Vec<String>>,
    pub credentials_seen: Mutex<Vec<Option<Credentials>>>,
    pub report_length: bool,
}

impl MockClient {
    pub fn new() -> Self {
        Self {
            report_length: true,
            ..Self::default()
        }
    }

    pub fn serve(mut self, url: &str, body: Vec<u8>) -> Self {
        self.bodies.insert(url.to_string(), body);
        self
    }

    pub fn calls(&self) -> usize {
        self.probes.lock().unwrap().len() + self.opens.lock().unwrap().len()
    }
}

impl RemoteClient for MockClient {
    fn probe(&self, url: &str, credentials: Option<&Credentials>) -> bool {
        self.probes.lock().unwrap().push(url.to_string());
        self.credentials_seen
            .lock()
            .unwrap()
            .push(credentials.cloned());
        self.bodies.contains_key(url)
    }

    fn open(
        &self,
        url: &str,
        _credentials: Option<&Credentials>,
    ) -> Result<RemoteBody, ReshakeError> {
        self.opens.lock().unwrap().push(url.to_string());
        let body = self
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| ReshakeError::HttpStatus {
                status: 404,
                url: url.to_string(),
            })?;
        let content_length = self.report_length.then_some(body.len() as u64);
        Ok(RemoteBody {
            reader: Box::new(Cursor::new(body)),
            content_length,
        })
    }
}

/// Records events and progress; cancels once `is_canceled` has been polled
/// `cancel_after` times.
#[derive(Default)]
pub struct RecordingSink {
    pub events: Mutex<Vec<ProgressEvent>>,
    pub progress: Mutex<Vec<(u64, Option<u64>)>>,
    polls: AtomicUsize,
    cancel_after: Option<usize>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn canceling_after(polls: usize) -> Self {
        Self {
            cancel_after: Some(polls),
            ..Self::default()
        }
    }

    pub fn messages(&self) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|event| event.message.clone())
            .collect()
    }
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }

    fn progress(&self, done: u64, total: Option<u64>) {
        self.progress.lock().unwrap().push((done, total));
    }

    fn is_canceled(&self) -> bool {
        let polls = self.polls.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel_after.is_some_and(|limit| polls > limit)
    }
}

/// Answers enzyme questions from a script and records every question.
#[derive(Default)]
pub struct ScriptedPrompter {
    pub answer: Option<EnzymeRef>,
    pub enzyme_questions: Mutex<Vec<String>>,
    pub unknown_modifications: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn declining() -> Self {
        Self::default()
    }

    pub fn answering(answer: EnzymeRef) -> Self {
        Self {
            answer: Some(answer),
            ..Self::default()
        }
    }
}

impl Prompter for ScriptedPrompter {
    fn ask_enzyme(&self, candidate: &str) -> Option<EnzymeRef> {
        self.enzyme_questions
            .lock()
            .unwrap()
            .push(candidate.to_string());
        self.answer.clone()
    }

    fn ask_unknown_modification(&self, name: &str) {
        self.unknown_modifications
            .lock()
            .unwrap()
            .push(name.to_string());
    }
}

pub struct NoRawConverter;

impl RawConverter for NoRawConverter {
    fn convert_raw(&self, _input: &Path, _output_dir: &Path) -> Result<PathBuf, ReshakeError> {
        Err(ReshakeError::MissingTool("ThermoRawFileParser".to_string()))
    }

    fn tool_info(&self) -> ToolInfo {
        ToolInfo {
            raw_converter: None,
        }
    }
}
