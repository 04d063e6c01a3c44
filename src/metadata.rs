//! Search settings recorded by the repository: PRIDE XML processing and
//! protocol sections, or the search protocol of an mzIdentML file.

use std::io::BufRead;
use std::path::Path;
use std::sync::LazyLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::domain::FileFormat;
use crate::error::ReshakeError;
use crate::inference::{Tolerance, ToleranceUnit};
use crate::xml::{self, CvParam, attribute, parse_cv_param, xml_error};

const FRAGMENT_TOLERANCE: &str = "PRIDE:0000161";
const PRECURSOR_TOLERANCE: &str = "PRIDE:0000078";
const MISSED_CLEAVAGES: &str = "PRIDE:0000162";
const ENZYME: &str = "PRIDE:0000160";
const MZID_TOLERANCE_PLUS: &str = "MS:1001412";
const MZID_UNKNOWN_MODIFICATION: &str = "MS:1001460";

static TOLERANCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:\+/-|±)?\s*([0-9]*\.?[0-9]+(?:[eE][+-]?[0-9]+)?)\s*([A-Za-z]+(?:\s+[A-Za-z]+)*)?\s*$",
    )
    .expect("tolerance pattern is valid")
});

/// What a metadata file says about the search that produced it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetadataSummary {
    pub fragment_tolerance: Option<Tolerance>,
    pub precursor_tolerance: Option<Tolerance>,
    pub missed_cleavages: Option<u32>,
    /// Distinct, in order of appearance.
    pub enzyme_names: Vec<String>,
    /// Distinct, in order of appearance.
    pub modification_names: Vec<String>,
}

impl MetadataSummary {
    fn add_enzyme(&mut self, name: &str) {
        push_distinct(&mut self.enzyme_names, name);
    }

    fn add_modification(&mut self, name: &str) {
        push_distinct(&mut self.modification_names, name);
    }
}

fn push_distinct(names: &mut Vec<String>, name: &str) {
    let name = name.trim();
    if !name.is_empty() && !names.iter().any(|known| known.eq_ignore_ascii_case(name)) {
        names.push(name.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    PrideXml,
    MzIdentMl,
}

/// Pick the parser from the file extension and scan the whole file.
pub fn extract(path: &Path) -> Result<MetadataSummary, ReshakeError> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or_default();
    let dialect = match FileFormat::from_name(name) {
        FileFormat::PrideXml => Dialect::PrideXml,
        FileFormat::MzIdentMl => Dialect::MzIdentMl,
        _ => {
            return Err(ReshakeError::UnsupportedFormat(format!(
                "{name} is not a metadata source"
            )));
        }
    };
    let reader = xml::open_reader(path)?;
    scan(reader, dialect)
}

pub fn extract_from_reader<R: BufRead>(
    reader: R,
    dialect: Dialect,
) -> Result<MetadataSummary, ReshakeError> {
    scan(xml::from_reader(reader), dialect)
}

fn scan<R: BufRead>(
    mut reader: Reader<R>,
    dialect: Dialect,
) -> Result<MetadataSummary, ReshakeError> {
    let mut summary = MetadataSummary::default();
    let mut stack: Vec<Vec<u8>> = Vec::new();
    let mut buf = Vec::new();
    let mut skip = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = e.local_name().as_ref().to_vec();
                if name == b"spectrumList" {
                    // peak data carries no search settings
                    let end = e.to_end().into_owned();
                    skip.clear();
                    reader
                        .read_to_end_into(end.name(), &mut skip)
                        .map_err(|err| xml_error(&reader, err))?;
                    continue;
                }
                handle_element(&mut summary, &stack, &e, dialect)?;
                stack.push(name);
            }
            Ok(Event::Empty(e)) => handle_element(&mut summary, &stack, &e, dialect)?,
            Ok(Event::End(_)) => {
                stack.pop();
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => return Err(xml_error(&reader, err)),
        }
    }

    debug!(?summary, "metadata extracted");
    Ok(summary)
}

fn handle_element(
    summary: &mut MetadataSummary,
    stack: &[Vec<u8>],
    e: &BytesStart,
    dialect: Dialect,
) -> Result<(), ReshakeError> {
    let parent = stack.last().map(Vec::as_slice).unwrap_or_default();
    let grandparent = stack
        .len()
        .checked_sub(2)
        .and_then(|idx| stack.get(idx))
        .map(Vec::as_slice)
        .unwrap_or_default();

    match (dialect, e.local_name().as_ref()) {
        (Dialect::PrideXml, b"cvParam") => {
            let param = parse_cv_param(e)?;
            pride_param(summary, parent, grandparent, &param);
        }
        (Dialect::MzIdentMl, b"cvParam") => {
            let param = parse_cv_param(e)?;
            mzid_param(summary, parent, &param);
        }
        (Dialect::MzIdentMl, b"userParam") if parent == b"EnzymeName" => {
            if let Some(name) = attribute(e, "name")? {
                summary.add_enzyme(&name);
            }
        }
        (Dialect::MzIdentMl, b"Enzyme") => {
            if summary.missed_cleavages.is_none() {
                summary.missed_cleavages =
                    attribute(e, "missedCleavages")?.and_then(|value| value.trim().parse().ok());
            }
        }
        _ => {}
    }
    Ok(())
}

fn pride_param(summary: &mut MetadataSummary, parent: &[u8], grandparent: &[u8], param: &CvParam) {
    match parent {
        b"processingMethod" => {
            let value = param.value();
            if param.is(&[FRAGMENT_TOLERANCE]) && summary.fragment_tolerance.is_none() {
                summary.fragment_tolerance =
                    value.and_then(|value| parse_tolerance(value, param.unit_name.as_deref()));
            } else if param.is(&[PRECURSOR_TOLERANCE]) && summary.precursor_tolerance.is_none() {
                summary.precursor_tolerance =
                    value.and_then(|value| parse_tolerance(value, param.unit_name.as_deref()));
            } else if param.is(&[MISSED_CLEAVAGES]) && summary.missed_cleavages.is_none() {
                summary.missed_cleavages = value.and_then(|value| value.parse().ok());
            }
        }
        b"StepDescription" if param.is(&[ENZYME]) => {
            let name = param.value().unwrap_or(param.name.as_str());
            summary.add_enzyme(name);
        }
        b"additional" if grandparent == b"ModificationItem" => {
            summary.add_modification(&param.name);
        }
        _ => {}
    }
}

fn mzid_param(summary: &mut MetadataSummary, parent: &[u8], param: &CvParam) {
    match parent {
        b"FragmentTolerance" | b"ParentTolerance" => {
            if !param.is(&[MZID_TOLERANCE_PLUS]) {
                return;
            }
            let tolerance = param
                .value()
                .and_then(|value| parse_tolerance(value, param.unit_name.as_deref()));
            if parent == b"FragmentTolerance" {
                summary.fragment_tolerance = summary.fragment_tolerance.or(tolerance);
            } else {
                summary.precursor_tolerance = summary.precursor_tolerance.or(tolerance);
            }
        }
        b"EnzymeName" => summary.add_enzyme(&param.name),
        b"SearchModification" => {
            if param.is(&[MZID_UNKNOWN_MODIFICATION]) {
                if let Some(value) = param.value() {
                    summary.add_modification(value);
                }
            } else {
                summary.add_modification(&param.name);
            }
        }
        _ => {}
    }
}

/// Parse `0.5 Da`, `10ppm`, `+/- 0.02 dalton`, `10 parts per million`.
/// A missing unit token falls back to `unit_name`, then Daltons.
pub fn parse_tolerance(value: &str, unit_name: Option<&str>) -> Option<Tolerance> {
    let captures = TOLERANCE.captures(value.trim())?;
    let amount: f64 = captures.get(1)?.as_str().parse().ok()?;
    let unit = captures
        .get(2)
        .and_then(|token| unit_from_token(token.as_str()))
        .or_else(|| unit_name.and_then(unit_from_token))
        .unwrap_or(ToleranceUnit::Da);
    Some(Tolerance::new(amount, unit))
}

fn unit_from_token(token: &str) -> Option<ToleranceUnit> {
    let token = token.split_whitespace().collect::<Vec<_>>().join(" ");
    match token.to_ascii_lowercase().as_str() {
        "da" | "dalton" | "daltons" => Some(ToleranceUnit::Da),
        "ppm" | "parts per million" => Some(ToleranceUnit::Ppm),
        _ => None,
    }
}
