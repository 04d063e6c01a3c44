use std::fs::{self, File};
use std::io::BufReader;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::app::ProgressSink;
use crate::domain::{ChargeRange, Outcome};
use crate::download::{PROGRESS_INTERVAL, ProgressThrottle, remove_partial};
use crate::error::ReshakeError;
use crate::mgf::{MgfReader, MgfWriter, SpectrumRecord};
use crate::pride_xml::{PrideSpectrum, PrideXmlSpectra};
use crate::xml::CvParam;

const PRECURSOR_MZ: &[&str] = &["PSI:1000040", "MS:1000744", "MS:1000040"];
const PRECURSOR_INTENSITY: &[&str] = &["PSI:1000042", "MS:1000042"];
const PRECURSOR_CHARGE: &[&str] = &["PSI:1000041", "MS:1000041"];
const RETENTION_TIME: &[&str] = &["PSI:1000039", "MS:1000894", "PRIDE:0000203", "MS:1000016"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConversionSummary {
    pub valid: usize,
    pub total: usize,
}

/// Map a native spectrum onto an MGF record. `None` for anything but MS2.
///
/// Only the first listed precursor is used.
pub fn spectrum_record(spectrum: &PrideSpectrum) -> Option<SpectrumRecord> {
    if spectrum.ms_level != Some(2) {
        return None;
    }
    let precursor: &[CvParam] = spectrum.precursors.first().map(Vec::as_slice).unwrap_or(&[]);
    let find = |accessions: &[&str]| {
        precursor
            .iter()
            .find(|param| param.is(accessions))
            .and_then(CvParam::value)
    };

    let retention_time = find(RETENTION_TIME)
        .or_else(|| {
            spectrum
                .instrument_params
                .iter()
                .find(|param| param.is(RETENTION_TIME))
                .and_then(CvParam::value)
        })
        .map(str::to_string);

    if spectrum.mz.len() != spectrum.intensity.len() {
        warn!(
            id = %spectrum.id,
            mz = spectrum.mz.len(),
            intensity = spectrum.intensity.len(),
            "peak arrays differ in length, extra values dropped"
        );
    }

    Some(SpectrumRecord {
        title: spectrum.id.clone(),
        precursor_mz: find(PRECURSOR_MZ).and_then(|value| value.parse().ok()),
        precursor_intensity: find(PRECURSOR_INTENSITY).and_then(|value| value.parse().ok()),
        retention_time,
        precursor_charge: find(PRECURSOR_CHARGE).and_then(parse_cv_charge),
        peaks: spectrum
            .mz
            .iter()
            .copied()
            .zip(spectrum.intensity.iter().copied())
            .collect(),
    })
}

/// Charges arrive as `2`, `2.0` or `+2`; zero means unknown.
fn parse_cv_charge(value: &str) -> Option<i32> {
    let value = value.trim().trim_start_matches('+');
    let charge = value
        .parse::<i32>()
        .ok()
        .or_else(|| value.parse::<f64>().ok().map(|v| v.round() as i32))?;
    (charge != 0).then_some(charge)
}

/// Convert the MS2 spectra of a PRIDE XML file into MGF.
///
/// Observed charges are folded into `charges` only when the file converts.
/// Cancellation or failure removes the partial output.
pub fn convert(
    source: &Path,
    destination: &Path,
    charges: &mut ChargeRange,
    sink: &dyn ProgressSink,
) -> Result<Outcome<ConversionSummary>, ReshakeError> {
    let mut spectra = PrideXmlSpectra::open(source)?;
    let mut writer = create_writer(destination)?;
    let mut observed = ChargeRange::new();
    let mut summary = ConversionSummary::default();
    let mut throttle = ProgressThrottle::new(PROGRESS_INTERVAL);

    loop {
        if sink.is_canceled() {
            drop(writer);
            remove_partial(destination);
            info!(source = %source.display(), "conversion canceled");
            return Ok(Outcome::Canceled);
        }
        let spectrum = match spectra.next_spectrum() {
            Ok(Some(spectrum)) => spectrum,
            Ok(None) => break,
            Err(err) => {
                drop(writer);
                remove_partial(destination);
                return Err(err);
            }
        };
        summary.total += 1;

        let Some(record) = spectrum_record(&spectrum) else {
            continue;
        };
        if !record.is_valid() {
            debug!(id = %record.title, "MS2 spectrum without precursor m/z skipped");
            continue;
        }
        if let Some(charge) = record.precursor_charge {
            observed.observe(charge);
        }
        if let Err(err) = writer.write_record(&record) {
            drop(writer);
            remove_partial(destination);
            return Err(ReshakeError::Filesystem(err.to_string()));
        }
        summary.valid += 1;

        if throttle.ready() {
            sink.progress(
                summary.total as u64,
                spectra.declared_count().map(|count| count as u64),
            );
        }
    }

    finish(writer, source, destination, &summary)?;
    charges.merge(&observed);
    info!(
        source = %source.display(),
        valid = summary.valid,
        total = summary.total,
        "converted to MGF"
    );
    Ok(Outcome::Done(summary))
}

/// Re-emit an MGF input in canonical layout, folding its charges into `charges`.
pub fn passthrough_mgf(
    source: &Path,
    destination: &Path,
    charges: &mut ChargeRange,
    sink: &dyn ProgressSink,
) -> Result<Outcome<ConversionSummary>, ReshakeError> {
    if source == destination {
        return Err(ReshakeError::Filesystem(format!(
            "refusing to rewrite {} in place",
            source.display()
        )));
    }
    let file = File::open(source)
        .map_err(|err| ReshakeError::Filesystem(format!("open {}: {err}", source.display())))?;
    let mut records = MgfReader::new(BufReader::new(file));
    let mut writer = create_writer(destination)?;
    let mut observed = ChargeRange::new();
    let mut summary = ConversionSummary::default();

    loop {
        if sink.is_canceled() {
            drop(writer);
            remove_partial(destination);
            return Ok(Outcome::Canceled);
        }
        let record = match records.next() {
            Some(Ok(record)) => record,
            None => break,
            Some(Err(err)) => {
                drop(writer);
                remove_partial(destination);
                return Err(err);
            }
        };
        summary.total += 1;
        if !record.is_valid() {
            continue;
        }
        if let Some(charge) = record.precursor_charge {
            observed.observe(charge);
        }
        if let Err(err) = writer.write_record(&record) {
            drop(writer);
            remove_partial(destination);
            return Err(ReshakeError::Filesystem(err.to_string()));
        }
        summary.valid += 1;
    }

    finish(writer, source, destination, &summary)?;
    charges.merge(&observed);
    Ok(Outcome::Done(summary))
}

fn create_writer(destination: &Path) -> Result<MgfWriter<File>, ReshakeError> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent).map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
    }
    let file = File::create(destination).map_err(|err| {
        ReshakeError::Filesystem(format!("create {}: {err}", destination.display()))
    })?;
    Ok(MgfWriter::new(file))
}

fn finish(
    writer: MgfWriter<File>,
    source: &Path,
    destination: &Path,
    summary: &ConversionSummary,
) -> Result<(), ReshakeError> {
    if let Err(err) = writer.finish() {
        remove_partial(destination);
        return Err(ReshakeError::Filesystem(err.to_string()));
    }
    if summary.valid == 0 {
        remove_partial(destination);
        return Err(ReshakeError::NoUsableSpectra(format!(
            "{} ({} spectra read)",
            source.display(),
            summary.total
        )));
    }
    Ok(())
}
