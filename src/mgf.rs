//! The MGF interchange format: one `BEGIN IONS` / `END IONS` block per spectrum.

use std::io::{self, BufRead, BufWriter, Write};

use crate::error::ReshakeError;

/// One spectrum as written to MGF.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpectrumRecord {
    pub title: String,
    pub precursor_mz: Option<f64>,
    pub precursor_intensity: Option<f64>,
    /// Passed through as found in the source, unit not interpreted.
    pub retention_time: Option<String>,
    pub precursor_charge: Option<i32>,
    pub peaks: Vec<(f64, f64)>,
}

impl SpectrumRecord {
    /// A record without precursor m/z cannot be searched.
    pub fn is_valid(&self) -> bool {
        self.precursor_mz.is_some()
    }
}

pub struct MgfWriter<W: Write> {
    handle: BufWriter<W>,
    written: usize,
}

impl<W: Write> MgfWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            handle: BufWriter::new(inner),
            written: 0,
        }
    }

    pub fn records_written(&self) -> usize {
        self.written
    }

    pub fn write_record(&mut self, record: &SpectrumRecord) -> io::Result<()> {
        let out = &mut self.handle;
        writeln!(out, "BEGIN IONS")?;
        writeln!(out, "TITLE={}", record.title)?;
        if let Some(mz) = record.precursor_mz {
            match record.precursor_intensity {
                Some(intensity) => writeln!(out, "PEPMASS={mz} {intensity}")?,
                None => writeln!(out, "PEPMASS={mz}")?,
            }
        }
        if let Some(rt) = &record.retention_time {
            writeln!(out, "RTINSECONDS={rt}")?;
        }
        if let Some(charge) = record.precursor_charge {
            writeln!(out, "CHARGE={}", format_charge(charge))?;
        }
        for (mz, intensity) in &record.peaks {
            writeln!(out, "{mz} {intensity}")?;
        }
        writeln!(out, "END IONS")?;
        writeln!(out)?;
        self.written += 1;
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.handle.flush()?;
        self.handle.into_inner().map_err(|err| err.into_error())
    }
}

pub fn format_charge(charge: i32) -> String {
    if charge < 0 {
        format!("{}-", charge.unsigned_abs())
    } else {
        format!("{charge}+")
    }
}

/// Accepts `2+`, `+2`, `3-`, `2` and lists such as `2+ and 3+` (first wins).
/// A zero charge means "unknown" and yields `None`.
pub fn parse_charge(value: &str) -> Option<i32> {
    let first = value
        .split(|ch: char| ch == ',' || ch.is_whitespace())
        .find(|token| !token.is_empty())?;
    let negative = first.contains('-');
    let digits = first.trim_matches(|ch| ch == '+' || ch == '-');
    let magnitude: i32 = digits.parse().ok()?;
    if magnitude == 0 {
        return None;
    }
    Some(if negative { -magnitude } else { magnitude })
}

/// Streaming reader over the blocks of an MGF file.
pub struct MgfReader<R: BufRead> {
    lines: io::Lines<R>,
    line_number: usize,
}

impl<R: BufRead> MgfReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }

    fn malformed(&self, message: &str) -> ReshakeError {
        ReshakeError::UnsupportedFormat(format!("MGF line {}: {message}", self.line_number))
    }

    fn read_block(&mut self) -> Result<Option<SpectrumRecord>, ReshakeError> {
        let mut current: Option<SpectrumRecord> = None;
        while let Some(line) = self.lines.next() {
            let line = line.map_err(|err| ReshakeError::Filesystem(err.to_string()))?;
            self.line_number += 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "BEGIN IONS" {
                current = Some(SpectrumRecord::default());
                continue;
            }
            if line == "END IONS" {
                if current.is_some() {
                    return Ok(current);
                }
                continue;
            }
            let Some(record) = current.as_mut() else {
                // global parameters before the first block
                continue;
            };
            if let Some((key, value)) = line.split_once('=') {
                match key.trim().to_ascii_uppercase().as_str() {
                    "TITLE" => record.title = value.trim().to_string(),
                    "PEPMASS" => {
                        let mut parts = value.split_whitespace();
                        record.precursor_mz = parts.next().and_then(|v| v.parse().ok());
                        record.precursor_intensity = parts.next().and_then(|v| v.parse().ok());
                        if let Some(charge) = parts.next().and_then(parse_charge) {
                            record.precursor_charge = Some(charge);
                        }
                    }
                    "RTINSECONDS" => record.retention_time = Some(value.trim().to_string()),
                    "CHARGE" => record.precursor_charge = parse_charge(value),
                    _ => {}
                }
                continue;
            }
            let mut parts = line.split_whitespace();
            let mz = parts.next().and_then(|v| v.parse::<f64>().ok());
            let intensity = parts.next().and_then(|v| v.parse::<f64>().ok());
            match (mz, intensity) {
                (Some(mz), Some(intensity)) => record.peaks.push((mz, intensity)),
                (Some(mz), None) => record.peaks.push((mz, 0.0)),
                _ => return Err(self.malformed(line)),
            }
        }
        if current.is_some() {
            return Err(self.malformed("unterminated spectrum block"));
        }
        Ok(None)
    }
}

impl<R: BufRead> Iterator for MgfReader<R> {
    type Item = Result<SpectrumRecord, ReshakeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_block().transpose()
    }
}
