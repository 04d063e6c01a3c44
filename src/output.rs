use std::io::{self, Write};

use serde::Serialize;

use crate::app::{BatchOutcome, ProgressEvent, ProgressSink};
use crate::convert::ConversionSummary;
use crate::raw::ToolInfo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Interactive,
    NonInteractive,
}

#[derive(Debug, Serialize)]
pub struct ConversionResult<'a> {
    pub input: &'a str,
    pub output: &'a str,
    #[serde(flatten)]
    pub summary: ConversionSummary,
    pub min_charge: Option<i32>,
    pub max_charge: Option<i32>,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_outcome(outcome: &BatchOutcome) -> io::Result<()> {
        Self::print_json(outcome)
    }

    pub fn print_conversion(result: &ConversionResult<'_>) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_tools(info: &ToolInfo) -> io::Result<()> {
        Self::print_json(info)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
