use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use quick_xml::Reader;
use quick_xml::events::BytesStart;

use crate::error::ReshakeError;

/// A controlled-vocabulary annotation, `<cvParam accession=".." name=".." value=".."/>`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CvParam {
    pub accession: String,
    pub name: String,
    pub value: Option<String>,
    pub unit_name: Option<String>,
}

impl CvParam {
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref().map(str::trim).filter(|value| !value.is_empty())
    }

    pub fn is(&self, accessions: &[&str]) -> bool {
        accessions
            .iter()
            .any(|accession| self.accession.eq_ignore_ascii_case(accession))
    }
}

pub fn open_reader(path: &Path) -> Result<Reader<BufReader<File>>, ReshakeError> {
    let file = File::open(path)
        .map_err(|err| ReshakeError::Filesystem(format!("open {}: {err}", path.display())))?;
    Ok(from_reader(BufReader::new(file)))
}

pub fn from_reader<R: BufRead>(reader: R) -> Reader<R> {
    let mut reader = Reader::from_reader(reader);
    reader.config_mut().trim_text(true);
    reader
}

pub fn attribute(e: &BytesStart, name: &str) -> Result<Option<String>, ReshakeError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ReshakeError::Xml(err.to_string()))?;
        if attr.key.local_name().as_ref() == name.as_bytes() {
            let value = attr
                .unescape_value()
                .map_err(|err| ReshakeError::Xml(err.to_string()))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

pub fn parse_cv_param(e: &BytesStart) -> Result<CvParam, ReshakeError> {
    Ok(CvParam {
        accession: attribute(e, "accession")?.unwrap_or_default(),
        name: attribute(e, "name")?.unwrap_or_default(),
        value: attribute(e, "value")?,
        unit_name: attribute(e, "unitName")?,
    })
}

pub fn xml_error<R>(reader: &Reader<R>, err: quick_xml::Error) -> ReshakeError {
    ReshakeError::Xml(format!("at byte {}: {err}", reader.buffer_position()))
}
