//! Streaming access to the `spectrumList` of a PRIDE XML (mzData) container.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use base64::prelude::*;
use byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use crate::error::ReshakeError;
use crate::xml::{self, CvParam, attribute, parse_cv_param, xml_error};

/// One `<spectrum>` element, decoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrideSpectrum {
    pub id: String,
    pub ms_level: Option<u8>,
    /// cvParams of `spectrumInstrument`.
    pub instrument_params: Vec<CvParam>,
    /// `ionSelection` cvParams, one entry per listed precursor.
    pub precursors: Vec<Vec<CvParam>>,
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

pub struct PrideXmlSpectra<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    declared_count: Option<usize>,
    finished: bool,
}

impl PrideXmlSpectra<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, ReshakeError> {
        Ok(Self::with_reader(xml::open_reader(path)?))
    }
}

impl<R: BufRead> PrideXmlSpectra<R> {
    pub fn from_reader(reader: R) -> Self {
        Self::with_reader(xml::from_reader(reader))
    }

    fn with_reader(reader: Reader<R>) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            declared_count: None,
            finished: false,
        }
    }

    /// The `count` attribute of `spectrumList`, once it has been read.
    pub fn declared_count(&self) -> Option<usize> {
        self.declared_count
    }

    pub fn next_spectrum(&mut self) -> Result<Option<PrideSpectrum>, ReshakeError> {
        if self.finished {
            return Ok(None);
        }
        loop {
            self.buf.clear();
            let id = match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"spectrum" => attribute(&e, "id")?.unwrap_or_default(),
                    b"spectrumList" => {
                        self.declared_count =
                            attribute(&e, "count")?.and_then(|count| count.parse().ok());
                        continue;
                    }
                    _ => continue,
                },
                Ok(Event::End(e)) if e.local_name().as_ref() == b"spectrumList" => {
                    self.finished = true;
                    return Ok(None);
                }
                Ok(Event::Eof) => {
                    self.finished = true;
                    return Ok(None);
                }
                Ok(_) => continue,
                Err(err) => return Err(xml_error(&self.reader, err)),
            };
            let spectrum = read_spectrum(&mut self.reader, &mut self.buf, id)?;
            return Ok(Some(spectrum));
        }
    }
}

impl<R: BufRead> Iterator for PrideXmlSpectra<R> {
    type Item = Result<PrideSpectrum, ReshakeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_spectrum().transpose()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Other,
    Instrument,
    IonSelection,
}

#[derive(Debug, Clone, Copy)]
enum ArrayKind {
    Mz,
    Intensity,
}

#[derive(Debug, Clone, Copy)]
struct DataEncoding {
    double: bool,
    big_endian: bool,
}

impl DataEncoding {
    fn from_start(e: &BytesStart) -> Result<Self, ReshakeError> {
        let precision = attribute(e, "precision")?.unwrap_or_else(|| "64".to_string());
        let endian = attribute(e, "endian")?.unwrap_or_else(|| "little".to_string());
        let double = match precision.trim() {
            "64" => true,
            "32" => false,
            other => {
                return Err(ReshakeError::BinaryDecode(format!(
                    "unsupported precision {other}"
                )));
            }
        };
        Ok(Self {
            double,
            big_endian: endian.trim().eq_ignore_ascii_case("big"),
        })
    }

    fn decode(self, text: &str) -> Result<Vec<f64>, ReshakeError> {
        let compact: String = text.chars().filter(|ch| !ch.is_whitespace()).collect();
        if compact.is_empty() {
            return Ok(Vec::new());
        }
        let bytes = BASE64_STANDARD
            .decode(compact)
            .map_err(|err| ReshakeError::BinaryDecode(err.to_string()))?;
        let width = if self.double { 8 } else { 4 };
        if bytes.len() % width != 0 {
            return Err(ReshakeError::BinaryDecode(format!(
                "{} bytes is not a multiple of {width}",
                bytes.len()
            )));
        }

        let mut cursor = bytes.as_slice();
        let mut values = Vec::with_capacity(bytes.len() / width);
        let io_err = |err: std::io::Error| ReshakeError::BinaryDecode(err.to_string());
        while !cursor.is_empty() {
            let value = match (self.double, self.big_endian) {
                (true, false) => cursor.read_f64::<LittleEndian>().map_err(io_err)?,
                (true, true) => cursor.read_f64::<BigEndian>().map_err(io_err)?,
                (false, false) => cursor.read_f32::<LittleEndian>().map_err(io_err)? as f64,
                (false, true) => cursor.read_f32::<BigEndian>().map_err(io_err)? as f64,
            };
            values.push(value);
        }
        Ok(values)
    }
}

fn ms_level(e: &BytesStart) -> Result<Option<u8>, ReshakeError> {
    Ok(attribute(e, "msLevel")?.and_then(|level| level.trim().parse().ok()))
}

fn push_param(spectrum: &mut PrideSpectrum, section: Section, param: CvParam) {
    match section {
        Section::IonSelection => {
            if let Some(precursor) = spectrum.precursors.last_mut() {
                precursor.push(param);
            }
        }
        Section::Instrument => spectrum.instrument_params.push(param),
        Section::Other => {}
    }
}

fn read_spectrum<R: BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    id: String,
) -> Result<PrideSpectrum, ReshakeError> {
    let mut spectrum = PrideSpectrum {
        id,
        ..PrideSpectrum::default()
    };
    let mut depth = 1usize;
    let mut section = Section::Other;
    let mut array: Option<ArrayKind> = None;
    let mut data: Option<DataEncoding> = None;
    let mut text = String::new();

    loop {
        buf.clear();
        match reader.read_event_into(buf) {
            Ok(Event::Start(e)) => {
                depth += 1;
                match e.local_name().as_ref() {
                    b"spectrumInstrument" => {
                        spectrum.ms_level = ms_level(&e)?;
                        section = Section::Instrument;
                    }
                    b"precursor" => spectrum.precursors.push(Vec::new()),
                    b"ionSelection" => section = Section::IonSelection,
                    b"mzArrayBinary" => array = Some(ArrayKind::Mz),
                    b"intenArrayBinary" => array = Some(ArrayKind::Intensity),
                    b"data" => {
                        data = Some(DataEncoding::from_start(&e)?);
                        text.clear();
                    }
                    b"cvParam" => push_param(&mut spectrum, section, parse_cv_param(&e)?),
                    _ => {}
                }
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"spectrumInstrument" => spectrum.ms_level = ms_level(&e)?,
                b"cvParam" => push_param(&mut spectrum, section, parse_cv_param(&e)?),
                _ => {}
            },
            Ok(Event::Text(t)) => {
                if data.is_some() {
                    let chunk = t.unescape().map_err(|err| xml_error(reader, err))?;
                    text.push_str(&chunk);
                }
            }
            Ok(Event::CData(c)) => {
                if data.is_some() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                depth -= 1;
                match e.local_name().as_ref() {
                    b"spectrum" if depth == 0 => return Ok(spectrum),
                    b"spectrumInstrument" | b"ionSelection" => section = Section::Other,
                    b"data" => {
                        if let Some(encoding) = data.take() {
                            let values = encoding.decode(&text)?;
                            match array {
                                Some(ArrayKind::Mz) => spectrum.mz = values,
                                Some(ArrayKind::Intensity) => spectrum.intensity = values,
                                None => {}
                            }
                        }
                    }
                    b"mzArrayBinary" | b"intenArrayBinary" => array = None,
                    _ => {}
                }
            }
            Ok(Event::Eof) => {
                return Err(ReshakeError::Xml(format!(
                    "unexpected end of file inside spectrum {}",
                    spectrum.id
                )));
            }
            Ok(_) => {}
            Err(err) => return Err(xml_error(reader, err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_f64(values: &[f64]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        BASE64_STANDARD.encode(bytes)
    }

    fn encode_f32_be(values: &[f32]) -> String {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        BASE64_STANDARD.encode(bytes)
    }

    #[test]
    fn reads_one_spectrum() {
        let xml = format!(
            r#"<mzData><spectrumList count="1">
<spectrum id="7">
  <spectrumDesc>
    <spectrumSettings>
      <spectrumInstrument msLevel="2">
        <cvParam cvLabel="PSI" accession="PSI:1000039" name="TimeInMinutes" value="12.5"/>
      </spectrumInstrument>
    </spectrumSettings>
    <precursorList count="1">
      <precursor msLevel="1" spectrumRef="6">
        <ionSelection>
          <cvParam cvLabel="PSI" accession="PSI:1000040" name="MassToChargeRatio" value="445.12"/>
          <cvParam cvLabel="PSI" accession="PSI:1000041" name="ChargeState" value="2"/>
        </ionSelection>
        <activation>
          <cvParam cvLabel="PSI" accession="PSI:1000045" name="CollisionEnergy" value="35"/>
        </activation>
      </precursor>
    </precursorList>
  </spectrumDesc>
  <mzArrayBinary><data precision="64" endian="little" length="2">{}</data></mzArrayBinary>
  <intenArrayBinary><data precision="32" endian="big" length="2">{}</data></intenArrayBinary>
</spectrum>
</spectrumList></mzData>"#,
            encode_f64(&[100.5, 200.25]),
            encode_f32_be(&[10.0, 20.5])
        );

        let mut spectra = PrideXmlSpectra::from_reader(xml.as_bytes());
        let spectrum = spectra.next_spectrum().unwrap().unwrap();
        assert_eq!(spectrum.id, "7");
        assert_eq!(spectrum.ms_level, Some(2));
        assert_eq!(spectrum.precursors.len(), 1);
        assert_eq!(spectrum.precursors[0].len(), 2);
        assert_eq!(spectrum.instrument_params.len(), 1);
        assert_eq!(spectrum.mz, vec![100.5, 200.25]);
        assert_eq!(spectrum.intensity, vec![10.0, 20.5]);
        assert_eq!(spectra.declared_count(), Some(1));
        assert!(spectra.next_spectrum().unwrap().is_none());
    }

    #[test]
    fn truncated_spectrum_is_an_error() {
        let xml = r#"<mzData><spectrumList count="1"><spectrum id="1"><spectrumDesc>"#;
        let mut spectra = PrideXmlSpectra::from_reader(xml.as_bytes());
        assert!(spectra.next_spectrum().is_err());
    }
}
