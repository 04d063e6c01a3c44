use std::fmt;

use serde::Serialize;

/// Where an inferred value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Extracted,
    Defaulted,
    Assumed,
    UserSelected,
    Unmapped,
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Provenance::Extracted => "extracted",
            Provenance::Defaulted => "defaulted",
            Provenance::Assumed => "assumed",
            Provenance::UserSelected => "user selected",
            Provenance::Unmapped => "unmapped",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReportEntry {
    Field {
        name: String,
        value: String,
        provenance: Option<Provenance>,
    },
    Warning {
        message: String,
    },
    Note {
        message: String,
    },
}

/// Append-only account of how each search parameter was obtained.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ParameterReport {
    entries: Vec<ReportEntry>,
    files: Vec<String>,
}

impl ParameterReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(&mut self, name: &str, value: impl fmt::Display, provenance: Provenance) {
        self.entries.push(ReportEntry::Field {
            name: name.to_string(),
            value: value.to_string(),
            provenance: Some(provenance),
        });
    }

    /// A caller-supplied value that was taken as-is.
    pub fn info(&mut self, name: &str, value: impl fmt::Display) {
        self.entries.push(ReportEntry::Field {
            name: name.to_string(),
            value: value.to_string(),
            provenance: None,
        });
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.entries.push(ReportEntry::Warning {
            message: message.into(),
        });
    }

    pub fn note(&mut self, message: impl Into<String>) {
        self.entries.push(ReportEntry::Note {
            message: message.into(),
        });
    }

    pub fn consumed(&mut self, file: impl Into<String>) {
        self.files.push(file.into());
    }

    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    /// Provenance of the first field called `name`.
    pub fn provenance_of(&self, name: &str) -> Option<Provenance> {
        self.entries.iter().find_map(|entry| match entry {
            ReportEntry::Field {
                name: field,
                provenance,
                ..
            } if field == name => *provenance,
            _ => None,
        })
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|entry| match entry {
            ReportEntry::Warning { message } => Some(message.as_str()),
            _ => None,
        })
    }

    pub fn render(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParameterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Search parameters")?;
        for entry in &self.entries {
            match entry {
                ReportEntry::Field {
                    name,
                    value,
                    provenance: Some(provenance),
                } => writeln!(f, "{name}: {value} [{provenance}]")?,
                ReportEntry::Field {
                    name,
                    value,
                    provenance: None,
                } => writeln!(f, "{name}: {value}")?,
                ReportEntry::Warning { message } => writeln!(f, "(!) {message}")?,
                ReportEntry::Note { message } => writeln!(f, "note: {message}")?,
            }
        }
        writeln!(f)?;
        writeln!(f, "Files:")?;
        for file in &self.files {
            writeln!(f, "  - {file}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_in_insertion_order() {
        let mut report = ParameterReport::new();
        report.field("enzyme", "Trypsin", Provenance::Assumed);
        report.warning("unknown modification: Sulfation");
        report.consumed("a.xml");

        let text = report.render();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "enzyme: Trypsin [assumed]");
        assert_eq!(lines[2], "(!) unknown modification: Sulfation");
        assert_eq!(lines.last(), Some(&"  - a.xml"));
        assert_eq!(report.provenance_of("enzyme"), Some(Provenance::Assumed));
    }
}
