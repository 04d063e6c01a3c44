use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::app::Prompter;
use crate::catalog::{
    CarbamidomethylPolicy, DEFAULT_ENZYME, EnzymeCatalog, EnzymeRef, FixedModificationPolicy,
    ModificationCatalog, ModificationMapping,
};
use crate::domain::ChargeRange;
use crate::metadata::MetadataSummary;
use crate::report::{ParameterReport, Provenance};

const PTM_DELIMITER: char = ';';

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ToleranceUnit {
    #[serde(rename = "Da")]
    Da,
    #[serde(rename = "ppm")]
    Ppm,
}

impl fmt::Display for ToleranceUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToleranceUnit::Da => write!(f, "Da"),
            ToleranceUnit::Ppm => write!(f, "ppm"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Tolerance {
    pub value: f64,
    pub unit: ToleranceUnit,
}

impl Tolerance {
    pub fn new(value: f64, unit: ToleranceUnit) -> Self {
        Self { value, unit }
    }
}

impl fmt::Display for Tolerance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModificationEntry {
    pub id: String,
    pub is_fixed: bool,
}

/// Canonical modification ids in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModificationProfile {
    entries: Vec<ModificationEntry>,
}

impl ModificationProfile {
    /// Returns false when `id` is already present; the first setting wins.
    pub fn insert(&mut self, id: &str, is_fixed: bool) -> bool {
        if self.get(id).is_some() {
            return false;
        }
        self.entries.push(ModificationEntry {
            id: id.to_string(),
            is_fixed,
        });
        true
    }

    pub fn get(&self, id: &str) -> Option<&ModificationEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModificationEntry> {
        self.entries.iter()
    }

    pub fn fixed(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| entry.is_fixed)
            .map(|entry| entry.id.as_str())
    }

    pub fn variable(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|entry| !entry.is_fixed)
            .map(|entry| entry.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchParameterSet {
    pub fragment_tolerance: Tolerance,
    pub precursor_tolerance: Tolerance,
    pub missed_cleavages: u32,
    pub enzymes: Vec<EnzymeRef>,
    pub modifications: ModificationProfile,
    pub min_charge: i32,
    pub max_charge: i32,
    pub fasta_path: Option<String>,
}

/// Values used for anything the metadata does not state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterDefaults {
    pub fragment_tolerance: Tolerance,
    pub precursor_tolerance: Tolerance,
    pub missed_cleavages: u32,
    pub min_charge: i32,
    pub max_charge: i32,
}

impl Default for ParameterDefaults {
    fn default() -> Self {
        Self {
            fragment_tolerance: Tolerance::new(0.5, ToleranceUnit::Da),
            precursor_tolerance: Tolerance::new(10.0, ToleranceUnit::Ppm),
            missed_cleavages: 2,
            min_charge: 2,
            max_charge: 4,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InferenceInput<'a> {
    pub metadata: Option<&'a MetadataSummary>,
    /// `;`-separated project or assay level modification names.
    pub project_ptms: Option<&'a str>,
    pub species: Option<&'a str>,
    pub fasta: Option<&'a str>,
    pub defaults: ParameterDefaults,
    pub notes: Vec<String>,
    pub files: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Inference {
    pub parameters: SearchParameterSet,
    pub report: ParameterReport,
}

pub struct InferenceEngine<P: FixedModificationPolicy = CarbamidomethylPolicy> {
    enzymes: EnzymeCatalog,
    modifications: ModificationCatalog,
    policy: P,
}

impl InferenceEngine<CarbamidomethylPolicy> {
    pub fn new(known_modifications: &[String]) -> Self {
        Self::with_policy(known_modifications, CarbamidomethylPolicy)
    }
}

impl<P: FixedModificationPolicy> InferenceEngine<P> {
    pub fn with_policy(known_modifications: &[String], policy: P) -> Self {
        Self {
            enzymes: EnzymeCatalog::builtin(),
            modifications: ModificationCatalog::builtin().with_known(known_modifications),
            policy,
        }
    }

    pub fn infer(
        &self,
        input: &InferenceInput<'_>,
        charges: &ChargeRange,
        prompter: &dyn Prompter,
    ) -> Inference {
        let defaults = &input.defaults;
        let metadata = input.metadata.cloned().unwrap_or_default();
        let mut report = ParameterReport::new();

        let fragment_tolerance = pick(
            &mut report,
            "fragment tolerance",
            metadata.fragment_tolerance,
            defaults.fragment_tolerance,
        );
        let precursor_tolerance = pick(
            &mut report,
            "precursor tolerance",
            metadata.precursor_tolerance,
            defaults.precursor_tolerance,
        );
        let missed_cleavages = pick(
            &mut report,
            "missed cleavages",
            metadata.missed_cleavages,
            defaults.missed_cleavages,
        );

        let enzymes = self.resolve_enzymes(&metadata.enzyme_names, prompter, &mut report);
        let modifications =
            self.resolve_modifications(input.project_ptms, &metadata, prompter, &mut report);

        let (min_charge, max_charge) = match (charges.min(), charges.max()) {
            (Some(min), Some(max)) => {
                report.field("minimum charge", min, Provenance::Extracted);
                report.field("maximum charge", max, Provenance::Extracted);
                (min, max)
            }
            _ => {
                report.field("minimum charge", defaults.min_charge, Provenance::Defaulted);
                report.field("maximum charge", defaults.max_charge, Provenance::Defaulted);
                (defaults.min_charge, defaults.max_charge)
            }
        };

        report.info("species", input.species.unwrap_or("not specified"));
        report.info("fasta", input.fasta.unwrap_or("not specified"));
        for note in &input.notes {
            report.note(note.clone());
        }
        for file in &input.files {
            report.consumed(file.clone());
        }

        let parameters = SearchParameterSet {
            fragment_tolerance,
            precursor_tolerance,
            missed_cleavages,
            enzymes,
            modifications,
            min_charge,
            max_charge,
            fasta_path: input.fasta.map(str::to_string),
        };
        info!(
            enzymes = parameters.enzymes.len(),
            modifications = parameters.modifications.len(),
            "search parameters inferred"
        );
        Inference { parameters, report }
    }

    fn resolve_enzymes(
        &self,
        names: &[String],
        prompter: &dyn Prompter,
        report: &mut ParameterReport,
    ) -> Vec<EnzymeRef> {
        match names {
            [] => {
                report.field("enzyme", DEFAULT_ENZYME, Provenance::Assumed);
                vec![EnzymeRef::Known(DEFAULT_ENZYME.to_string())]
            }
            [name] => {
                if let Some(canonical) = self.enzymes.lookup(name) {
                    report.field("enzyme", canonical, Provenance::Extracted);
                    return vec![EnzymeRef::Known(canonical.to_string())];
                }
                vec![ask_enzyme(name, prompter, report)]
            }
            _ => {
                // several declared enzymes are disambiguated as one answer
                let joined = names.join(", ");
                vec![ask_enzyme(&joined, prompter, report)]
            }
        }
    }

    fn resolve_modifications(
        &self,
        project_ptms: Option<&str>,
        metadata: &MetadataSummary,
        prompter: &dyn Prompter,
        report: &mut ParameterReport,
    ) -> ModificationProfile {
        let mut names: Vec<String> = Vec::new();
        let declared = project_ptms
            .into_iter()
            .flat_map(|list| list.split(PTM_DELIMITER))
            .map(str::to_string);
        for name in declared.chain(metadata.modification_names.iter().cloned()) {
            let name = name.trim();
            if !name.is_empty() && !names.iter().any(|seen| seen.eq_ignore_ascii_case(name)) {
                names.push(name.to_string());
            }
        }

        let mut profile = ModificationProfile::default();
        let mut unknown = Vec::new();
        for name in &names {
            match self.modifications.map(name) {
                ModificationMapping::Mapped(id) => {
                    let is_fixed = self.policy.is_fixed(name, &id);
                    if profile.insert(&id, is_fixed) {
                        let kind = if is_fixed { "fixed" } else { "variable" };
                        report.field(
                            "modification",
                            format!("{id} ({kind}, from '{name}')"),
                            Provenance::Extracted,
                        );
                    }
                }
                ModificationMapping::Rejected => {
                    debug!(%name, "placeholder modification name ignored");
                }
                ModificationMapping::Unknown => unknown.push(name.clone()),
            }
        }
        if profile.is_empty() && unknown.is_empty() {
            report.field("modifications", "none", Provenance::Defaulted);
        }

        for name in &unknown {
            prompter.ask_unknown_modification(name);
            report.warning(format!("modification '{name}' could not be mapped"));
        }
        profile
    }
}

fn pick<T: fmt::Display + Copy>(
    report: &mut ParameterReport,
    name: &str,
    extracted: Option<T>,
    default: T,
) -> T {
    match extracted {
        Some(value) => {
            report.field(name, value, Provenance::Extracted);
            value
        }
        None => {
            report.field(name, default, Provenance::Defaulted);
            default
        }
    }
}

fn ask_enzyme(candidate: &str, prompter: &dyn Prompter, report: &mut ParameterReport) -> EnzymeRef {
    match prompter.ask_enzyme(candidate) {
        Some(choice) => {
            report.field(
                "enzyme",
                format!("{choice} (declared as '{candidate}')"),
                Provenance::UserSelected,
            );
            choice
        }
        None => {
            report.field("enzyme", format!("unknown ({candidate})"), Provenance::Unmapped);
            EnzymeRef::Unknown(candidate.to_string())
        }
    }
}
