//! Canonical enzyme and modification names, and how repository free text maps onto them.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_ENZYME: &str = "Trypsin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnzymeRef {
    Known(String),
    /// Original repository text that no catalog entry matched.
    Unknown(String),
}

impl fmt::Display for EnzymeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnzymeRef::Known(name) => write!(f, "{name}"),
            EnzymeRef::Unknown(text) => write!(f, "unknown ({text})"),
        }
    }
}

const ENZYMES: &[(&str, &[&str])] = &[
    ("Trypsin", &["trypsin/p", "trypsine", "trypsin porcine"]),
    ("Trypsin (no P rule)", &["trypsin no p rule", "trypsin (no p)"]),
    ("Arg-C", &["argc", "arg-c proteinase", "clostripain"]),
    ("Asp-N", &["aspn", "asp-n endopeptidase"]),
    ("Chymotrypsin", &["chymotrypsin (fyw)"]),
    ("CNBr", &["cyanogen bromide"]),
    ("Glu-C", &["gluc", "v8-de", "glu-c (de)"]),
    ("Lys-C", &["lysc", "lys-c endopeptidase", "endoproteinase lys-c"]),
    ("Lys-N", &["lysn"]),
    ("Pepsin A", &["pepsin", "pepsina"]),
    ("Thermolysin", &[]),
    ("Trypsin + Lys-C", &["trypsin/lys-c", "lys-c/trypsin"]),
    ("Whole Protein", &["no cleavage", "no enzyme", "unspecific cleavage"]),
];

#[derive(Debug, Clone)]
pub struct EnzymeCatalog {
    index: HashMap<String, String>,
}

impl EnzymeCatalog {
    pub fn builtin() -> Self {
        let mut index = HashMap::new();
        for (canonical, aliases) in ENZYMES {
            index.insert(canonical.to_ascii_lowercase(), canonical.to_string());
            for alias in *aliases {
                index.insert(alias.to_string(), canonical.to_string());
            }
        }
        Self { index }
    }

    /// Exact match after trimming, ignoring case. No fuzzy matching.
    pub fn lookup(&self, name: &str) -> Option<&str> {
        self.index
            .get(&name.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn canonical_names(&self) -> Vec<&str> {
        ENZYMES.iter().map(|(canonical, _)| *canonical).collect()
    }
}

impl Default for EnzymeCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

const MODIFICATIONS: &[(&str, &[&str])] = &[
    (
        "Carbamidomethylation of C",
        &[
            "carbamidomethyl",
            "carbamidomethyl c",
            "carbamidomethylation",
            "iodoacetamide derivatized residue",
            "s-carboxamidomethyl-l-cysteine",
            "carbamidomethylated residue",
        ],
    ),
    (
        "Oxidation of M",
        &[
            "oxidation",
            "oxidation m",
            "l-methionine sulfoxide",
            "monohydroxylated residue",
            "oxidized residue",
        ],
    ),
    ("Phosphorylation of S", &["o-phospho-l-serine", "phospho s"]),
    ("Phosphorylation of T", &["o-phospho-l-threonine", "phospho t"]),
    ("Phosphorylation of Y", &["o4'-phospho-l-tyrosine", "phospho y"]),
    ("Phosphorylation of STY", &["phospho", "phosphorylated residue", "phosphorylation"]),
    (
        "Acetylation of protein N-term",
        &["acetyl", "acetylated residue", "n-acetylated residue", "acetylation"],
    ),
    ("Deamidation of N", &["deamidated asparagine", "l-aspartic acid"]),
    ("Deamidation of Q", &["deamidated glutamine", "l-glutamic acid"]),
    ("Deamidation of N and Q", &["deamidated", "deamidated residue", "deamidation"]),
    (
        "Pyrolidone from Q",
        &["gln->pyro-glu", "2-pyrrolidone-5-carboxylic acid (gln)", "pyro-glu from q"],
    ),
    (
        "Pyrolidone from E",
        &["glu->pyro-glu", "2-pyrrolidone-5-carboxylic acid (glu)", "pyro-glu from e"],
    ),
    ("Methylation of K", &["methyl", "methylated residue"]),
    ("Dimethylation of K", &["dimethyl", "dimethylated residue"]),
    ("iTRAQ 4-plex of K", &["itraq4plex", "itraq4plex-116 reporter+balance reagent"]),
    ("TMT 6-plex of K", &["tmt6plex", "tmt6plex reporter+balance reagent"]),
    ("Ubiquitination of K", &["glygly", "gg", "ubiquitinylation residue"]),
];

/// Placeholder names repositories use when nothing was modified.
const REJECTED_MODIFICATIONS: &[&str] = &[
    "none",
    "no modification",
    "no modifications",
    "unmodified",
    "not available",
    "n/a",
    "na",
    "-",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModificationMapping {
    Mapped(String),
    Rejected,
    Unknown,
}

#[derive(Debug, Clone)]
pub struct ModificationCatalog {
    index: HashMap<String, String>,
}

impl ModificationCatalog {
    pub fn builtin() -> Self {
        let mut index = HashMap::new();
        for (canonical, aliases) in MODIFICATIONS {
            index.insert(canonical.to_ascii_lowercase(), canonical.to_string());
            for alias in *aliases {
                index.insert(alias.to_string(), canonical.to_string());
            }
        }
        Self { index }
    }

    /// Add caller-known modification names; each maps onto itself.
    pub fn with_known<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            let name = name.as_ref().trim();
            if !name.is_empty() {
                self.index
                    .entry(name.to_ascii_lowercase())
                    .or_insert_with(|| name.to_string());
            }
        }
        self
    }

    pub fn map(&self, name: &str) -> ModificationMapping {
        let key = name.trim().to_ascii_lowercase();
        if key.is_empty() || REJECTED_MODIFICATIONS.contains(&key.as_str()) {
            return ModificationMapping::Rejected;
        }
        match self.index.get(&key) {
            Some(canonical) => ModificationMapping::Mapped(canonical.clone()),
            None => ModificationMapping::Unknown,
        }
    }
}

impl Default for ModificationCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Decides whether a mapped modification is searched as fixed or variable.
pub trait FixedModificationPolicy {
    fn is_fixed(&self, repository_name: &str, canonical_id: &str) -> bool;
}

const CARBAMIDOMETHYL_NAMES: &[&str] = &[
    "carbamidomethyl",
    "carbamidomethyl c",
    "carbamidomethylation",
    "carbamidomethylation of c",
    "iodoacetamide derivatized residue",
    "s-carboxamidomethyl-l-cysteine",
];

/// Literal name list: carbamidomethyl-family names are fixed, everything else variable.
#[derive(Debug, Clone, Copy, Default)]
pub struct CarbamidomethylPolicy;

impl FixedModificationPolicy for CarbamidomethylPolicy {
    fn is_fixed(&self, repository_name: &str, canonical_id: &str) -> bool {
        [repository_name, canonical_id].iter().any(|name| {
            let name = name.trim().to_ascii_lowercase();
            CARBAMIDOMETHYL_NAMES.contains(&name.as_str())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enzyme_lookup_is_exact_but_case_insensitive() {
        let catalog = EnzymeCatalog::builtin();
        assert_eq!(catalog.lookup("  trypsin "), Some("Trypsin"));
        assert_eq!(catalog.lookup("Trypsin/P"), Some("Trypsin"));
        assert_eq!(catalog.lookup("Tryp"), None);
    }

    #[test]
    fn modification_placeholders_are_rejected() {
        let catalog = ModificationCatalog::builtin();
        assert_eq!(catalog.map("None"), ModificationMapping::Rejected);
        assert_eq!(
            catalog.map("Oxidation"),
            ModificationMapping::Mapped("Oxidation of M".to_string())
        );
        assert_eq!(catalog.map("Sulfation"), ModificationMapping::Unknown);
    }

    #[test]
    fn known_names_map_to_themselves() {
        let catalog = ModificationCatalog::builtin().with_known(["Sulfation of Y"]);
        assert_eq!(
            catalog.map("sulfation of y"),
            ModificationMapping::Mapped("Sulfation of Y".to_string())
        );
    }

    #[test]
    fn carbamidomethyl_family_is_fixed() {
        let policy = CarbamidomethylPolicy;
        assert!(policy.is_fixed("iodoacetamide derivatized residue", "Carbamidomethylation of C"));
        assert!(policy.is_fixed("whatever", "Carbamidomethylation of C"));
        assert!(!policy.is_fixed("Oxidation", "Oxidation of M"));
    }
}
