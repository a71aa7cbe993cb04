//! Bidirectional mapping between internal category ids and OAI-PMH set specs.
//!
//! arXiv exposes its taxonomy as hierarchical sets (`cs:cs:AI`,
//! `physics:quant-ph`). Internally we use the flat ids users know (`cs.AI`,
//! `quant-ph`). The first component of a set spec is the top-level set that
//! has to be queried to see records of that category.

use std::collections::{HashMap, HashSet};

use crate::error::AppError;
use crate::models::CategoryInfo;

/// Top-level groups in harvesting order, with display names.
const ARXIV_GROUPS: &[(&str, &str)] = &[
    ("cs", "Computer Science"),
    ("stat", "Statistics"),
    ("math", "Mathematics"),
    ("physics", "Physics"),
    ("eess", "Electrical Engineering and Systems Science"),
    ("q-bio", "Quantitative Biology"),
    ("q-fin", "Quantitative Finance"),
];

/// `(category id, set spec, display name)` for every tracked category.
const ARXIV_CATEGORIES: &[(&str, &str, &str)] = &[
    ("cs.AI", "cs:cs:AI", "Artificial Intelligence"),
    ("cs.CL", "cs:cs:CL", "Computation and Language"),
    ("cs.CV", "cs:cs:CV", "Computer Vision and Pattern Recognition"),
    ("cs.LG", "cs:cs:LG", "Machine Learning"),
    ("cs.NE", "cs:cs:NE", "Neural and Evolutionary Computing"),
    ("cs.RO", "cs:cs:RO", "Robotics"),
    ("cs.SE", "cs:cs:SE", "Software Engineering"),
    ("cs.CR", "cs:cs:CR", "Cryptography and Security"),
    ("cs.DB", "cs:cs:DB", "Databases"),
    ("cs.DC", "cs:cs:DC", "Distributed, Parallel, and Cluster Computing"),
    ("cs.HC", "cs:cs:HC", "Human-Computer Interaction"),
    ("cs.IR", "cs:cs:IR", "Information Retrieval"),
    ("cs.PL", "cs:cs:PL", "Programming Languages"),
    ("cs.SY", "cs:cs:SY", "Systems and Control"),
    ("stat.ML", "stat:stat:ML", "Machine Learning"),
    ("stat.TH", "stat:stat:TH", "Statistics Theory"),
    ("stat.ME", "stat:stat:ME", "Methodology"),
    ("stat.AP", "stat:stat:AP", "Applications"),
    ("math.OC", "math:math:OC", "Optimization and Control"),
    ("math.PR", "math:math:PR", "Probability"),
    ("math.ST", "math:math:ST", "Statistics Theory"),
    ("math.NA", "math:math:NA", "Numerical Analysis"),
    ("quant-ph", "physics:quant-ph", "Quantum Physics"),
    ("cond-mat", "physics:cond-mat", "Condensed Matter"),
    ("hep-th", "physics:hep-th", "High Energy Physics - Theory"),
    ("gr-qc", "physics:gr-qc", "General Relativity and Quantum Cosmology"),
    ("eess.AS", "eess:eess:AS", "Audio and Speech Processing"),
    ("eess.IV", "eess:eess:IV", "Image and Video Processing"),
    ("eess.SP", "eess:eess:SP", "Signal Processing"),
    ("eess.SY", "eess:eess:SY", "Systems and Control"),
    ("q-bio.BM", "q-bio:q-bio:BM", "Biomolecules"),
    ("q-bio.GN", "q-bio:q-bio:GN", "Genomics"),
    ("q-bio.NC", "q-bio:q-bio:NC", "Neurons and Cognition"),
    ("q-bio.QM", "q-bio:q-bio:QM", "Quantitative Methods"),
    ("q-fin.CP", "q-fin:q-fin:CP", "Computational Finance"),
    ("q-fin.PM", "q-fin:q-fin:PM", "Portfolio Management"),
    ("q-fin.RM", "q-fin:q-fin:RM", "Risk Management"),
    ("q-fin.ST", "q-fin:q-fin:ST", "Statistical Finance"),
];

/// One row of a mapping table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub category_id: String,
    pub set_spec: String,
    pub name: String,
}

impl MappingEntry {
    pub fn new(category_id: &str, set_spec: &str, name: &str) -> Self {
        Self {
            category_id: category_id.to_string(),
            set_spec: set_spec.to_string(),
            name: name.to_string(),
        }
    }
}

/// Immutable category ↔ set spec table.
#[derive(Debug, Clone)]
pub struct SetMapping {
    entries: Vec<MappingEntry>,
    by_category: HashMap<String, usize>,
    by_set: HashMap<String, usize>,
    top_level: Vec<String>,
    group_names: HashMap<String, String>,
}

impl SetMapping {
    /// The arXiv taxonomy tracked by default.
    pub fn arxiv() -> Self {
        let entries = ARXIV_CATEGORIES
            .iter()
            .map(|(id, spec, name)| MappingEntry::new(id, spec, name))
            .collect();
        let mut mapping = Self::build(entries);
        mapping.group_names = ARXIV_GROUPS
            .iter()
            .map(|(set, name)| (set.to_string(), name.to_string()))
            .collect();
        mapping
    }

    /// Builds a mapping from an arbitrary table.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::ConfigError`] if a category id or set spec occurs
    /// twice, or a set spec has an empty component.
    pub fn from_entries(
        entries: impl IntoIterator<Item = MappingEntry>,
    ) -> Result<Self, AppError> {
        let entries: Vec<MappingEntry> = entries.into_iter().collect();
        let mut seen_ids = HashSet::new();
        let mut seen_specs = HashSet::new();

        for entry in &entries {
            if entry.category_id.is_empty() {
                return Err(AppError::ConfigError(
                    "Category id must not be empty".to_string(),
                ));
            }
            if entry.set_spec.split(':').any(str::is_empty) {
                return Err(AppError::ConfigError(format!(
                    "Invalid set spec '{}' for category '{}'",
                    entry.set_spec, entry.category_id
                )));
            }
            if !seen_ids.insert(entry.category_id.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate category '{}' in set mapping",
                    entry.category_id
                )));
            }
            if !seen_specs.insert(entry.set_spec.as_str()) {
                return Err(AppError::ConfigError(format!(
                    "Duplicate set spec '{}' in set mapping",
                    entry.set_spec
                )));
            }
        }

        Ok(Self::build(entries))
    }

    /// Attaches a display name to a top-level set.
    pub fn with_group_name(mut self, set: &str, name: &str) -> Self {
        self.group_names.insert(set.to_string(), name.to_string());
        self
    }

    fn build(entries: Vec<MappingEntry>) -> Self {
        let mut by_category = HashMap::with_capacity(entries.len());
        let mut by_set = HashMap::with_capacity(entries.len());
        let mut top_level: Vec<String> = Vec::new();

        for (idx, entry) in entries.iter().enumerate() {
            by_category.insert(entry.category_id.clone(), idx);
            by_set.insert(entry.set_spec.clone(), idx);
            let parent = parent_of(&entry.set_spec);
            if !top_level.iter().any(|p| p == parent) {
                top_level.push(parent.to_string());
            }
        }

        Self {
            entries,
            by_category,
            by_set,
            top_level,
            group_names: HashMap::new(),
        }
    }

    /// Set spec for an internal category id.
    pub fn set_spec(&self, category_id: &str) -> Option<&str> {
        self.by_category
            .get(category_id)
            .map(|&idx| self.entries[idx].set_spec.as_str())
    }

    /// Internal category id for a set spec.
    pub fn category(&self, set_spec: &str) -> Option<&str> {
        self.by_set
            .get(set_spec)
            .map(|&idx| self.entries[idx].category_id.as_str())
    }

    /// Top-level set that must be queried to see `category_id`.
    pub fn parent_set(&self, category_id: &str) -> Option<&str> {
        self.set_spec(category_id).map(parent_of)
    }

    /// Distinct top-level sets in table order.
    pub fn top_level_sets(&self) -> &[String] {
        &self.top_level
    }

    /// Every entry, in table order.
    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn entry(&self, category_id: &str) -> Option<&MappingEntry> {
        self.by_category
            .get(category_id)
            .map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, category_id: &str) -> bool {
        self.by_category.contains_key(category_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn group_name(&self, set: &str) -> Option<&str> {
        self.group_names.get(set).map(String::as_str)
    }

    /// Every group and category, groups first, in table order.
    ///
    /// This is what gets seeded into the counts store.
    pub fn category_infos(&self) -> Vec<CategoryInfo> {
        let groups = self.top_level.iter().map(|set| CategoryInfo {
            id: set.clone(),
            name: self.group_name(set).unwrap_or(set.as_str()).to_string(),
            parent_category: None,
        });
        let leaves = self.entries.iter().map(|entry| CategoryInfo {
            id: entry.category_id.clone(),
            name: entry.name.clone(),
            parent_category: Some(parent_of(&entry.set_spec).to_string()),
        });
        groups.chain(leaves).collect()
    }
}

impl Default for SetMapping {
    fn default() -> Self {
        Self::arxiv()
    }
}

/// First component of a set spec.
pub fn parent_of(set_spec: &str) -> &str {
    set_spec.split(':').next().unwrap_or(set_spec)
}
