//! Glossary store for consistent term renderings.
//!
//! Holds the fixed target-language rendering for every recurring name and
//! term in a work, keyed by (category, source term). The store is built
//! once per work from a chapter sample, then read-only for the rest of the
//! run; the JSON file is deliberately simple so it can be amended by hand
//! between runs.

use crate::error::GlossaryError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Category of a glossary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TermCategory {
    /// Character names.
    Character,
    /// Place and organization names.
    Place,
    /// Special terminology (cultivation terms, skills, artifacts).
    Term,
}

impl TermCategory {
    /// All categories in file order.
    pub const ALL: [TermCategory; 3] =
        [TermCategory::Character, TermCategory::Place, TermCategory::Term];
}

/// A single source-term-to-rendering pair with its category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlossaryEntry {
    /// Entry category.
    pub category: TermCategory,
    /// Source-language term.
    pub source: String,
    /// Fixed target-language rendering.
    pub rendering: String,
}

/// Categorized mapping of source terms to fixed renderings.
///
/// Serializes as three named groups so the file reads naturally when
/// edited by hand:
///
/// ```json
/// {"characters":{"林羽":"Lin Yu"},"places":{},"terms":{}}
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GlossaryStore {
    characters: BTreeMap<String, String>,
    places: BTreeMap<String, String>,
    terms: BTreeMap<String, String>,
}

impl GlossaryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn group(&self, category: TermCategory) -> &BTreeMap<String, String> {
        match category {
            TermCategory::Character => &self.characters,
            TermCategory::Place => &self.places,
            TermCategory::Term => &self.terms,
        }
    }

    fn group_mut(&mut self, category: TermCategory) -> &mut BTreeMap<String, String> {
        match category {
            TermCategory::Character => &mut self.characters,
            TermCategory::Place => &mut self.places,
            TermCategory::Term => &mut self.terms,
        }
    }

    /// Inserts an entry unless the (category, source term) key already has
    /// a rendering. The first occurrence wins; returns whether the entry
    /// was inserted.
    pub fn insert(&mut self, entry: GlossaryEntry) -> bool {
        let source = entry.source.trim();
        let rendering = entry.rendering.trim();
        if source.is_empty() || rendering.is_empty() {
            return false;
        }

        let group = self.group_mut(entry.category);
        if group.contains_key(source) {
            return false;
        }
        group.insert(source.to_string(), rendering.to_string());
        true
    }

    /// Looks up the rendering for a term within a category.
    pub fn get(&self, category: TermCategory, source: &str) -> Option<&str> {
        self.group(category).get(source).map(String::as_str)
    }

    /// Total number of entries across all categories.
    pub fn len(&self) -> usize {
        self.characters.len() + self.places.len() + self.terms.len()
    }

    /// Number of entries in one category.
    pub fn category_len(&self, category: TermCategory) -> usize {
        self.group(category).len()
    }

    /// Whether the store has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterates over all entries, characters first.
    pub fn entries(&self) -> impl Iterator<Item = GlossaryEntry> + '_ {
        TermCategory::ALL.into_iter().flat_map(move |category| {
            self.group(category).iter().map(move |(source, rendering)| GlossaryEntry {
                category,
                source: source.clone(),
                rendering: rendering.clone(),
            })
        })
    }

    /// Renders the store as a provider instruction block.
    ///
    /// At most `max_entries` lines, longest source terms first so the most
    /// collision-prone names survive the cap. Returns an empty string for
    /// an empty store.
    pub fn render_hints(&self, max_entries: usize) -> String {
        let mut entries: Vec<GlossaryEntry> = self.entries().collect();
        entries.sort_by(|a, b| {
            b.source
                .chars()
                .count()
                .cmp(&a.source.chars().count())
                .then_with(|| a.source.cmp(&b.source))
        });
        entries.truncate(max_entries);

        entries
            .iter()
            .map(|e| format!("- {} = {}", e.source, e.rendering))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Loads a glossary for a work, if one has been persisted.
    pub fn load(path: &Path) -> Result<Option<Self>, GlossaryError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        let store: GlossaryStore = serde_json::from_str(&content)?;
        Ok(Some(store))
    }

    /// Saves the glossary to disk.
    pub fn save(&self, path: &Path) -> Result<(), GlossaryError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| GlossaryError::WriteError(e.to_string()))?;

        Ok(())
    }
}
