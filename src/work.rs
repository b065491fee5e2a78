//! Work and chapter data model with persistent state.
//!
//! Chapter translation status is stored explicitly in a per-work JSON file
//! rather than inferred from file presence, so a resumed run can tell an
//! empty translation apart from a chapter that was never attempted.

use crate::error::StoreError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Translation status of a single chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TranslationStatus {
    /// Not yet attempted (or explicitly reset for retry).
    #[default]
    Pending,
    /// Translated fields are final and must not be overwritten.
    Translated,
    /// Both providers exhausted this run; needs explicit reconsideration.
    Failed,
}

/// Which provider produced a chapter's translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranslatedBy {
    /// The context-aware provider, with glossary enforcement.
    Primary,
    /// The fast-literal provider; glossary consistency is best-effort only.
    Fallback,
}

/// A single chapter of a work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    /// Chapter number (1-based, unique within a work).
    pub number: u32,

    /// Source-language title.
    pub title: String,

    /// Source-language body.
    pub content: String,

    /// Translated title, set together with the translated body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,

    /// Translated body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_content: Option<String>,

    /// Current translation status.
    pub status: TranslationStatus,

    /// Provider that produced the translation, once translated.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_by: Option<TranslatedBy>,
}

impl Chapter {
    /// Creates a new pending chapter from raw source fields.
    pub fn new(number: u32, title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            content: content.into(),
            translated_title: None,
            translated_content: None,
            status: TranslationStatus::Pending,
            translated_by: None,
        }
    }

    /// Whether this chapter has reached the terminal translated state.
    pub fn is_translated(&self) -> bool {
        self.status == TranslationStatus::Translated
    }

    /// Whether the raw source body is present.
    pub fn has_source(&self) -> bool {
        !self.content.trim().is_empty()
    }
}

/// A serialized fiction work and its full chapter set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Work {
    /// Stable identifier, also used for the library directory name.
    pub id: String,

    /// Source-language title.
    pub title: String,

    /// Translated title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_title: Option<String>,

    /// Source-language description.
    #[serde(default)]
    pub description: String,

    /// Translated description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_description: Option<String>,

    /// Chapters in ascending number order.
    #[serde(default)]
    pub chapters: Vec<Chapter>,
}

impl Work {
    /// Creates a new work with no chapters.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            translated_title: None,
            description: String::new(),
            translated_description: None,
            chapters: Vec::new(),
        }
    }

    /// Numbers of chapters currently pending translation, in order.
    pub fn pending_numbers(&self) -> Vec<u32> {
        self.chapters
            .iter()
            .filter(|c| c.status == TranslationStatus::Pending)
            .map(|c| c.number)
            .collect()
    }

    /// Looks up a chapter by number.
    pub fn chapter(&self, number: u32) -> Option<&Chapter> {
        self.chapters.iter().find(|c| c.number == number)
    }

    /// Looks up a chapter mutably by number.
    pub fn chapter_mut(&mut self, number: u32) -> Option<&mut Chapter> {
        self.chapters.iter_mut().find(|c| c.number == number)
    }

    /// Resets failed chapters back to pending for an explicit retry.
    ///
    /// Returns how many chapters were reset. Failed chapters are never
    /// reset automatically; repeated retries of permanently rejected
    /// content would waste provider quota.
    pub fn reset_failed(&mut self) -> usize {
        let mut reset = 0;
        for chapter in &mut self.chapters {
            if chapter.status == TranslationStatus::Failed {
                chapter.status = TranslationStatus::Pending;
                chapter.translated_by = None;
                reset += 1;
            }
        }
        reset
    }
}

/// Persistent store for a single work's state.
pub struct WorkStore {
    /// Path to the JSON state file.
    filepath: PathBuf,
    /// The work data.
    work: Work,
}

impl WorkStore {
    /// Loads a work state file from disk.
    ///
    /// Chapters are sorted by number on load; duplicate numbers are a
    /// structural error since resume bookkeeping is keyed on them.
    pub fn load(filepath: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let filepath = filepath.into();
        let content = std::fs::read_to_string(&filepath)?;
        let mut work: Work = serde_json::from_str(&content)?;

        work.chapters.sort_by_key(|c| c.number);
        for pair in work.chapters.windows(2) {
            if pair[0].number == pair[1].number {
                return Err(StoreError::InvalidState(format!(
                    "duplicate chapter number {}",
                    pair[0].number
                )));
            }
        }

        Ok(Self { filepath, work })
    }

    /// Creates a new store at the given path and writes it immediately.
    pub fn create(filepath: impl Into<PathBuf>, work: Work) -> Result<Self, StoreError> {
        let store = Self {
            filepath: filepath.into(),
            work,
        };
        store.save()?;
        Ok(store)
    }

    /// Path to the backing state file.
    pub fn filepath(&self) -> &Path {
        &self.filepath
    }

    /// The stored work.
    pub fn work(&self) -> &Work {
        &self.work
    }

    /// Mutable access to the stored work.
    pub fn work_mut(&mut self) -> &mut Work {
        &mut self.work
    }

    /// Writes the work state to disk.
    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.filepath.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&self.work)?;
        std::fs::write(&self.filepath, content)
            .map_err(|e| StoreError::WriteError(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_work() -> Work {
        let mut work = Work::new("novel_7", "测试小说");
        work.chapters = vec![
            Chapter::new(1, "第一章", "正文一"),
            Chapter::new(2, "第二章", "正文二"),
            Chapter::new(3, "第三章", "正文三"),
        ];
        work
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&TranslationStatus::Translated).unwrap();
        assert_eq!(json, "\"translated\"");
        let status: TranslationStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(status, TranslationStatus::Pending);
    }

    #[test]
    fn test_pending_numbers_in_order() {
        let mut work = sample_work();
        work.chapter_mut(2).unwrap().status = TranslationStatus::Translated;
        assert_eq!(work.pending_numbers(), vec![1, 3]);
    }

    #[test]
    fn test_reset_failed_only() {
        let mut work = sample_work();
        work.chapter_mut(1).unwrap().status = TranslationStatus::Failed;
        work.chapter_mut(2).unwrap().status = TranslationStatus::Translated;

        assert_eq!(work.reset_failed(), 1);
        assert_eq!(
            work.chapter(1).unwrap().status,
            TranslationStatus::Pending
        );
        // Translated chapters are untouched by a failed-reset.
        assert_eq!(
            work.chapter(2).unwrap().status,
            TranslationStatus::Translated
        );
    }

    #[test]
    fn test_store_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("novel_7").join("work.json");

        let mut work = sample_work();
        work.chapter_mut(1).unwrap().status = TranslationStatus::Translated;
        work.chapter_mut(1).unwrap().translated_by = Some(TranslatedBy::Primary);
        work.chapter_mut(1).unwrap().translated_content = Some("Body one".to_string());

        WorkStore::create(&path, work).unwrap();

        let store = WorkStore::load(&path).unwrap();
        let loaded = store.work();
        assert_eq!(loaded.chapters.len(), 3);
        let first = loaded.chapter(1).unwrap();
        assert!(first.is_translated());
        assert_eq!(first.translated_by, Some(TranslatedBy::Primary));
        assert_eq!(first.translated_content.as_deref(), Some("Body one"));
    }

    #[test]
    fn test_store_sorts_chapters_on_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("work.json");

        let mut work = sample_work();
        work.chapters.reverse();
        std::fs::write(&path, serde_json::to_string(&work).unwrap()).unwrap();

        let store = WorkStore::load(&path).unwrap();
        let numbers: Vec<u32> = store.work().chapters.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_store_rejects_duplicate_numbers() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("work.json");

        let mut work = sample_work();
        work.chapters.push(Chapter::new(2, "重复", "body"));
        std::fs::write(&path, serde_json::to_string(&work).unwrap()).unwrap();

        assert!(matches!(
            WorkStore::load(&path),
            Err(StoreError::InvalidState(_))
        ));
    }

    #[test]
    fn test_missing_state_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("absent.json");
        assert!(WorkStore::load(&path).is_err());
    }
}
