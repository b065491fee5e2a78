//! Raw chapter source boundary.
//!
//! Fetching and parsing the source site is an external collaborator's job;
//! the pipeline only checks presence and pulls raw text through this
//! narrow interface. The directory-backed implementation reads chapters a
//! crawler has already dropped into the work's `raw/` directory.

use crate::error::SourceError;
use async_trait::async_trait;
use std::path::PathBuf;

/// A raw, untranslated chapter as delivered by the crawler.
#[derive(Debug, Clone)]
pub struct RawChapter {
    /// Source-language title.
    pub title: String,
    /// Source-language body.
    pub content: String,
}

/// Trait for raw chapter providers.
#[async_trait]
pub trait ChapterSource: Send + Sync {
    /// Whether any raw chapters exist for the work.
    async fn has_work(&self, work_id: &str) -> bool;

    /// Fetches one raw chapter by number.
    async fn fetch_chapter(&self, work_id: &str, number: u32) -> Result<RawChapter, SourceError>;
}

/// Chapter source reading pre-crawled files from the library directory.
///
/// Layout: `{library}/{work_id}/raw/{NNNN}.txt`, first line is the chapter
/// title, the remainder is the body.
pub struct DirChapterSource {
    /// Library root directory.
    library_dir: PathBuf,
}

impl DirChapterSource {
    /// Create a new DirChapterSource over a library directory.
    pub fn new(library_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: library_dir.into(),
        }
    }

    fn chapter_path(&self, work_id: &str, number: u32) -> PathBuf {
        self.library_dir
            .join(work_id)
            .join("raw")
            .join(format!("{:04}.txt", number))
    }
}

#[async_trait]
impl ChapterSource for DirChapterSource {
    async fn has_work(&self, work_id: &str) -> bool {
        let raw_dir = self.library_dir.join(work_id).join("raw");
        let Ok(entries) = std::fs::read_dir(&raw_dir) else {
            return false;
        };
        entries
            .flatten()
            .any(|e| e.path().extension().is_some_and(|ext| ext == "txt"))
    }

    async fn fetch_chapter(&self, work_id: &str, number: u32) -> Result<RawChapter, SourceError> {
        let path = self.chapter_path(work_id, number);
        if !path.exists() {
            return Err(SourceError::NotFound {
                work_id: work_id.to_string(),
                number,
            });
        }

        let raw = std::fs::read_to_string(&path)?;
        let (title, content) = match raw.split_once('\n') {
            Some((title, content)) => (title.trim().to_string(), content.trim().to_string()),
            None => (raw.trim().to_string(), String::new()),
        };

        Ok(RawChapter { title, content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn seed_chapter(dir: &TempDir, work_id: &str, number: u32, text: &str) {
        let raw_dir = dir.path().join(work_id).join("raw");
        std::fs::create_dir_all(&raw_dir).unwrap();
        std::fs::write(raw_dir.join(format!("{:04}.txt", number)), text).unwrap();
    }

    #[tokio::test]
    async fn test_fetch_chapter() {
        let dir = TempDir::new().unwrap();
        seed_chapter(&dir, "novel_7", 1, "第一章 开端\n林羽睁开眼睛。\n\n天色微亮。");

        let source = DirChapterSource::new(dir.path());
        let chapter = source.fetch_chapter("novel_7", 1).await.unwrap();
        assert_eq!(chapter.title, "第一章 开端");
        assert_eq!(chapter.content, "林羽睁开眼睛。\n\n天色微亮。");
    }

    #[tokio::test]
    async fn test_fetch_missing_chapter() {
        let dir = TempDir::new().unwrap();
        seed_chapter(&dir, "novel_7", 1, "第一章\n正文");

        let source = DirChapterSource::new(dir.path());
        let err = source.fetch_chapter("novel_7", 2).await.unwrap_err();
        assert!(matches!(err, SourceError::NotFound { number: 2, .. }));
    }

    #[tokio::test]
    async fn test_has_work() {
        let dir = TempDir::new().unwrap();
        let source = DirChapterSource::new(dir.path());
        assert!(!source.has_work("novel_7").await);

        seed_chapter(&dir, "novel_7", 1, "第一章\n正文");
        assert!(source.has_work("novel_7").await);
    }

    #[tokio::test]
    async fn test_title_only_file() {
        let dir = TempDir::new().unwrap();
        seed_chapter(&dir, "novel_7", 1, "第一章");

        let source = DirChapterSource::new(dir.path());
        let chapter = source.fetch_chapter("novel_7", 1).await.unwrap();
        assert_eq!(chapter.title, "第一章");
        assert!(chapter.content.is_empty());
    }
}
