//! Content platform publisher boundary.
//!
//! The pipeline hands completed chapters to a publisher and records the
//! outcome; retrying failed publishes is the publisher's own concern. The
//! REST implementation targets a WordPress-style crawler plugin API with
//! X-API-Key authentication.

use crate::config::PublishConfig;
use crate::error::PublishError;
use crate::work::{Chapter, Work};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

/// Outcome of publishing one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishResult {
    /// A new entry was created on the platform.
    Created { id: u64 },
    /// The entry already existed and was updated in place.
    Updated { id: u64 },
}

impl PublishResult {
    fn from_response(id: u64, existed: bool) -> Self {
        if existed {
            PublishResult::Updated { id }
        } else {
            PublishResult::Created { id }
        }
    }

    /// Platform identifier of the published entry.
    pub fn id(&self) -> u64 {
        match self {
            PublishResult::Created { id } | PublishResult::Updated { id } => *id,
        }
    }
}

/// Trait for content platform publishers.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Creates or updates the work entry (title, description).
    async fn publish_work(&self, work: &Work) -> Result<PublishResult, PublishError>;

    /// Creates or updates one translated chapter.
    async fn publish_chapter(
        &self,
        work: &Work,
        chapter: &Chapter,
    ) -> Result<PublishResult, PublishError>;
}

/// Request payload for creating a story.
#[derive(Debug, Serialize)]
struct StoryPayload<'a> {
    source_id: &'a str,
    title: &'a str,
    description: &'a str,
}

/// Request payload for creating a chapter.
#[derive(Debug, Serialize)]
struct ChapterPayload<'a> {
    story_id: u64,
    chapter_number: u32,
    title: &'a str,
    content: &'a str,
}

/// Response from the story endpoint.
#[derive(Debug, Deserialize)]
struct StoryResponse {
    story_id: u64,
    #[serde(default)]
    existed: bool,
}

/// Response from the chapter endpoint.
#[derive(Debug, Deserialize)]
struct ChapterResponse {
    chapter_id: u64,
    #[serde(default)]
    existed: bool,
}

/// REST publisher for a WordPress crawler-plugin API.
pub struct WordPressPublisher {
    /// HTTP client for API requests.
    client: Client,
    /// Platform endpoint and credentials.
    config: PublishConfig,
    /// Story ids resolved this run, keyed by work id.
    story_ids: Mutex<HashMap<String, u64>>,
}

impl WordPressPublisher {
    /// Create a new WordPressPublisher.
    pub fn new(config: PublishConfig) -> Self {
        Self {
            client: Client::new(),
            config,
            story_ids: Mutex::new(HashMap::new()),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/wp-json/crawler/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            path
        )
    }

    /// Checks connectivity to the platform.
    pub async fn health_check(&self) -> Result<(), PublishError> {
        let response = self
            .client
            .get(self.endpoint("health"))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::ApiError {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    async fn post_json<T: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        payload: &T,
    ) -> Result<R, PublishError> {
        let response = self
            .client
            .post(self.endpoint(path))
            .header("X-API-Key", &self.config.api_key)
            .timeout(Duration::from_secs(30))
            .json(payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(PublishError::ApiError {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| PublishError::ParseError(e.to_string()))
    }

    /// Resolves the platform story id for a work, creating it if needed.
    async fn story_id(&self, work: &Work) -> Result<u64, PublishError> {
        if let Some(&id) = self.story_ids.lock().unwrap().get(&work.id) {
            return Ok(id);
        }

        let result = self.publish_work(work).await?;
        Ok(result.id())
    }
}

#[async_trait]
impl Publisher for WordPressPublisher {
    async fn publish_work(&self, work: &Work) -> Result<PublishResult, PublishError> {
        let payload = StoryPayload {
            source_id: &work.id,
            title: work.translated_title.as_deref().unwrap_or(&work.title),
            description: work.translated_description.as_deref().unwrap_or(""),
        };

        let response: StoryResponse = self.post_json("story", &payload).await?;
        self.story_ids
            .lock()
            .unwrap()
            .insert(work.id.clone(), response.story_id);

        Ok(PublishResult::from_response(
            response.story_id,
            response.existed,
        ))
    }

    async fn publish_chapter(
        &self,
        work: &Work,
        chapter: &Chapter,
    ) -> Result<PublishResult, PublishError> {
        let story_id = self.story_id(work).await?;

        let payload = ChapterPayload {
            story_id,
            chapter_number: chapter.number,
            title: chapter.translated_title.as_deref().unwrap_or(&chapter.title),
            content: chapter.translated_content.as_deref().unwrap_or(""),
        };

        let response: ChapterResponse = self.post_json("chapter", &payload).await?;
        Ok(PublishResult::from_response(
            response.chapter_id,
            response.existed,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_result_mapping() {
        assert_eq!(
            PublishResult::from_response(5, false),
            PublishResult::Created { id: 5 }
        );
        assert_eq!(
            PublishResult::from_response(5, true),
            PublishResult::Updated { id: 5 }
        );
        assert_eq!(PublishResult::Created { id: 9 }.id(), 9);
    }

    #[test]
    fn test_story_payload_serialization() {
        let mut work = Work::new("novel_7", "测试小说");
        work.translated_title = Some("Test Novel".to_string());
        work.translated_description = Some("A story.".to_string());

        let payload = StoryPayload {
            source_id: &work.id,
            title: work.translated_title.as_deref().unwrap(),
            description: work.translated_description.as_deref().unwrap(),
        };

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["source_id"], "novel_7");
        assert_eq!(json["title"], "Test Novel");
        assert_eq!(json["description"], "A story.");
    }

    #[test]
    fn test_chapter_response_parsing() {
        let response: ChapterResponse =
            serde_json::from_str(r#"{"chapter_id":42,"existed":true}"#).unwrap();
        assert_eq!(response.chapter_id, 42);
        assert!(response.existed);

        // The existed flag is optional in older plugin versions.
        let response: ChapterResponse = serde_json::from_str(r#"{"chapter_id":7}"#).unwrap();
        assert!(!response.existed);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let publisher = WordPressPublisher::new(PublishConfig {
            base_url: "https://example.com/".to_string(),
            api_key: "k".to_string(),
        });
        assert_eq!(
            publisher.endpoint("story"),
            "https://example.com/wp-json/crawler/v1/story"
        );
    }
}
