//! Backend operations the reveal pipeline and portrait queue depend on.
//!
//! Kept as traits so the pipeline can run against in-memory fakes; `Api` is the
//! production implementation.

use super::types::{Character, Continuation, Id};
use super::Api;
use async_trait::async_trait;

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Illustration for a story paragraph. Returns the image URL.
    async fn illustrate(&self, prompt: &str) -> anyhow::Result<String>;

    /// Portrait for a story character. Returns the image URL.
    async fn portrait(&self, story_id: &Id, character: &Character) -> anyhow::Result<String>;
}

#[async_trait]
pub trait StoryStore: Send + Sync {
    async fn save_content(&self, story_id: &Id, content: &str, choices: &[String]) -> anyhow::Result<()>;

    async fn continue_story(&self, story_id: &Id, choice: &str) -> anyhow::Result<Continuation>;
}

#[async_trait]
pub trait CharacterStore: Send + Sync {
    async fn update_character(&self, character: &Character) -> anyhow::Result<()>;
}

#[async_trait]
impl ImageGenerator for Api {
    async fn illustrate(&self, prompt: &str) -> anyhow::Result<String> {
        Ok(self.generate_image(prompt).await?.image)
    }

    async fn portrait(&self, story_id: &Id, character: &Character) -> anyhow::Result<String> {
        Ok(self.generate_portrait(story_id, character).await?.image)
    }
}

#[async_trait]
impl StoryStore for Api {
    async fn save_content(&self, story_id: &Id, content: &str, choices: &[String]) -> anyhow::Result<()> {
        self.update_story(story_id, content, choices).await?;
        Ok(())
    }

    async fn continue_story(&self, story_id: &Id, choice: &str) -> anyhow::Result<Continuation> {
        Ok(self.continue_from_choice(story_id, choice).await?)
    }
}

#[async_trait]
impl CharacterStore for Api {
    async fn update_character(&self, character: &Character) -> anyhow::Result<()> {
        self.put_character(character).await?;
        Ok(())
    }
}
