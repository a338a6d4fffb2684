//! Sequential portrait generation for characters that have none.
//!
//! Jobs run strictly one after another: the next character is only sent once the
//! previous result (portrait or placeholder) is in the cache.

use super::sink::RevealSink;
use crate::api::{Character, CharacterStore, Id, ImageGenerator};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub fn placeholder_url(name: &str) -> String {
    format!("https://via.placeholder.com/400x600?text={}", urlencoding::encode(name))
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PortraitReport {
    pub generated: usize,
    pub placeholders: usize,
    pub skipped: usize,
    pub cancelled: bool,
}

pub struct PortraitQueue {
    story_id: Id,
    images: Arc<dyn ImageGenerator>,
    characters: Arc<dyn CharacterStore>,
    sink: Arc<dyn RevealSink>,
    cache: Arc<Mutex<Vec<Character>>>,
    in_progress: Mutex<HashSet<Id>>,
    cooldown: Duration,
    cancel: CancellationToken,
}

impl PortraitQueue {
    pub fn new(
        story_id: Id,
        images: Arc<dyn ImageGenerator>,
        characters: Arc<dyn CharacterStore>,
        sink: Arc<dyn RevealSink>,
        cache: Arc<Mutex<Vec<Character>>>,
        cooldown: Duration,
    ) -> Self {
        Self {
            story_id,
            images,
            characters,
            sink,
            cache,
            in_progress: Mutex::new(HashSet::new()),
            cooldown,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn characters(&self) -> Vec<Character> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Generates portraits for every cached character lacking one, in cache order.
    #[instrument(skip(self), fields(story = %self.story_id))]
    pub async fn run(&self) -> PortraitReport {
        let pending: Vec<Character> = self
            .characters()
            .into_iter()
            .filter(Character::needs_portrait)
            .collect();
        let mut report = PortraitReport::default();
        if pending.is_empty() {
            return report;
        }
        info!(count = pending.len(), "Generating missing portraits");

        let last = pending.len() - 1;
        for (i, character) in pending.into_iter().enumerate() {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }
            if !self.claim(&character.id) {
                debug!(character = %character.id, "Portrait already in progress, skipping");
                report.skipped += 1;
                continue;
            }

            let generated = self.generate_one(&character).await;
            self.release(&character.id);
            match generated {
                Some(true) => report.generated += 1,
                Some(false) => report.placeholders += 1,
                None => {
                    report.cancelled = true;
                    break;
                }
            }

            if i < last && !self.cooldown.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        report.cancelled = true;
                        break;
                    }
                    _ = tokio::time::sleep(self.cooldown) => {}
                }
            }
        }
        report
    }

    /// `Some(true)` portrait stored, `Some(false)` placeholder used, `None` cancelled.
    async fn generate_one(&self, character: &Character) -> Option<bool> {
        let attempt = async {
            let url = self.images.portrait(&self.story_id, character).await?;
            if url.trim().is_empty() {
                anyhow::bail!("image service returned an empty url");
            }
            let updated = Character {
                image_url: Some(url.clone()),
                ..character.clone()
            };
            self.characters.update_character(&updated).await?;
            Ok::<_, anyhow::Error>(url)
        };

        let result = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            result = attempt => result,
        };

        match result {
            Ok(url) => {
                self.store(&character.id, &url);
                Some(true)
            }
            Err(e) => {
                warn!(character = %character.name, error = %e, "Portrait generation failed, using placeholder");
                self.store(&character.id, &placeholder_url(&character.name));
                Some(false)
            }
        }
    }

    fn store(&self, id: &Id, url: &str) {
        let mut cache = self.cache.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = cache.iter_mut().find(|c| &c.id == id) {
            entry.image_url = Some(url.to_string());
        }
        self.sink.portrait_changed(id, url);
    }

    fn claim(&self, id: &Id) -> bool {
        self.in_progress.lock().unwrap_or_else(|e| e.into_inner()).insert(id.clone())
    }

    fn release(&self, id: &Id) {
        self.in_progress.lock().unwrap_or_else(|e| e.into_inner()).remove(id);
    }
}
