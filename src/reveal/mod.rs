//! Reveal pipeline: turns story content into an incrementally updated list of
//! display lines.
//!
//! Two modes:
//! - `Immediate` shows stored content in one update.
//! - `Typewriter` types freshly generated content character by character,
//!   requests illustrations for marked paragraphs without waiting on them,
//!   then types the branch choices.
//!
//! Every delay is raced against the pipeline's cancellation token. Once cancelled,
//! no further step is scheduled, running illustration jobs are aborted and nothing
//! is persisted. When a typewriter reveal finishes, the pipeline waits for its
//! illustrations and saves the final content once (best effort).

pub mod lines;
pub mod portraits;
pub mod sink;

pub use lines::{is_image_url, split_paragraphs, DisplayLine, Paragraph, ParagraphKind};
pub use portraits::{placeholder_url, PortraitQueue, PortraitReport};
pub use sink::{NullSink, RevealSink};

use crate::api::{Id, ImageGenerator, StoryStore};
use crate::config::RevealConfig;
use lines::{RevealState, Slot};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealMode {
    Immediate,
    Typewriter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealOutcome {
    /// All steps ran. `persisted` is false when nothing was saved or the save failed.
    Completed { persisted: bool },
    Cancelled,
}

struct Cancelled;

type Step = Result<(), Cancelled>;

pub struct RevealPipeline {
    story_id: Id,
    config: RevealConfig,
    images: Arc<dyn ImageGenerator>,
    store: Arc<dyn StoryStore>,
    sink: Arc<dyn RevealSink>,
    state: Arc<Mutex<RevealState>>,
    cancel: CancellationToken,
    running: tokio::sync::Mutex<()>,
}

impl RevealPipeline {
    pub fn new(
        story_id: Id,
        config: RevealConfig,
        images: Arc<dyn ImageGenerator>,
        store: Arc<dyn StoryStore>,
        sink: Arc<dyn RevealSink>,
    ) -> Self {
        Self {
            story_id,
            config,
            images,
            store,
            sink,
            state: Arc::new(Mutex::new(RevealState::default())),
            cancel: CancellationToken::new(),
            running: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn story_id(&self) -> &Id {
        &self.story_id
    }

    /// Token shared with everything this pipeline schedules. Cancel it when the
    /// view goes away.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn lines(&self) -> Vec<DisplayLine> {
        self.lock().lines()
    }

    pub fn choices(&self) -> Vec<String> {
        self.lock().choices.clone()
    }

    /// Current lines in stored form.
    pub fn content(&self) -> String {
        self.lock().serialize()
    }

    /// Shows `content` and `choices`, replacing whatever was displayed.
    #[instrument(skip(self, content, choices), fields(story = %self.story_id))]
    pub async fn reveal(&self, content: &str, choices: &[String], mode: RevealMode) -> RevealOutcome {
        let _running = self.running.lock().await;
        if self.check().is_err() {
            return self.cancelled();
        }
        let paragraphs = split_paragraphs(content);

        if mode == RevealMode::Immediate {
            let mut state = self.lock();
            state.slots = paragraphs.iter().map(Slot::stored).collect();
            state.choices = choices.to_vec();
            self.sink.lines_changed(&state.lines());
            self.sink.choices_changed(&state.choices);
            self.sink.scroll_to_bottom();
            return RevealOutcome::Completed { persisted: false };
        }

        {
            let mut state = self.lock();
            state.slots.clear();
            state.choices.clear();
            self.sink.lines_changed(&[]);
            self.sink.choices_changed(&[]);
        }

        info!(paragraphs = paragraphs.len(), choices = choices.len(), "Typewriter reveal started");
        let mut jobs = Vec::new();
        let typed = match self
            .type_paragraphs(&paragraphs, self.config.plain_char_delay_ms, &mut jobs)
            .await
        {
            Ok(()) => self.type_choices(choices).await,
            Err(c) => Err(c),
        };
        if typed.is_err() {
            abort_all(&jobs);
            return self.cancelled();
        }
        if self.settle(jobs).await.is_err() || self.check().is_err() {
            return self.cancelled();
        }

        RevealOutcome::Completed {
            persisted: self.persist().await,
        }
    }

    /// Records `choice`, asks the backend to continue the story from it and types
    /// the continuation after the existing lines.
    ///
    /// A failed continuation restores the previous choices and returns the error.
    #[instrument(skip(self, choice), fields(story = %self.story_id))]
    pub async fn choose_branch(&self, choice: &str) -> anyhow::Result<RevealOutcome> {
        let _running = self.running.lock().await;
        if self.cancel.is_cancelled() {
            return Ok(RevealOutcome::Cancelled);
        }

        let (content, previous_choices) = {
            let mut state = self.lock();
            state.slots.push(Slot::stored(&Paragraph::choice_annotation(choice)));
            let previous = std::mem::take(&mut state.choices);
            self.sink.lines_changed(&state.lines());
            self.sink.choices_changed(&[]);
            (state.serialize(), previous)
        };

        if let Err(e) = self.store.save_content(&self.story_id, &content, &previous_choices).await {
            warn!(error = %e, "Failed to save branch choice");
        }

        let continuation = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(self.cancelled()),
            result = self.store.continue_story(&self.story_id, choice) => result,
        };
        let continuation = match continuation {
            Ok(c) => c,
            Err(e) => {
                let mut state = self.lock();
                state.choices = previous_choices;
                self.sink.choices_changed(&state.choices);
                return Err(e);
            }
        };

        let paragraphs = split_paragraphs(&continuation.content);
        debug!(paragraphs = paragraphs.len(), "Continuation received");
        let mut jobs = Vec::new();
        if self
            .type_paragraphs(&paragraphs, self.config.char_delay_ms, &mut jobs)
            .await
            .is_err()
        {
            abort_all(&jobs);
            return Ok(self.cancelled());
        }

        {
            let mut state = self.lock();
            state.choices = continuation.story_direction;
            self.sink.choices_changed(&state.choices);
        }

        if self.settle(jobs).await.is_err() || self.check().is_err() {
            return Ok(self.cancelled());
        }
        Ok(RevealOutcome::Completed {
            persisted: self.persist().await,
        })
    }

    /// Appends and types `paragraphs`. Spawned illustration jobs are pushed to
    /// `jobs`; the caller aborts them if this returns `Cancelled`.
    async fn type_paragraphs(
        &self,
        paragraphs: &[Paragraph],
        plain_delay_ms: u64,
        jobs: &mut Vec<JoinHandle<()>>,
    ) -> Step {
        for paragraph in paragraphs {
            self.check()?;
            let slot = {
                let mut state = self.lock();
                state.slots.push(Slot::empty_for(paragraph.kind));
                state.slots.len() - 1
            };

            match paragraph.kind {
                ParagraphKind::Image => {
                    let mut state = self.lock();
                    state.slots[slot].text = paragraph.text.clone();
                    self.sink.lines_changed(&state.lines());
                }
                ParagraphKind::Illustrated => {
                    self.type_into(slot, &paragraph.text, self.config.char_delay_ms).await?;
                    self.sink.image_loading(slot, true);
                    jobs.push(self.spawn_illustration(slot, paragraph.text.clone()));
                }
                ParagraphKind::Text | ParagraphKind::Choice => {
                    self.type_into(slot, &paragraph.text, plain_delay_ms).await?;
                }
            }

            self.sink.scroll_to_bottom();
            self.pause(self.config.paragraph_pause_ms).await?;
        }
        Ok(())
    }

    async fn type_into(&self, slot: usize, text: &str, delay_ms: u64) -> Step {
        for c in text.chars() {
            self.check()?;
            {
                let mut state = self.lock();
                state.slots[slot].text.push(c);
                self.sink.lines_changed(&state.lines());
            }
            self.pause(delay_ms).await?;
        }
        Ok(())
    }

    async fn type_choices(&self, choices: &[String]) -> Step {
        for choice in choices {
            let mut partial = String::new();
            for c in choice.chars() {
                self.check()?;
                partial.push(c);
                self.sink.choice_typing(&partial);
                self.pause(self.config.char_delay_ms).await?;
            }
            {
                let mut state = self.lock();
                state.choices.push(choice.clone());
                self.sink.choice_typing("");
                self.sink.choices_changed(&state.choices);
            }
            self.pause(self.config.choice_pause_ms).await?;
        }
        Ok(())
    }

    /// Illustration for paragraph `slot`. Failures only clear the loading state.
    fn spawn_illustration(&self, slot: usize, prompt: String) -> JoinHandle<()> {
        let images = Arc::clone(&self.images);
        let state = Arc::clone(&self.state);
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            let url = match images.illustrate(&prompt).await {
                Ok(url) if !url.trim().is_empty() => Some(url),
                Ok(_) => {
                    warn!(paragraph = slot, "Image service returned an empty url");
                    None
                }
                Err(e) => {
                    warn!(paragraph = slot, error = %e, "Illustration failed");
                    None
                }
            };

            let mut state = state.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(url) = url {
                if let Some(target) = state.slots.get_mut(slot) {
                    target.image = Some(url);
                }
                sink.lines_changed(&state.lines());
            }
            sink.image_loading(slot, false);
        })
    }

    /// Waits for every illustration job, aborting the rest on cancellation.
    async fn settle(&self, mut jobs: Vec<JoinHandle<()>>) -> Step {
        for i in 0..jobs.len() {
            let cancelled = tokio::select! {
                _ = self.cancel.cancelled() => true,
                joined = &mut jobs[i] => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Illustration task did not complete");
                    }
                    false
                }
            };
            if cancelled {
                abort_all(&jobs[i..]);
                return Err(Cancelled);
            }
        }
        Ok(())
    }

    async fn persist(&self) -> bool {
        let (content, choices) = {
            let state = self.lock();
            (state.serialize(), state.choices.clone())
        };
        match self.store.save_content(&self.story_id, &content, &choices).await {
            Ok(()) => {
                debug!(bytes = content.len(), "Story content saved");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to save story content");
                false
            }
        }
    }

    async fn pause(&self, ms: u64) -> Step {
        self.check()?;
        if ms == 0 {
            return Ok(());
        }
        tokio::select! {
            _ = self.cancel.cancelled() => Err(Cancelled),
            _ = tokio::time::sleep(Duration::from_millis(ms)) => Ok(()),
        }
    }

    fn check(&self) -> Step {
        if self.cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    fn cancelled(&self) -> RevealOutcome {
        info!("Reveal cancelled");
        self.sink.choice_typing("");
        RevealOutcome::Cancelled
    }

    fn lock(&self) -> MutexGuard<'_, RevealState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn abort_all(jobs: &[JoinHandle<()>]) {
    jobs.iter().for_each(JoinHandle::abort);
}
