use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CleanerError {
    #[error("Prompt is empty after cleaning")]
    EmptyInput,
    #[error("Prompt exceeds maximum length: {0} characters")]
    TooLong(usize),
}

/// Normalises a user prompt before a generation task is created.
pub struct PromptCleaner;

impl PromptCleaner {
    pub const MAX_CHARS: usize = 2000;

    /// Trims every line, drops blank lines and rejects empty or oversized prompts.
    /// Length is counted in characters, not bytes.
    pub fn clean(input: &str) -> Result<String, CleanerError> {
        let cleaned = input
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");

        if cleaned.is_empty() {
            return Err(CleanerError::EmptyInput);
        }

        let count = cleaned.chars().count();
        if count > Self::MAX_CHARS {
            return Err(CleanerError::TooLong(count));
        }

        Ok(cleaned)
    }
}
