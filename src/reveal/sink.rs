use super::lines::DisplayLine;
use crate::api::Id;

/// Observer for reveal progress. Every method defaults to a no-op.
///
/// Callbacks run while the display state is locked, so they see updates in order;
/// they must not call back into the pipeline.
pub trait RevealSink: Send + Sync {
    fn lines_changed(&self, _lines: &[DisplayLine]) {}

    fn scroll_to_bottom(&self) {}

    /// The choice currently being typed; empty once it has been appended.
    fn choice_typing(&self, _partial: &str) {}

    fn choices_changed(&self, _choices: &[String]) {}

    /// Illustration request started (`true`) or settled (`false`) for a paragraph.
    fn image_loading(&self, _paragraph: usize, _loading: bool) {}

    fn portrait_changed(&self, _character: &Id, _url: &str) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl RevealSink for NullSink {}
