use super::EditorCommands;
use regex::{NoExpand, Regex, RegexBuilder};
use std::ops::Range;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct BufferState {
    text: String,
    matches: Vec<Range<usize>>,
    current: Option<usize>,
    selection: Option<Range<usize>>,
}

/// In-memory editor text with search state and a selection.
///
/// Ranges are byte offsets on char boundaries.
#[derive(Debug, Default)]
pub struct TextBuffer {
    state: Mutex<BufferState>,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            state: Mutex::new(BufferState {
                text: text.into(),
                ..BufferState::default()
            }),
        }
    }

    pub fn text(&self) -> String {
        self.lock().text.clone()
    }

    /// Replaces the whole text and drops search results and selection.
    pub fn set_text(&self, text: impl Into<String>) {
        let mut state = self.lock();
        *state = BufferState {
            text: text.into(),
            ..BufferState::default()
        };
    }

    pub fn select(&self, range: Range<usize>) -> bool {
        let mut state = self.lock();
        if range.start > range.end || state.text.get(range.clone()).is_none() {
            return false;
        }
        state.selection = Some(range);
        true
    }

    pub fn selection(&self) -> Option<Range<usize>> {
        self.lock().selection.clone()
    }

    pub fn matches(&self) -> Vec<Range<usize>> {
        self.lock().matches.clone()
    }

    pub fn current_match(&self) -> Option<usize> {
        self.lock().current
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BufferState {
    fn clear_search(&mut self) {
        self.matches.clear();
        self.current = None;
        self.selection = None;
    }

    fn search(&mut self, query: &str) -> bool {
        let Some(re) = matcher(query) else {
            self.clear_search();
            return false;
        };
        self.matches = find_overlapping(&re, &self.text);
        if self.matches.is_empty() {
            self.clear_search();
            return false;
        }
        self.focus(0);
        true
    }

    fn step(&mut self, forward: bool) -> bool {
        let (Some(current), len) = (self.current, self.matches.len()) else {
            return false;
        };
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        self.focus(next);
        true
    }

    fn focus(&mut self, index: usize) {
        self.current = Some(index);
        self.selection = Some(self.matches[index].clone());
    }
}

fn matcher(query: &str) -> Option<Regex> {
    if query.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
        .ok()
}

/// Every match start, including matches overlapping the previous one.
fn find_overlapping(re: &Regex, text: &str) -> Vec<Range<usize>> {
    let mut found = Vec::new();
    let mut from = 0;
    while let Some(m) = re.find_at(text, from) {
        found.push(m.range());
        let step = text[m.start()..].chars().next().map_or(1, char::len_utf8);
        from = m.start() + step;
    }
    found
}

impl EditorCommands for TextBuffer {
    fn search(&self, query: &str) -> bool {
        self.lock().search(query)
    }

    fn next_match(&self) -> bool {
        self.lock().step(true)
    }

    fn previous_match(&self) -> bool {
        self.lock().step(false)
    }

    fn replace(&self, search: &str, replacement: &str) -> bool {
        let Some(re) = matcher(search) else {
            return false;
        };
        let mut state = self.lock();

        let selected = state
            .current
            .and_then(|i| state.matches.get(i).cloned())
            .filter(|range| {
                state
                    .text
                    .get(range.clone())
                    .and_then(|s| re.find(s))
                    .is_some_and(|m| m.range() == (0..range.len()))
            });
        let Some(range) = selected.or_else(|| re.find(&state.text).map(|m| m.range())) else {
            return false;
        };

        state.text.replace_range(range, replacement);
        state.search(search);
        true
    }

    fn replace_all(&self, search: &str, replacement: &str) -> bool {
        if search.trim().is_empty() {
            return false;
        }
        let Some(re) = matcher(search) else {
            return false;
        };
        let mut state = self.lock();
        let replaced = re.replace_all(&state.text, NoExpand(replacement)).into_owned();
        state.text = replaced;
        state.clear_search();
        true
    }

    fn copy(&self) -> Option<String> {
        let state = self.lock();
        let range = state.selection.clone()?;
        state
            .text
            .get(range)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    }
}
