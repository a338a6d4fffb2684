//! Stored story text and the lines rendered from it.
//!
//! A story is stored as paragraphs joined by a blank line. A paragraph is plain
//! text, a bare image URL, or a branch-choice annotation carrying the
//! `_CHOICE_ ` prefix. The display state keeps one slot per paragraph plus an
//! optional illustration attached to it, so splicing an image after paragraph
//! *k* cannot move any other paragraph.

use serde::Serialize;

pub const PARAGRAPH_DELIMITER: &str = "\n\n";
pub const CHOICE_MARKER: &str = "_CHOICE_";
pub const CHOICE_PHRASE: &str = "您已选择了：";
pub const ILLUSTRATION_MARKER: &str = "【插图】";

const IMAGE_EXTENSIONS: [&str; 4] = [".jpg", ".jpeg", ".png", ".gif"];

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct DisplayLine {
    pub index: usize,
    pub text: String,
    pub is_image_placeholder: bool,
    pub is_choice: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParagraphKind {
    Text,
    Image,
    /// Text that asks for an illustration once revealed.
    Illustrated,
    Choice,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paragraph {
    pub kind: ParagraphKind,
    /// Display text: markers removed.
    pub text: String,
    /// Illustration marker still in place; used when nothing will be generated.
    pub stored: String,
}

pub fn is_image_url(text: &str) -> bool {
    text.starts_with("http") && IMAGE_EXTENSIONS.iter().any(|ext| text.contains(ext))
}

impl Paragraph {
    fn new(kind: ParagraphKind, text: String) -> Self {
        Self {
            kind,
            stored: text.clone(),
            text,
        }
    }

    pub fn parse(raw: &str) -> Self {
        if let Some(rest) = raw.strip_prefix(CHOICE_MARKER) {
            return Self::new(ParagraphKind::Choice, rest.strip_prefix(' ').unwrap_or(rest).to_string());
        }
        if raw.contains(CHOICE_PHRASE) {
            return Self::new(ParagraphKind::Choice, raw.to_string());
        }
        if is_image_url(raw) {
            return Self::new(ParagraphKind::Image, raw.to_string());
        }
        if raw.contains(ILLUSTRATION_MARKER) {
            return Self {
                kind: ParagraphKind::Illustrated,
                text: raw.replacen(ILLUSTRATION_MARKER, "", 1),
                stored: raw.to_string(),
            };
        }
        Self::new(ParagraphKind::Text, raw.to_string())
    }

    pub fn choice_annotation(choice: &str) -> Self {
        Self::new(ParagraphKind::Choice, format!("{CHOICE_PHRASE}{choice}"))
    }
}

pub fn split_paragraphs(content: &str) -> Vec<Paragraph> {
    if content.is_empty() {
        return Vec::new();
    }
    content.split(PARAGRAPH_DELIMITER).map(Paragraph::parse).collect()
}

#[derive(Debug, Clone, Default)]
pub(crate) struct Slot {
    pub text: String,
    pub is_image: bool,
    pub is_choice: bool,
    pub image: Option<String>,
}

impl Slot {
    pub fn empty_for(kind: ParagraphKind) -> Self {
        Self {
            is_image: kind == ParagraphKind::Image,
            is_choice: kind == ParagraphKind::Choice,
            ..Self::default()
        }
    }

    /// Slot shown as stored, without any reveal side effects.
    pub fn stored(paragraph: &Paragraph) -> Self {
        Self {
            text: paragraph.stored.clone(),
            ..Self::empty_for(paragraph.kind)
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct RevealState {
    pub slots: Vec<Slot>,
    pub choices: Vec<String>,
}

impl RevealState {
    pub fn lines(&self) -> Vec<DisplayLine> {
        let mut lines = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            lines.push(DisplayLine {
                index: lines.len(),
                text: slot.text.clone(),
                is_image_placeholder: slot.is_image,
                is_choice: slot.is_choice,
            });
            if let Some(url) = &slot.image {
                lines.push(DisplayLine {
                    index: lines.len(),
                    text: url.clone(),
                    is_image_placeholder: true,
                    is_choice: false,
                });
            }
        }
        lines
    }

    /// Stored form of the current lines.
    pub fn serialize(&self) -> String {
        self.lines()
            .iter()
            .map(|line| {
                if line.is_choice {
                    format!("{CHOICE_MARKER} {}", line.text)
                } else {
                    line.text.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(PARAGRAPH_DELIMITER)
    }
}
