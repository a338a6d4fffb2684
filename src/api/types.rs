//! Request and response models for the backend API.
//!
//! The backend uses integer ids while some responses echo them back as strings, so
//! ids deserialize from either form and serialize as numbers whenever they are numeric.

use crate::gateway::error::null_as_default;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Id(String);

impl Id {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Id {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<u64> for Id {
    fn from(raw: u64) -> Self {
        Self::new(raw.to_string())
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0.parse::<i64>() {
            Ok(n) => serializer.serialize_i64(n),
            Err(_) => serializer.serialize_str(&self.0),
        }
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl<'de> Visitor<'de> for IdVisitor {
            type Value = Id;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or integer id")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
                Ok(Id::new(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Id, E> {
                Ok(Id::new(v.to_string()))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Id, E> {
                Ok(Id::new(v.to_string()))
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

// Auth

#[derive(Serialize, Debug, Clone)]
pub struct LoginRequest {
    pub account: String,
    pub password: String,
}

#[derive(Serialize, Debug, Clone)]
pub struct RegisterRequest {
    pub account: String,
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct User {
    pub id: Id,
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct AuthResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub user: Option<Value>,
}

// Tasks

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskType {
    Inspiration,
    CrazyWalk,
}

#[derive(Serialize, Debug, Clone)]
pub struct CreateTaskRequest {
    pub prompt: String,
    pub user_id: crate::session::UserId,
    pub task_type: TaskType,
    pub is_continue: bool,
}

/// Options for a crazy-walk run: a whole book generated from a few seeds.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct CrazyWalkOptions {
    /// Target readership, `"male"` or `"female"`.
    #[serde(rename = "type")]
    pub audience: String,
    pub category: String,
    pub seeds: Vec<String>,
    pub chapter_count: u32,
}

impl CrazyWalkOptions {
    /// Category followed by the seeds, e.g. `玄幻、天才少年、逆袭`.
    pub fn prompt(&self) -> String {
        std::iter::once(self.category.trim())
            .chain(self.seeds.iter().map(|s| s.trim()))
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join("、")
    }
}

#[derive(Serialize, Debug, Clone)]
pub struct CreateCrazyWalkRequest {
    #[serde(flatten)]
    pub options: CrazyWalkOptions,
    pub prompt: String,
    pub user_id: crate::session::UserId,
    pub task_type: TaskType,
}

#[derive(Deserialize, Debug, Clone)]
pub struct SimpleTask {
    #[serde(alias = "id")]
    pub task_id: Id,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct TaskStatus {
    #[serde(default, alias = "task_id")]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default)]
    pub completion_percentage: Option<f64>,
    #[serde(default)]
    pub result_id: Option<Id>,
    #[serde(default)]
    pub result_type: Option<String>,
    #[serde(default)]
    pub task_type: Option<String>,
}

impl TaskStatus {
    pub const COMPLETED: &'static str = "completed";
    pub const FAILED: &'static str = "failed";

    pub fn is_completed(&self) -> bool {
        self.status.eq_ignore_ascii_case(Self::COMPLETED)
    }

    pub fn is_failed(&self) -> bool {
        self.status.eq_ignore_ascii_case(Self::FAILED)
    }
}

// Stories

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Character {
    pub id: Id,
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Remaining backend fields, sent back untouched on update.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Character {
    pub fn needs_portrait(&self) -> bool {
        self.image_url.as_deref().map_or(true, |url| url.trim().is_empty())
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct StoryDetail {
    pub id: Id,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub story_direction: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub characters: Vec<Character>,
    #[serde(default)]
    pub cover_image: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct GeneratedChapter {
    #[serde(default)]
    pub id: Option<Id>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub order: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub summary: String,
}

/// Result of a finished crazy-walk task, read by task id.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct CrazyWalkBook {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chapters: Vec<GeneratedChapter>,
}

impl CrazyWalkBook {
    /// Chapters in reading order.
    pub fn sorted(mut self) -> Self {
        self.chapters.sort_by_key(|c| c.order);
        self
    }
}

#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Continuation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub story_direction: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub characters: Vec<Character>,
}

#[derive(Serialize, Debug, Clone)]
pub struct StoryUpdate<'a> {
    pub id: &'a Id,
    pub content: &'a str,
    pub story_direction: &'a [String],
}

// AI

#[derive(Deserialize, Debug, Clone)]
pub struct ImageResponse {
    pub image: String,
}

/// Streaming writing-assist modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssistMode {
    Expand,
    Polish,
    Rewrite,
}

impl AssistMode {
    pub fn path(&self) -> &'static str {
        match self {
            AssistMode::Expand => "/ai/expand",
            AssistMode::Polish => "/ai/polish",
            AssistMode::Rewrite => "/ai/rewrite",
        }
    }
}

// Chat

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    User,
    Character,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: Id,
    #[serde(default)]
    pub sender: String,
    pub sender_type: SenderType,
    #[serde(default, deserialize_with = "null_as_default")]
    pub content: String,
    /// Backend timestamps are naive ISO strings; kept verbatim.
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct ChatSessionInfo {
    pub id: Id,
    #[serde(default)]
    pub character_id: Option<Id>,
    #[serde(default)]
    pub title: Option<String>,
}

// Payments

#[derive(Deserialize, Debug, Clone)]
pub struct PaymentOrder {
    pub link: String,
    #[serde(default)]
    pub amount: Option<Value>,
    #[serde(default)]
    pub description: Option<String>,
    pub order_info: String,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct PaymentStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub paid: bool,
}

#[derive(Serialize, Debug, Clone)]
pub struct VipUpgrade {
    pub subscription_type: String,
    pub duration_months: u32,
}
