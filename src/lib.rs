//! Client core for an AI-assisted novel-writing service.
//!
//! Every backend call goes through [`gateway::Gateway`]; streaming replies come back
//! as [`sse::EventStream`]s; generated stories are shown through the
//! [`reveal::RevealPipeline`]; chat replies accumulate in a [`chat::ChatSession`].

pub mod api;
pub mod chat;
pub mod commands;
pub mod config;
pub mod editor;
pub mod gateway;
pub mod moderation;
pub mod poll;
pub mod reveal;
pub mod session;
pub mod sse;
pub mod telemetry;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{Api, ApiError, Id};
pub use commands::{notice_of, AppState};
pub use config::ClientConfig;
pub use gateway::{Gateway, GatewayError, RequestOptions};
pub use moderation::Notice;
pub use reveal::{RevealMode, RevealOutcome, RevealPipeline, RevealSink};
pub use session::Session;
pub use telemetry::init_tracing;
