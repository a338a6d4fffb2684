//! Typed endpoints over the gateway.
//!
//! Every method maps to one backend route. Authenticated calls resolve the user id
//! from the session; there is no default user.

pub mod backend;
pub mod types;

pub use backend::{CharacterStore, ImageGenerator, StoryStore};
pub use types::*;

use crate::gateway::{Gateway, GatewayError, RequestOptions};
use crate::session::{Session, SessionError, UserId};
use crate::sse::EventStream;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, instrument};

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Failed to encode request: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("{0} not found")]
    NotFound(&'static str),
}

impl ApiError {
    pub fn gateway(&self) -> Option<&GatewayError> {
        match self {
            ApiError::Gateway(e) => Some(e),
            _ => None,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Clone)]
pub struct Api {
    gateway: Gateway,
    image_size: String,
}

impl Api {
    pub fn new(gateway: Gateway) -> Self {
        Self {
            gateway,
            image_size: crate::config::RevealConfig::default().image_size,
        }
    }

    pub fn with_image_size(mut self, size: impl Into<String>) -> Self {
        self.image_size = size.into();
        self
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn session(&self) -> &Session {
        self.gateway.session()
    }

    pub fn current_user(&self) -> ApiResult<UserId> {
        Ok(self.session().user_id()?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        Ok(self.gateway.request_json(path, true, RequestOptions::get()).await?)
    }

    async fn send<T, B>(&self, options: RequestOptions, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let options = options.json(serde_json::to_value(body)?);
        Ok(self.gateway.request_json(path, true, options).await?)
    }

    async fn stream<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ApiResult<EventStream> {
        let options = RequestOptions::post().json(serde_json::to_value(body)?);
        Ok(self.gateway.request_stream(path, true, options).await?)
    }

    // Auth

    /// Signs in and stores the returned token and user in the session.
    #[instrument(skip(self, request), fields(account = %request.account))]
    pub async fn login(&self, request: &LoginRequest) -> ApiResult<AuthResponse> {
        let options = RequestOptions::post().json(serde_json::to_value(request)?);
        let response: AuthResponse = self.gateway.request_json("/auth/login", false, options).await?;
        match &response.access_token {
            Some(token) => {
                self.session().sign_in(token, response.user.as_ref())?;
                info!("Signed in");
            }
            None => debug!("Login response carried no token"),
        }
        Ok(response)
    }

    pub async fn register(&self, request: &RegisterRequest) -> ApiResult<Value> {
        let options = RequestOptions::post().json(serde_json::to_value(request)?);
        Ok(self.gateway.request_json("/auth/register", false, options).await?)
    }

    /// Clears local session state whether or not the backend call succeeds.
    pub async fn logout(&self) -> ApiResult<()> {
        let result = self
            .gateway
            .request("/auth/logout", true, RequestOptions::post())
            .await;
        self.session().sign_out();
        result.map(|_| ()).map_err(ApiError::from)
    }

    pub async fn username_available(&self, username: &str) -> ApiResult<bool> {
        let path = format!("/auth/check_username_available/{}", urlencoding::encode(username));
        let value: Value = self.gateway.request_json(&path, false, RequestOptions::post()).await?;
        Ok(value["success"].as_bool().unwrap_or(false))
    }

    pub async fn email_available(&self, email: &str) -> ApiResult<bool> {
        let path = format!("/auth/check_email_available/{}", urlencoding::encode(email));
        let value: Value = self.gateway.request_json(&path, false, RequestOptions::post()).await?;
        Ok(value["success"].as_bool().unwrap_or(false))
    }

    // Tasks

    #[instrument(skip(self, prompt))]
    pub async fn create_task(&self, prompt: &str, task_type: TaskType) -> ApiResult<SimpleTask> {
        let request = CreateTaskRequest {
            prompt: prompt.to_string(),
            user_id: self.current_user()?,
            task_type,
            is_continue: false,
        };
        self.send(RequestOptions::post(), "/task/new", &request).await
    }

    /// Starts a crazy-walk task. The backend requires a prompt, so one is built
    /// from the category and seeds.
    #[instrument(skip(self, options), fields(chapters = options.chapter_count))]
    pub async fn create_crazy_walk(&self, options: &CrazyWalkOptions) -> ApiResult<SimpleTask> {
        let request = CreateCrazyWalkRequest {
            options: options.clone(),
            prompt: options.prompt(),
            user_id: self.current_user()?,
            task_type: TaskType::CrazyWalk,
        };
        self.send(RequestOptions::post(), "/task/new", &request).await
    }

    /// Book produced by crazy-walk task `task_id`.
    pub async fn crazy_result(&self, task_id: &Id) -> ApiResult<CrazyWalkBook> {
        let book: Option<CrazyWalkBook> = self.get(&format!("/crazy/{task_id}")).await?;
        book.map(CrazyWalkBook::sorted).ok_or(ApiError::NotFound("crazy walk"))
    }

    pub async fn task_status(&self, task_id: &Id) -> ApiResult<TaskStatus> {
        self.get(&format!("/task/status/{task_id}")).await
    }

    pub async fn tasks_by_type(&self, task_type: TaskType) -> ApiResult<Vec<TaskStatus>> {
        let kind = serde_json::to_value(task_type)?;
        let path = format!(
            "/task/get-by-type?task_type={}&user_id={}",
            kind.as_str().unwrap_or_default(),
            self.current_user()?
        );
        self.get(&path).await
    }

    // Stories

    pub async fn story(&self, story_id: &Id) -> ApiResult<StoryDetail> {
        let story: Option<StoryDetail> = self.get(&format!("/spirate/getOne/{story_id}")).await?;
        story.ok_or(ApiError::NotFound("story"))
    }

    #[instrument(skip(self, choice))]
    pub async fn continue_from_choice(&self, story_id: &Id, choice: &str) -> ApiResult<Continuation> {
        let path = format!("/spirate/continue/{story_id}");
        self.send(RequestOptions::post(), &path, &json!({ "choice": choice })).await
    }

    pub async fn update_story(&self, story_id: &Id, content: &str, choices: &[String]) -> ApiResult<Value> {
        let update = StoryUpdate {
            id: story_id,
            content,
            story_direction: choices,
        };
        self.send(RequestOptions::put(), "/spirate/update", &update).await
    }

    // AI

    pub async fn generate_image(&self, prompt: &str) -> ApiResult<ImageResponse> {
        let user_id = self.current_user()?;
        let body = json!({ "prompt": prompt, "user_id": user_id, "size": self.image_size });
        self.send(RequestOptions::post(), "/ai/generate_images", &body).await
    }

    pub async fn generate_portrait(&self, story_id: &Id, character: &Character) -> ApiResult<ImageResponse> {
        let user_id = self.current_user()?;
        let body = json!({
            "prompt": character.description,
            "name": character.name,
            "spirate_id": story_id,
            "user_id": user_id,
        });
        self.send(RequestOptions::post(), "/ai/generate_image_from_spirate", &body).await
    }

    /// Streaming expand / polish / rewrite of `content` within `context`.
    pub async fn assist(&self, mode: AssistMode, context: &str, content: &str) -> ApiResult<EventStream> {
        let body = json!({ "context": context, "content": content, "is_stream": true });
        self.stream(mode.path(), &body).await
    }

    // Chat

    pub async fn chat_sessions(&self) -> ApiResult<Vec<ChatSessionInfo>> {
        self.get(&format!("/chat/sessions/{}", self.current_user()?)).await
    }

    pub async fn chat_history(&self, session_id: &Id) -> ApiResult<Vec<ChatMessage>> {
        self.get(&format!("/chat/history/{session_id}")).await
    }

    pub async fn clear_chat(&self, session_id: &Id) -> ApiResult<Value> {
        let path = format!("/chat/session/{session_id}/clear");
        Ok(self.gateway.request_json(&path, true, RequestOptions::post()).await?)
    }

    pub async fn open_chat(&self, character_id: &Id) -> ApiResult<ChatSessionInfo> {
        let user_id = self.current_user()?;
        let body = json!({ "user_id": user_id, "character_id": character_id });
        self.send(RequestOptions::post(), "/chat/session", &body).await
    }

    pub async fn send_chat_message(&self, session_id: &Id, content: &str) -> ApiResult<EventStream> {
        let path = format!("/chat/session/{session_id}/message");
        self.stream(&path, &json!({ "content": content })).await
    }

    // Characters

    pub async fn put_character(&self, character: &Character) -> ApiResult<Value> {
        let path = format!("/character/{}", character.id);
        self.send(RequestOptions::put(), &path, character).await
    }

    pub async fn characters(&self) -> ApiResult<Vec<Character>> {
        self.get(&format!("/character/{}", self.current_user()?)).await
    }

    // Payments

    #[instrument(skip(self))]
    pub async fn create_order(&self, amount: &str) -> ApiResult<PaymentOrder> {
        let body = json!({ "amount": amount, "description": "订阅会员服务" });
        self.send(RequestOptions::post(), "/alipay/create", &body).await
    }

    pub async fn check_order(&self, order_info: &str) -> ApiResult<PaymentStatus> {
        self.send(RequestOptions::post(), "/alipay/check", &json!({ "order_info": order_info }))
            .await
    }

    pub async fn update_vip(&self, upgrade: &VipUpgrade) -> ApiResult<Value> {
        self.send(RequestOptions::post(), "/users/update_vip", upgrade).await
    }
}

#[cfg(test)]
mod tests;
