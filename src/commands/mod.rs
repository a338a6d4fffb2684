//! Page actions: each flow strings API calls, polling and the reveal pipeline
//! together and leaves user-facing failures as a `Notice` in the error chain.

use crate::api::{
    Api, ApiError, Character, CrazyWalkBook, CrazyWalkOptions, Id, PaymentStatus, StoryDetail, TaskStatus, TaskType,
    VipUpgrade,
};
use crate::chat::{ChatError, ChatObserver, ChatSession};
use crate::config::{ClientConfig, PollConfig};
use crate::gateway::{Gateway, GatewayError, HttpTransport, LogNavigator, Navigator, TransportError};
use crate::moderation::{CleanerError, Notice, PromptCleaner, SensitiveFilter};
use crate::poll::{poll_payment, poll_task, poll_task_with_progress, PollOutcome, Poller};
use crate::reveal::{PortraitQueue, PortraitReport, RevealMode, RevealOutcome, RevealPipeline, RevealSink};
use crate::session::{Session, SessionError};
use anyhow::Context;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Shared client state handed to every flow.
pub struct AppState {
    pub config: ClientConfig,
    pub api: Api,
    pub filter: SensitiveFilter,
}

impl AppState {
    /// Production wiring: reqwest transport, redirects logged.
    pub fn new(config: ClientConfig, session: Session) -> anyhow::Result<Self> {
        let gateway = Gateway::from_config(&config.gateway, session).context("Invalid gateway configuration")?;
        Ok(Self::with_api(config, Api::new(gateway)))
    }

    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn HttpTransport>,
        session: Session,
        navigator: Option<Arc<dyn Navigator>>,
    ) -> Self {
        let navigator = navigator.unwrap_or_else(|| Arc::new(LogNavigator));
        let gateway = Gateway::new(&config.gateway, transport, session, navigator);
        Self::with_api(config, Api::new(gateway))
    }

    pub fn with_api(config: ClientConfig, api: Api) -> Self {
        let api = api.with_image_size(config.reveal.image_size.clone());
        Self {
            config,
            api,
            filter: SensitiveFilter::default(),
        }
    }

    pub fn with_filter(mut self, filter: SensitiveFilter) -> Self {
        self.filter = filter;
        self
    }
}

/// What to tell the user about a failed flow.
pub fn notice_of(err: &anyhow::Error) -> Notice {
    for cause in err.chain() {
        if let Some(notice) = cause.downcast_ref::<Notice>() {
            return notice.clone();
        }
        if let Some(api) = cause.downcast_ref::<ApiError>() {
            return match api {
                ApiError::Gateway(e) => Notice::from(e),
                ApiError::Session(_) => Notice::SessionExpired,
                ApiError::Encode(_) | ApiError::NotFound(_) => Notice::Failure(None),
            };
        }
        if let Some(e) = cause.downcast_ref::<GatewayError>() {
            return Notice::from(e);
        }
        if cause.downcast_ref::<SessionError>().is_some() {
            return Notice::SessionExpired;
        }
        if let Some(e) = cause.downcast_ref::<CleanerError>() {
            return Notice::from(e.clone());
        }
        if let Some(ChatError::Stream(e)) = cause.downcast_ref::<ChatError>() {
            return match e {
                TransportError::Timeout | TransportError::Connect(_) => Notice::Network,
                TransportError::Other(_) => Notice::Failure(None),
            };
        }
    }
    Notice::Failure(None)
}

/// Creates an inspiration task for `prompt` and waits for the generated story.
///
/// Returns the story id, or `None` when `cancel` fired first.
#[instrument(skip(state, prompt, cancel))]
pub async fn start_inspiration(
    state: &AppState,
    prompt: &str,
    cancel: CancellationToken,
) -> anyhow::Result<Option<Id>> {
    let prompt = PromptCleaner::clean(prompt)?;
    if let Some(notice) = Notice::from_filter(&state.filter, &prompt) {
        info!("Prompt rejected by the local word list");
        return Err(notice.into());
    }

    let task = state
        .api
        .create_task(&prompt, TaskType::Inspiration)
        .await
        .context("Failed to create inspiration task")?;
    info!(task = %task.task_id, "Inspiration task created");

    let poller = Poller::new(state.config.poll.clone()).with_cancellation(cancel);
    let outcome = poll_task(&state.api, &poller, &task.task_id)
        .await
        .context("Failed to poll task status")?;

    let Some(status) = settled_task(&task.task_id, outcome)? else {
        return Ok(None);
    };
    status
        .result_id
        .map(Some)
        .ok_or_else(|| anyhow::anyhow!("Task {} completed without a result", task.task_id))
}

/// Starts a crazy-walk run and waits for the finished book, reporting each
/// `completion_percentage` the backend sends.
///
/// Returns `None` when `cancel` fired first.
#[instrument(skip(state, options, on_progress, cancel), fields(chapters = options.chapter_count))]
pub async fn start_crazy_walk<P>(
    state: &AppState,
    options: &CrazyWalkOptions,
    on_progress: P,
    cancel: CancellationToken,
) -> anyhow::Result<Option<CrazyWalkBook>>
where
    P: Fn(f64),
{
    if options.chapter_count == 0 {
        return Err(Notice::Failure(Some("请选择章节数".to_string())).into());
    }
    let prompt = PromptCleaner::clean(&options.prompt())?;
    if let Some(notice) = Notice::from_filter(&state.filter, &prompt) {
        info!("Crazy-walk seeds rejected by the local word list");
        return Err(notice.into());
    }

    let task = state
        .api
        .create_crazy_walk(options)
        .await
        .context("Failed to create crazy-walk task")?;
    info!(task = %task.task_id, "Crazy-walk task created");

    let poller = Poller::new(state.config.poll.clone()).with_cancellation(cancel);
    let outcome = poll_task_with_progress(&state.api, &poller, &task.task_id, |status| {
        if let Some(progress) = status.completion_percentage {
            on_progress(progress);
        }
    })
    .await
    .context("Failed to poll task status")?;

    if settled_task(&task.task_id, outcome)?.is_none() {
        return Ok(None);
    }
    let book = state
        .api
        .crazy_result(&task.task_id)
        .await
        .context("Failed to load crazy-walk result")?;
    info!(chapters = book.chapters.len(), "Crazy-walk book loaded");
    Ok(Some(book))
}

/// Completed status of a polled task, `None` when cancelled. Failed and
/// unfinished tasks become notices.
fn settled_task(task_id: &Id, outcome: PollOutcome<TaskStatus>) -> anyhow::Result<Option<TaskStatus>> {
    match outcome {
        PollOutcome::Completed(status) if status.is_failed() => {
            Err(Notice::Failure(Some("生成失败，请稍后重试".to_string())).into())
        }
        PollOutcome::Completed(status) => Ok(Some(status)),
        PollOutcome::Exhausted { attempts } => {
            warn!(task = %task_id, attempts, "Task still running after the last poll");
            Err(Notice::RetryLater("生成".to_string()).into())
        }
        PollOutcome::Cancelled => Ok(None),
    }
}

/// An opened story: the running pipeline, the portrait cache and how both ended.
pub struct StoryView {
    pub detail: StoryDetail,
    pub pipeline: Arc<RevealPipeline>,
    pub characters: Arc<Mutex<Vec<Character>>>,
    pub reveal: RevealOutcome,
    pub portraits: PortraitReport,
}

/// Loads a story, reveals it and fills in missing character portraits.
///
/// Freshly generated stories use `RevealMode::Typewriter`; revisits use
/// `RevealMode::Immediate`.
#[instrument(skip(state, story_id, sink, cancel), fields(story = %story_id))]
pub async fn open_story(
    state: &AppState,
    story_id: &Id,
    mode: RevealMode,
    sink: Arc<dyn RevealSink>,
    cancel: CancellationToken,
) -> anyhow::Result<StoryView> {
    let detail = state.api.story(story_id).await.context("Failed to load story")?;
    let backend = Arc::new(state.api.clone());

    let pipeline = Arc::new(
        RevealPipeline::new(
            story_id.clone(),
            state.config.reveal.clone(),
            backend.clone(),
            backend.clone(),
            Arc::clone(&sink),
        )
        .with_cancellation(cancel.clone()),
    );
    let characters = Arc::new(Mutex::new(detail.characters.clone()));
    let queue = PortraitQueue::new(
        story_id.clone(),
        backend.clone(),
        backend,
        sink,
        Arc::clone(&characters),
        Duration::from_millis(state.config.reveal.image_cooldown_ms),
    )
    .with_cancellation(cancel);

    let (reveal, portraits) = tokio::join!(
        pipeline.reveal(&detail.content, &detail.story_direction, mode),
        queue.run()
    );
    info!(?reveal, generated = portraits.generated, placeholders = portraits.placeholders, "Story opened");

    Ok(StoryView {
        detail,
        pipeline,
        characters,
        reveal,
        portraits,
    })
}

/// Continues an opened story from `choice`.
pub async fn choose_branch(view: &StoryView, choice: &str) -> anyhow::Result<RevealOutcome> {
    view.pipeline
        .choose_branch(choice)
        .await
        .with_context(|| format!("Failed to continue story from {choice:?}"))
}

/// Resumes the character's existing chat session or opens a new one with a greeting.
#[instrument(skip(state, character, observer), fields(character = %character.id))]
pub async fn open_chat(
    state: &AppState,
    character: &Character,
    observer: Arc<dyn ChatObserver>,
) -> anyhow::Result<ChatSession> {
    let sessions = state.api.chat_sessions().await.context("Failed to list chat sessions")?;
    let existing = sessions
        .into_iter()
        .find(|s| s.character_id.as_ref() == Some(&character.id));

    let chat = match existing {
        Some(session) => {
            let history = state
                .api
                .chat_history(&session.id)
                .await
                .context("Failed to load chat history")?;
            ChatSession::new(session.id, &character.name).with_history(history)
        }
        None => {
            let session = state
                .api
                .open_chat(&character.id)
                .await
                .context("Failed to open chat session")?;
            ChatSession::new(session.id, &character.name).with_greeting()
        }
    };
    Ok(chat.with_observer(observer))
}

/// Sends `text` and streams the reply into `chat`.
///
/// The user message stays in the transcript when the request or the stream fails.
pub async fn send_chat_message(state: &AppState, chat: &mut ChatSession, text: &str) -> anyhow::Result<()> {
    chat.push_user(text)?;
    let reply = state
        .api
        .send_chat_message(chat.session_id(), text)
        .await
        .context("Failed to send chat message")?;
    chat.receive(reply).await?;
    Ok(())
}

/// A VIP plan as offered on the pricing page.
#[derive(Debug, Clone)]
pub struct VipPlan {
    pub amount: String,
    pub subscription_type: String,
    pub duration_months: u32,
}

/// Creates an order, hands its payment link to `open_link`, waits for payment and
/// upgrades the account.
///
/// Returns `None` when `cancel` fired before the order was paid.
#[instrument(skip(state, plan, open_link, cancel), fields(amount = %plan.amount))]
pub async fn checkout<F>(
    state: &AppState,
    plan: &VipPlan,
    open_link: F,
    cancel: CancellationToken,
) -> anyhow::Result<Option<PaymentStatus>>
where
    F: FnOnce(&str) + Send,
{
    let order = state
        .api
        .create_order(&plan.amount)
        .await
        .context("Failed to create payment order")?;
    open_link(&order.link);

    let poller = Poller::new(PollConfig::payment()).with_cancellation(cancel);
    let outcome = poll_payment(&state.api, &poller, &order.order_info)
        .await
        .context("Failed to check payment")?;

    match outcome {
        PollOutcome::Completed(status) => {
            let upgrade = VipUpgrade {
                subscription_type: plan.subscription_type.clone(),
                duration_months: plan.duration_months,
            };
            state
                .api
                .update_vip(&upgrade)
                .await
                .context("Payment received but the VIP upgrade failed")?;
            info!(order = %order.order_info, "VIP upgraded");
            Ok(Some(status))
        }
        PollOutcome::Exhausted { attempts } => {
            warn!(order = %order.order_info, attempts, "Payment not confirmed in time");
            Err(Notice::RetryLater("支付".to_string()).into())
        }
        PollOutcome::Cancelled => Ok(None),
    }
}
