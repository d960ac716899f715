//! Turn orchestration behind the chat front end.
//!
//! [`ChatController`] owns the visible conversation and drives one turn at a
//! time: stage the attachment, stream the reply, refresh the memory anchor,
//! persist the session and refresh the listing.

use std::sync::Arc;

use futures::StreamExt;

use super::{
    ai::{
        anchor::MemoryAnchorDistiller, completion::ModelBackend,
        orchestrator::ChatStreamOrchestrator, title::TitleGenerator,
    },
    session::{
        AppSettings, ChatSession, Message, SessionId, SessionIndexEntry, SessionStore,
        state::{generate_session_id, now_millis},
    },
};
use crate::utils::{
    storage::{
        StorageContext, StorageError, StorageMode,
        auth::{CloudAuth, CloudUser},
    },
    upload::{AttachmentUploader, LocalFile},
};

/// Shown in the conversation when the model call fails.
pub const MODEL_FAILURE_MESSAGE: &str = "Error: Failed to generate response.";

/// How a turn ended. Either way the session was saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { session_id: SessionId },
    Failed { session_id: SessionId, error: String },
}

impl TurnOutcome {
    pub fn session_id(&self) -> &str {
        match self {
            TurnOutcome::Completed { session_id } | TurnOutcome::Failed { session_id, .. } => {
                session_id
            }
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, TurnOutcome::Completed { .. })
    }
}

pub struct ChatController {
    context: StorageContext,
    store: SessionStore,
    orchestrator: ChatStreamOrchestrator,
    distiller: MemoryAnchorDistiller,
    titles: TitleGenerator,
    uploader: Option<AttachmentUploader>,
    auth: Option<Arc<dyn CloudAuth>>,

    current_session_id: Option<SessionId>,
    messages: Vec<Message>,
    memory_anchor: Option<String>,
    title: Option<String>,
    sessions: Vec<SessionIndexEntry>,
    settings: AppSettings,
}

impl ChatController {
    pub fn new(context: StorageContext, model: Arc<dyn ModelBackend>) -> Self {
        Self {
            store: SessionStore::new(&context),
            context,
            orchestrator: ChatStreamOrchestrator::new(Arc::clone(&model)),
            distiller: MemoryAnchorDistiller::new(Arc::clone(&model)),
            titles: TitleGenerator::new(model),
            uploader: None,
            auth: None,
            current_session_id: None,
            messages: Vec::new(),
            memory_anchor: None,
            title: None,
            sessions: Vec::new(),
            settings: AppSettings::default(),
        }
    }

    /// Stage attachments through `uploader`. Without one, files are dropped.
    pub fn with_uploader(mut self, uploader: AttachmentUploader) -> Self {
        self.uploader = Some(uploader);
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn CloudAuth>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_distiller(mut self, distiller: MemoryAnchorDistiller) -> Self {
        self.distiller = distiller;
        self
    }

    /// Prepare storage, then load the listing and the settings.
    pub async fn initialize(&mut self) -> Result<(), StorageError> {
        self.context.initialize().await?;
        self.refresh_sessions().await;
        self.settings = match self.store.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!(error = %e, "cannot load settings, using defaults");
                AppSettings::default()
            }
        };
        Ok(())
    }

    pub fn mode(&self) -> StorageMode {
        self.context.mode()
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn sessions(&self) -> &[SessionIndexEntry] {
        &self.sessions
    }

    /// Reload the listing. A failure is logged and leaves it empty.
    pub async fn refresh_sessions(&mut self) -> &[SessionIndexEntry] {
        self.sessions = match self.store.list().await {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::warn!(error = %e, "cannot list sessions");
                Vec::new()
            }
        };
        &self.sessions
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current_session_id.as_deref()
    }

    pub fn memory_anchor(&self) -> Option<&str> {
        self.memory_anchor.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Make `id` the open session. Returns `false`, leaving state alone,
    /// when there is no such session.
    pub async fn open_session(&mut self, id: &str) -> Result<bool, StorageError> {
        let Some(session) = self.store.load_session(id).await? else {
            return Ok(false);
        };
        self.current_session_id = Some(session.id);
        self.title = Some(session.title);
        self.messages = session.messages;
        self.memory_anchor = session.memory_anchor;
        Ok(true)
    }

    pub fn new_chat(&mut self) {
        self.current_session_id = None;
        self.messages.clear();
        self.memory_anchor = None;
        self.title = None;
    }

    pub async fn delete_session(&mut self, id: &str) -> Result<(), StorageError> {
        self.store.delete_session(id).await?;
        self.refresh_sessions().await;
        if self.current_session_id.as_deref() == Some(id) {
            self.new_chat();
        }
        Ok(())
    }

    /// Apply `settings` now and persist them. A write failure is logged and
    /// returned; the new settings stay in effect for this run.
    pub async fn save_settings(&mut self, settings: AppSettings) -> Result<(), StorageError> {
        self.settings = settings;
        self.store
            .save_settings(&self.settings)
            .await
            .inspect_err(|e| tracing::warn!(error = %e, "cannot save settings"))
    }

    /// The signed-in cloud user, if there is one.
    pub async fn user_info(&self) -> Option<CloudUser> {
        let auth = self.auth.as_ref()?;
        if !auth.is_signed_in() {
            return None;
        }
        auth.get_user()
            .await
            .inspect_err(|e| tracing::debug!(error = %e, "cannot fetch cloud user"))
            .ok()
    }

    /// Run one turn.
    ///
    /// `observer` sees the assistant message after every fragment, and the
    /// error message if the model fails. Returns `Err` only when the session
    /// could not be saved.
    pub async fn send<F>(
        &mut self,
        content: &str,
        file: Option<&LocalFile>,
        mut observer: F,
    ) -> Result<TurnOutcome, StorageError>
    where
        F: FnMut(&Message),
    {
        let mut attachments = Vec::new();
        if let Some(file) = file {
            match &self.uploader {
                Some(uploader) => attachments.extend(uploader.upload(file).await),
                None => tracing::warn!(name = %file.name, "no cloud store for attachments, sending without it"),
            }
        }

        let user_message = Message::user(content).with_attachments(attachments);
        self.messages.push(user_message.clone());

        let session_id = match &self.current_session_id {
            Some(id) => id.clone(),
            None => {
                let id = generate_session_id();
                self.title = Some(self.titles.generate_title(content).await);
                self.current_session_id = Some(id.clone());
                tracing::debug!(session_id = %id, "started new session");
                id
            }
        };
        let title = self.current_title(&session_id);

        let history = self.messages.clone();
        self.messages.push(Message::assistant(""));
        let assistant_index = self.messages.len() - 1;
        observer(&self.messages[assistant_index]);

        let mut stream = self.orchestrator.stream(
            &history,
            &self.settings.default_model,
            &self.settings.system_prompt,
            self.memory_anchor.as_deref(),
        );
        let mut failure = None;
        while let Some(fragment) = stream.next().await {
            match fragment {
                Ok(text) => {
                    let assistant = &mut self.messages[assistant_index];
                    assistant.content.push_str(&text);
                    observer(&*assistant);
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        drop(stream);

        let outcome = match failure {
            None => {
                let assistant = self.messages[assistant_index].clone();
                let anchor = self
                    .distiller
                    .update_anchor(self.memory_anchor.as_deref(), &[user_message, assistant])
                    .await;
                self.memory_anchor = (!anchor.is_empty()).then_some(anchor);
                TurnOutcome::Completed {
                    session_id: session_id.clone(),
                }
            }
            Some(e) => {
                tracing::error!(session_id = %session_id, error = %e, "model call failed");
                if self.messages[assistant_index].content.is_empty() {
                    self.messages.remove(assistant_index);
                }
                let notice = Message::system(MODEL_FAILURE_MESSAGE);
                observer(&notice);
                self.messages.push(notice);
                TurnOutcome::Failed {
                    session_id: session_id.clone(),
                    error: e.to_string(),
                }
            }
        };

        let session = ChatSession {
            id: session_id,
            title,
            updated_at: now_millis(),
            messages: self.messages.clone(),
            memory_anchor: self.memory_anchor.clone(),
        };
        self.store.save_session(&session).await?;
        self.refresh_sessions().await;
        Ok(outcome)
    }

    fn current_title(&self, session_id: &str) -> String {
        self.title
            .clone()
            .or_else(|| {
                self.sessions
                    .iter()
                    .find(|s| s.id == session_id)
                    .map(|s| s.title.clone())
            })
            .unwrap_or_else(|| super::ai::title::FALLBACK_TITLE.to_string())
    }
}
