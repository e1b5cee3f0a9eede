//! Chat turn orchestration: history loading, the agent loop, persistence,
//! token accounting, and the background memory evaluator.

use std::collections::HashMap;
use std::sync::Arc;

use agenty_ai::{
    ApiKind, ChatExecutor, ChatParams, Message, ReasoningBlock, Role, ToolCall, ToolResult,
};
use agenty_storage::{
    ChatMessage, ChatMessageDto, ChatSessionDto, MessageStore, ModelStore, NewChatMessage,
    PageRequest, PagedResponse, ProviderSpecifics, ProviderStore, SessionStore,
};
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{BusinessError, Result};
use crate::safe::spawn_supervised;
use crate::services::evaluator::evaluate_and_save_memory;
use crate::services::memory::MemoryService;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    pub model_id: Uuid,
    pub message: String,
}

pub struct ChatService {
    executor: Arc<ChatExecutor>,
    sessions: SessionStore,
    messages: MessageStore,
    models: ModelStore,
    providers: ProviderStore,
    memory: Arc<MemoryService>,
    shutdown: watch::Receiver<bool>,
}

impl ChatService {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        executor: Arc<ChatExecutor>,
        sessions: SessionStore,
        messages: MessageStore,
        models: ModelStore,
        providers: ProviderStore,
        memory: Arc<MemoryService>,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            executor,
            sessions,
            messages,
            models,
            providers,
            memory,
            shutdown,
        }
    }

    /// Create a session bound to the default model, falling back to the
    /// most recently created one. The model's provider must have an API
    /// key configured.
    pub async fn create_session(&self) -> Result<ChatSessionDto> {
        let model = match self.models.find_default().await? {
            Some(model) => model,
            None => self
                .models
                .find_latest()
                .await?
                .ok_or_else(BusinessError::model_not_found)?,
        };

        let provider = self
            .providers
            .find(model.provider_id)
            .await?
            .ok_or_else(BusinessError::provider_not_found)?;
        if provider.api_key.is_empty() {
            return Err(BusinessError::provider_not_configured().into());
        }

        let session = self
            .sessions
            .create(Some(model.id))
            .await
            .inspect_err(|err| error!(error = %err, "failed to create chat session"))?;
        Ok(session.to_dto(Vec::new()))
    }

    pub async fn get_session(&self, session_id: Uuid) -> Result<ChatSessionDto> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or_else(BusinessError::session_not_found)?;
        let messages = self.hydrated_messages(session_id).await?;
        Ok(session.to_dto(messages))
    }

    /// The most recently updated session, or `None` when no session exists.
    pub async fn get_last_session(&self) -> Result<Option<ChatSessionDto>> {
        let Some(session) = self.sessions.find_last().await? else {
            return Ok(None);
        };
        let messages = self.hydrated_messages(session.id).await?;
        Ok(Some(session.to_dto(messages)))
    }

    pub async fn list_sessions(
        &self,
        mut page: PageRequest,
    ) -> Result<PagedResponse<ChatSessionDto>> {
        page.apply_defaults();
        let (sessions, total) = self
            .sessions
            .list(&page)
            .await
            .inspect_err(|err| error!(error = %err, "failed to list chat sessions"))?;

        Ok(PagedResponse {
            total,
            page: page.page,
            page_size: page.page_size,
            data: sessions.iter().map(|s| s.to_dto(Vec::new())).collect(),
        })
    }

    /// Drive one turn: persist the user message, run the agent loop,
    /// persist its output, bump the token counter, and kick off the
    /// memory evaluator.
    pub async fn chat(&self, session_id: Uuid, dto: ChatDto) -> Result<Vec<ChatMessageDto>> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or_else(BusinessError::session_not_found)?;

        let model = self
            .models
            .find(dto.model_id)
            .await?
            .ok_or_else(BusinessError::model_not_found)?;

        let provider = self
            .providers
            .find(model.provider_id)
            .await?
            .ok_or_else(BusinessError::provider_not_found)?;
        if provider.api_key.is_empty() {
            return Err(BusinessError::provider_not_configured().into());
        }

        let history = self.messages.list_by_session(session.id).await?;
        let mut messages: Vec<Message> = history.iter().map(to_normalized).collect();
        messages.push(Message::user(dto.message.clone()));

        self.messages
            .insert(&NewChatMessage {
                session_id: session.id,
                role: Role::User.as_str().to_string(),
                content: dto.message.clone(),
                tool_calls: None,
                tool_results: None,
                provider_specifics: None,
                model_id: model.id,
            })
            .await
            .inspect_err(|err| error!(error = %err, session_id = %session.id, "failed to save user message"))?;

        let kind = ApiKind::from_tag(&provider.kind).unwrap_or(ApiKind::OpenAi);
        let result = self
            .executor
            .chat(ChatParams {
                messages,
                model: model.code.clone(),
                base_url: provider.base_url.clone(),
                api_key: provider.api_key.clone(),
                kind,
                response_format: None,
            })
            .await
            .inspect_err(|err| error!(error = %err, session_id = %session.id, "chat completion failed"))?;

        let new_rows: Vec<NewChatMessage> = result
            .messages
            .iter()
            .map(|msg| to_row(session.id, model.id, msg))
            .collect();
        let inserted = self
            .messages
            .insert_many(&new_rows)
            .await
            .inspect_err(|err| error!(error = %err, session_id = %session.id, "failed to save assistant messages"))?;

        self.sessions
            .record_usage(
                session.id,
                session.token_consumed + result.total_tokens,
                model.id,
            )
            .await
            .inspect_err(|err| error!(error = %err, session_id = %session.id, "failed to update token counter"))?;

        if self.memory.is_enabled() {
            let executor = self.executor.clone();
            let memory = self.memory.clone();
            let provider = provider.clone();
            let model_code = model.code.clone();
            let user_message = dto.message.clone();
            let assistant_messages = result.messages.clone();
            spawn_supervised("auto-memory", self.shutdown.clone(), move || {
                let executor = executor.clone();
                let memory = memory.clone();
                let provider = provider.clone();
                let model_code = model_code.clone();
                let user_message = user_message.clone();
                let assistant_messages = assistant_messages.clone();
                async move {
                    evaluate_and_save_memory(
                        &executor,
                        &memory,
                        &provider,
                        &model_code,
                        &user_message,
                        &assistant_messages,
                    )
                    .await;
                }
            });
        }

        Ok(inserted.iter().map(|row| row.to_dto(None)).collect())
    }

    async fn hydrated_messages(&self, session_id: Uuid) -> Result<Vec<ChatMessageDto>> {
        let messages = self.messages.list_by_session(session_id).await?;
        if messages.is_empty() {
            return Ok(Vec::new());
        }

        let model_ids: Vec<Uuid> = {
            let mut ids: Vec<Uuid> = messages.iter().map(|m| m.model_id).collect();
            ids.sort();
            ids.dedup();
            ids
        };
        let models = self.models.find_by_ids(&model_ids).await?;
        let model_map: HashMap<Uuid, _> =
            models.iter().map(|m| (m.id, m.to_dto(None))).collect();

        Ok(messages
            .iter()
            .map(|m| m.to_dto(model_map.get(&m.model_id).cloned()))
            .collect())
    }
}

/// Rebuild a normalized message from its persisted row.
fn to_normalized(row: &ChatMessage) -> Message {
    let role = Role::from_str(&row.role).unwrap_or(Role::User);

    let tool_calls: Vec<ToolCall> = row
        .tool_calls
        .clone()
        .map(|value| {
            serde_json::from_value(value).unwrap_or_else(|err| {
                warn!(error = %err, message_id = %row.id, "failed to decode tool calls");
                Vec::new()
            })
        })
        .unwrap_or_default();

    let tool_result: Option<ToolResult> = row.tool_results.clone().and_then(|value| {
        serde_json::from_value(value)
            .map_err(|err| {
                warn!(error = %err, message_id = %row.id, "failed to decode tool result");
                err
            })
            .ok()
    });

    let (reasoning_content, reasoning_blocks) = row
        .provider_specifics
        .clone()
        .and_then(|value| serde_json::from_value::<ProviderSpecifics>(value).ok())
        .map(|specifics| {
            let blocks: Vec<ReasoningBlock> = specifics
                .reasoning_blocks
                .into_iter()
                .filter_map(|value| serde_json::from_value(value).ok())
                .collect();
            (specifics.kimi_reasoning_content, blocks)
        })
        .unwrap_or((None, Vec::new()));

    Message {
        role,
        content: row.content.clone(),
        tool_calls,
        tool_result,
        reasoning_blocks,
        reasoning_content,
    }
}

/// Flatten a normalized message into its storage row.
fn to_row(session_id: Uuid, model_id: Uuid, msg: &Message) -> NewChatMessage {
    let tool_calls = if msg.tool_calls.is_empty() {
        None
    } else {
        serde_json::to_value(&msg.tool_calls).ok()
    };
    let tool_results = msg
        .tool_result
        .as_ref()
        .and_then(|r| serde_json::to_value(r).ok());

    let specifics = ProviderSpecifics {
        kimi_reasoning_content: msg.reasoning_content.clone(),
        reasoning_blocks: msg
            .reasoning_blocks
            .iter()
            .filter_map(|b| serde_json::to_value(b).ok())
            .collect(),
    };
    let provider_specifics = if specifics.is_empty() {
        None
    } else {
        serde_json::to_value(&specifics).ok()
    };

    NewChatMessage {
        session_id,
        role: msg.role.as_str().to_string(),
        content: msg.content.clone(),
        tool_calls,
        tool_results,
        provider_specifics,
        model_id,
    }
}
