use async_stream::try_stream;
use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs,
    },
    Client,
};

use crate::domains::chat::Role;
use crate::error::{RagDeskError, Result};
use crate::interfaces::providers::{ChatEvent, ChatTurn, LlmProvider};

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAiProvider {
    model: String,
    temperature: Option<f32>,
    client: Client<OpenAIConfig>,
}

impl OpenAiProvider {
    pub fn new(api_key: String, model: Option<String>, base_url: Option<String>) -> Self {
        let model = model.unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(base_url);
        Self {
            model,
            temperature: None,
            client: Client::with_config(config),
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_message(turn: &ChatTurn) -> Result<ChatCompletionRequestMessage> {
        let message = match turn.role {
            Role::System => ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| RagDeskError::Runtime(e.to_string()))?,
            ),
            Role::User => ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Text(
                        turn.content.clone(),
                    ))
                    .build()
                    .map_err(|e| RagDeskError::Runtime(e.to_string()))?,
            ),
            Role::Assistant => ChatCompletionRequestMessage::Assistant(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()
                    .map_err(|e| RagDeskError::Runtime(e.to_string()))?,
            ),
        };
        Ok(message)
    }

    fn build_request(&self, turns: &[ChatTurn], stream: bool) -> Result<CreateChatCompletionRequest> {
        let messages = turns
            .iter()
            .filter(|turn| !(turn.role == Role::System && turn.content.is_empty()))
            .map(Self::build_message)
            .collect::<Result<Vec<_>>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(self.model.clone());
        builder.messages(messages);
        if let Some(temperature) = self.temperature {
            builder.temperature(temperature);
        }
        if stream {
            builder.stream(true);
        }
        builder
            .build()
            .map_err(|e| RagDeskError::Runtime(e.to_string()))
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    async fn generate_text(&self, prompt: &str, system_prompt: &str) -> Result<String> {
        let turns = vec![
            ChatTurn::new(Role::System, system_prompt),
            ChatTurn::new(Role::User, prompt),
        ];
        let request = self.build_request(&turns, false)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| RagDeskError::Http(e.to_string()))?;

        let text = response
            .choices
            .first()
            .ok_or_else(|| RagDeskError::Runtime("No choices returned".to_string()))?
            .message
            .content
            .clone()
            .unwrap_or_default();
        Ok(text)
    }

    fn chat_stream(&self, turns: Vec<ChatTurn>) -> BoxStream<'static, Result<ChatEvent>> {
        let provider = self.clone();

        Box::pin(try_stream! {
            let request = provider.build_request(&turns, true)?;
            let mut stream = provider
                .client
                .chat()
                .create_stream(request)
                .await
                .map_err(|e| RagDeskError::Http(e.to_string()))?;

            let mut finish_reason = None;
            while let Some(item) = stream.next().await {
                let response = item.map_err(|e| RagDeskError::Http(e.to_string()))?;
                for choice in response.choices {
                    if let Some(delta) = choice.delta.content {
                        if !delta.is_empty() {
                            yield ChatEvent::Delta(delta);
                        }
                    }
                    if let Some(reason) = choice.finish_reason {
                        finish_reason = wire_name(&reason);
                    }
                }
            }
            tracing::debug!(model = %provider.model, ?finish_reason, "completion stream finished");
            yield ChatEvent::Done { finish_reason };
        })
    }
}

/// The name a value has on the wire, e.g. `tool_calls` for a finish reason.
fn wire_name<T: serde::Serialize>(value: &T) -> Option<String> {
    serde_json::to_value(value)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
}
