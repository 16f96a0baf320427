use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionTool,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// Represents a tool call requested by the LLM.
pub type ToolCall = async_openai::types::ChatCompletionMessageToolCall;

/// Represents the events that can be yielded from a streaming text response.
#[derive(Debug, Clone)]
pub enum LLMStreamEvent {
    TextChunk(String),
}

/// A stream of text chunks from the LLM.
pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMStreamEvent, OpenAIError>> + Send>>;

/// Represents the two possible outcomes of the LLM's decision-making turn.
#[derive(Debug, Clone)]
pub enum LLMAction {
    /// The LLM decided to respond directly with text.
    TextResponse(String),
    /// The LLM decided to call one or more tools.
    ToolCall(Vec<ToolCall>),
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RequestOptions {
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl RequestOptions {
    /// Some models reject `temperature` and `top_p` together; `temperature` wins.
    pub fn normalized(self) -> Self {
        if self.temperature.is_some() && self.top_p.is_some() {
            tracing::debug!("Dropping top_p because temperature is set");
            Self {
                top_p: None,
                ..self
            }
        } else {
            self
        }
    }

    fn apply(self, builder: &mut CreateChatCompletionRequestArgs) {
        let options = self.normalized();
        if let Some(temperature) = options.temperature {
            builder.temperature(temperature);
        }
        if let Some(top_p) = options.top_p {
            builder.top_p(top_p);
        }
        if let Some(max_tokens) = options.max_tokens {
            builder.max_completion_tokens(max_tokens);
        }
    }
}

/// A generic client for interacting with an LLM.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Makes a single, non-streaming call to the LLM to decide on the next action.
    async fn decide_action(
        &self,
        system_prompt: String,
        history: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction>;

    /// Makes a streaming call to the LLM after tools have been executed.
    async fn stream_after_tools(
        &self,
        system_prompt: String,
        history_with_tool_results: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
    options: RequestOptions,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key and base URL.
    /// * `model` - The specific model identifier to use for chat completions (e.g., "gpt-4o").
    /// * `options` - Sampling parameters, normalised before every request.
    pub fn new(config: OpenAIConfig, model: String, options: RequestOptions) -> Self {
        Self {
            client: Client::with_config(config),
            model,
            options,
        }
    }

    fn with_system_prompt(
        system_prompt: String,
        mut history: Vec<ChatCompletionRequestMessage>,
    ) -> Result<Vec<ChatCompletionRequestMessage>> {
        if system_prompt.is_empty() {
            return Ok(history);
        }
        let system = ChatCompletionRequestSystemMessageArgs::default()
            .content(system_prompt)
            .build()?
            .into();
        history.insert(0, system);
        Ok(history)
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn decide_action(
        &self,
        system_prompt: String,
        history: Vec<ChatCompletionRequestMessage>,
        tools: Vec<ChatCompletionTool>,
    ) -> Result<LLMAction> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(Self::with_system_prompt(system_prompt, history)?);
        if !tools.is_empty() {
            builder.tools(tools).tool_choice("auto");
        }
        self.options.apply(&mut builder);
        let request = builder.build()?;

        let response: CreateChatCompletionResponse = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("LLM response contained no choices."))?;

        match (&choice.message.tool_calls, &choice.message.content) {
            (Some(tool_calls), _) if !tool_calls.is_empty() => {
                Ok(LLMAction::ToolCall(tool_calls.clone()))
            }
            (_, Some(content)) => Ok(LLMAction::TextResponse(content.clone())),
            _ => Err(anyhow!(
                "LLM response had neither text content nor tool calls."
            )),
        }
    }

    async fn stream_after_tools(
        &self,
        system_prompt: String,
        history_with_tool_results: Vec<ChatCompletionRequestMessage>,
    ) -> Result<LLMStream> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(Self::with_system_prompt(
                system_prompt,
                history_with_tool_results,
            )?)
            .stream(true);
        self.options.apply(&mut builder);
        let request = builder.build()?;

        let stream = self.client.chat().create_stream(request).await?;

        Ok(Box::pin(stream.filter_map(|result| async move {
            match result {
                Ok(response) => {
                    let choice = response.choices.first()?;
                    match &choice.delta.content {
                        Some(content) if !content.is_empty() => {
                            Some(Ok(LLMStreamEvent::TextChunk(content.clone())))
                        }
                        _ => None,
                    }
                }
                Err(e) => Some(Err(e)),
            }
        })))
    }
}
