//! services/api/src/adapters/insight_llm.rs
//!
//! This module contains the adapter for the CIM summarization LLM.
//! It implements the `InsightService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs,
    },
    Client,
};
use async_trait::async_trait;
use cim_analyzer_core::ports::{InsightService, PortError, PortResult};
use cim_analyzer_core::upload::truncate_chars;
use regex::Regex;
use std::sync::LazyLock;
use tracing::debug;

/// Only this many characters of the extracted text are sent to the model.
pub const MAX_PROMPT_DOCUMENT_CHARS: usize = 10_000;

const SYSTEM_INSTRUCTIONS: &str = "You are an investment analyst reviewing CIMs.";

const USER_INPUT_TEMPLATE: &str = r#"
You are a top-tier private equity investment analyst. Extract only clear, actionable, investment-focused insights from the Confidential Information Memorandum (CIM) excerpt below. Do not hallucinate or guess beyond what's written. Return only what is explicitly stated or clearly implied.

Summarize in this JSON format (no markdown):

{
  "COMPANY INFO": {
    "Name": "",
    "Description": ""
  },
  "FINANCIALS": {
    "Actuals": {
      "revenue": "",
      "EBITDA": "",
      "year": "",
      "margin": "",
      "FCF": ""
    },
    "Estimates": {
      "forward revenue": "",
      "EBITDA": "",
      "capex": "",
      "capex/revenue": ""
    }
  },
  "THESIS": ["Key investment thesis points as bullet points"],
  "RED FLAGS": ["Key risks or concerns as bullet points"],
  "SUMMARY": "Concise, plain-English summary of the CIM excerpt.",
  "confidence_score": 0,
  "confidence_breakdown": {
    "COMPANY INFO": 0,
    "FINANCIALS": 0,
    "THESIS": 0,
    "RED FLAGS": 0,
    "SUMMARY": 0
  },
  "flagged_fields": [],
  "low_confidence_flags": ""
}

If a field is missing, use "" or "unknown" (not null). Be concise and factual. Focus on what a private equity team would want to know for a quick investment meeting.

CIM EXCERPT (first 10 pages):
{document}
"#;

static CODE_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^```json|^```|```$").expect("static regex"));

/// Builds the user message for a document, truncating the excerpt.
pub fn build_prompt(document_text: &str) -> String {
    USER_INPUT_TEMPLATE.replace(
        "{document}",
        truncate_chars(document_text, MAX_PROMPT_DOCUMENT_CHARS),
    )
}

/// Removes markdown code fences the model sometimes wraps around its JSON.
pub fn strip_code_fences(raw: &str) -> String {
    CODE_FENCE.replace_all(raw.trim(), "").trim().to_string()
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `InsightService` using an OpenAI-compatible chat model.
#[derive(Clone)]
pub struct OpenAiInsightAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAiInsightAdapter {
    /// Creates a new `OpenAiInsightAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, temperature: f32) -> Self {
        Self {
            client,
            model,
            temperature,
        }
    }
}

//=========================================================================================
// `InsightService` Trait Implementation
//=========================================================================================

#[async_trait]
impl InsightService for OpenAiInsightAdapter {
    /// Sends the CIM excerpt to the model and returns its payload untouched
    /// apart from code-fence removal. The payload is not parsed.
    async fn request_insight(&self, document_text: &str) -> PortResult<String> {
        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SYSTEM_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(build_prompt(document_text))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(self.temperature)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        // Call the API and manually map the error if it occurs, which respects the orphan rule.
        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| {
                PortError::Unexpected("Insight LLM response contained no text content.".to_string())
            })?;

        debug!(chars = content.len(), model = %self.model, "Received insight payload");
        Ok(strip_code_fences(&content))
    }
}
