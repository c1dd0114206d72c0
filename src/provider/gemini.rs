//! Google Gemini クライアント実装
//!
//! # 責務
//!
//! - `POST {base_url}/models/{model}:generateContent` との通信を担当
//! - 共通メッセージ列を Gemini の `systemInstruction` / `contents` 形式に変換
//! - 候補テキストとトークン使用量（`usageMetadata`）を共通型に変換
//!
//! ロールの対応: `system` → `systemInstruction`、`user` → `user`、`assistant` → `model`

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::post_json;
use super::traits::{ChatClient, ChatMessage, ChatResponse, Role, TokenUsage};
use crate::config::model::ModelConfig;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// 生成がブロックされたことを示す finishReason
const BLOCKING_FINISH_REASONS: &[&str] = &[
    "SAFETY",
    "RECITATION",
    "BLOCKLIST",
    "PROHIBITED_CONTENT",
    "SPII",
];

/// Gemini ネイティブ API クライアント
pub struct GeminiClient {
    http: Client,
    api_key: String,
    config: ModelConfig,
}

impl GeminiClient {
    pub fn new(api_key: String, config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            api_key,
            config,
        }
    }

    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/models/{}:generateContent", self.config.model)
    }

    fn build_request(&self, messages: &[ChatMessage]) -> GenerateRequest {
        let mut system_parts = Vec::new();
        let mut contents = Vec::new();

        for message in messages {
            let part = GeminiPart {
                text: message.content.clone(),
            };
            match message.role {
                Role::System => system_parts.push(part),
                Role::User => contents.push(GeminiContent {
                    role: Some("user".to_string()),
                    parts: vec![part],
                }),
                Role::Assistant => contents.push(GeminiContent {
                    role: Some("model".to_string()),
                    parts: vec![part],
                }),
            }
        }

        let config = &self.config;
        GenerateRequest {
            system_instruction: (!system_parts.is_empty()).then(|| GeminiContent {
                role: None,
                parts: system_parts,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: config.temperature,
                top_p: config.top_p,
                max_output_tokens: config.max_tokens,
                stop_sequences: config.stop.clone(),
                presence_penalty: config.presence_penalty,
                frequency_penalty: config.frequency_penalty,
            },
        }
    }

    /// 最初の候補のテキストパートを連結して返す
    fn parse_response(&self, body: &str) -> Result<ChatResponse, ProviderError> {
        let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("JSON parse error: {e}: {body}"))
        })?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No candidates in response".to_string()))?;

        let reason = candidate
            .finish_reason
            .unwrap_or_else(|| "unknown".to_string());
        if BLOCKING_FINISH_REASONS.contains(&reason.as_str()) {
            return Err(ProviderError::InvalidResponse(format!(
                "Response blocked (finishReason: {reason})"
            )));
        }

        // 空文字列のパートは正常な空の応答として扱う
        let content: String = candidate
            .content
            .map(|c| c.parts)
            .filter(|parts| !parts.is_empty())
            .ok_or_else(|| {
                ProviderError::InvalidResponse(format!(
                    "No content in response (finishReason: {reason})"
                ))
            })?
            .into_iter()
            .map(|p| p.text)
            .collect();

        let token_usage = parsed
            .usage_metadata
            .map(|usage| TokenUsage {
                input_tokens: usage.prompt_token_count,
                output_tokens: usage.candidates_token_count,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            token_usage,
            model: parsed
                .model_version
                .unwrap_or_else(|| self.config.model.clone()),
        })
    }
}

#[async_trait]
impl ChatClient for GeminiClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ProviderError> {
        let request = self.build_request(messages);
        let builder = self
            .http
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key);

        let body = post_json(builder, &request).await?;
        let response = self.parse_response(&body)?;

        tracing::info!(
            provider = "gemini",
            model = %response.model,
            prompt = response.token_usage.input_tokens,
            completion = response.token_usage.output_tokens,
            total = response.token_usage.total(),
            "token usage"
        );

        Ok(response)
    }
}

// ── Request types ────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop_sequences: Vec<String>,
    #[serde(skip_serializing_if = "is_zero")]
    presence_penalty: f32,
    #[serde(skip_serializing_if = "is_zero")]
    frequency_penalty: f32,
}

fn is_zero(value: &f32) -> bool {
    *value == 0.0
}

// ── Response types ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsage>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsage {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}
