//! OpenAI Chat Completions 互換クライアント実装
//!
//! # 責務
//!
//! - `POST {base_url}/chat/completions` との通信を担当
//! - [`ChatClient`] トレイトを実装し、統一インターフェースを提供
//! - OpenAI 固有のレスポンス形式と共通型の変換
//!
//! `base_url` を設定すれば、OpenAI 互換の任意のエンドポイント
//! （Gemini の OpenAI 互換 API、vLLM、Ollama 等）にも接続できます。
//!
//! # レスポンス例
//!
//! ```json
//! {
//!   "model": "gpt-4",
//!   "choices": [{"message": {"role": "assistant", "content": "Hello!"}}],
//!   "usage": {"prompt_tokens": 10, "completion_tokens": 2, "total_tokens": 12}
//! }
//! ```

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::post_json;
use super::traits::{ChatClient, ChatMessage, ChatResponse, Role, TokenUsage};
use crate::config::model::ModelConfig;
use crate::error::ProviderError;

/// 既定の API ベース URL
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI Chat Completions クライアント
pub struct OpenAIClient {
    http: Client,
    api_key: String,
    config: ModelConfig,
}

impl OpenAIClient {
    /// 新しいクライアントを生成
    ///
    /// # 引数
    ///
    /// - `api_key`: `OPENAI_API_KEY` の値
    /// - `config`: エージェントの実効モデル設定
    pub fn new(api_key: String, config: ModelConfig) -> Self {
        Self {
            http: Client::new(),
            api_key,
            config,
        }
    }

    /// リクエスト先の URL
    fn endpoint(&self) -> String {
        let base = self
            .config
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/chat/completions")
    }

    /// メッセージ列と設定からリクエストボディを組み立てる
    fn build_request(&self, messages: &[ChatMessage]) -> CompletionRequest {
        let config = &self.config;
        CompletionRequest {
            model: config.model.clone(),
            messages: messages
                .iter()
                .map(|m| CompletionMessage {
                    role: m.role,
                    content: m.content.clone(),
                })
                .collect(),
            temperature: config.temperature,
            top_p: config.top_p,
            max_tokens: config.max_tokens,
            stop: config.stop.clone(),
            presence_penalty: config.presence_penalty,
            frequency_penalty: config.frequency_penalty,
            logit_bias: config.logit_bias.clone(),
            user: config.user.clone(),
        }
    }

    /// レスポンス本文をパースして [`ChatResponse`] に変換
    ///
    /// `choices[0].message.content` を加工せずに返します。
    fn parse_response(&self, body: &str) -> Result<ChatResponse, ProviderError> {
        let parsed: CompletionResponse = serde_json::from_str(body).map_err(|e| {
            ProviderError::InvalidResponse(format!("JSON parse error: {e}: {body}"))
        })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("No choices in response".to_string()))?
            .message
            .content
            .ok_or_else(|| ProviderError::InvalidResponse("No content in response".to_string()))?;

        let token_usage = parsed
            .usage
            .map(|usage| TokenUsage {
                input_tokens: usage.prompt_tokens,
                output_tokens: usage.completion_tokens,
            })
            .unwrap_or_default();

        Ok(ChatResponse {
            content,
            token_usage,
            model: parsed.model.unwrap_or_else(|| self.config.model.clone()),
        })
    }
}

#[async_trait]
impl ChatClient for OpenAIClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ProviderError> {
        let request = self.build_request(messages);
        let builder = self.http.post(self.endpoint()).bearer_auth(&self.api_key);

        let body = post_json(builder, &request).await?;
        let response = self.parse_response(&body)?;

        tracing::info!(
            provider = "openai",
            model = %response.model,
            prompt = response.token_usage.input_tokens,
            completion = response.token_usage.output_tokens,
            total = response.token_usage.total(),
            "token usage"
        );

        Ok(response)
    }
}

// リクエスト / レスポンス型定義

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    messages: Vec<CompletionMessage>,
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
    presence_penalty: f32,
    frequency_penalty: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    logit_bias: Option<BTreeMap<String, f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<String>,
}

#[derive(Debug, Serialize)]
struct CompletionMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Option<CompletionUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
