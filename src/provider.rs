//! LLMプロバイダー抽象化レイヤー
//!
//! # 責務
//!
//! - 複数のLLMプロバイダー（OpenAI 互換, Gemini）を統一的に扱うインターフェースを提供
//! - 設定の `provider` フィールドに応じて適切なクライアントを生成するファクトリー機能
//! - 認証情報（API キー）の取得元を [`SecretSource`] として抽象化
//!
//! # 認証
//!
//! | provider | 環境変数          |
//! |----------|-------------------|
//! | openai   | `OPENAI_API_KEY`  |
//! | gemini   | `GEMINI_API_KEY`  |
//!
//! # モジュール構成
//!
//! - `traits` - 共通インターフェース（[`ChatClient`]トレイト等）
//! - `openai` - OpenAI Chat Completions 互換クライアント
//! - `gemini` - Gemini `generateContent` クライアント

pub mod gemini;
pub mod openai;
pub mod traits;

// 公開APIの再エクスポート
pub use traits::{ChatClient, ChatMessage, ChatResponse, Role, TokenUsage};

use std::collections::HashMap;

use serde::Serialize;

use crate::config::model::ModelConfig;
use crate::error::ProviderError;

/// 対応しているプロバイダー
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAI,
    Gemini,
}

impl Provider {
    /// 設定値からプロバイダーを解決する（大文字小文字は区別しない）
    ///
    /// # エラー
    ///
    /// - [`ProviderError::UnsupportedProvider`] - 未対応の値
    pub fn parse(name: &str) -> Result<Self, ProviderError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAI),
            "gemini" => Ok(Provider::Gemini),
            _ => Err(ProviderError::UnsupportedProvider(name.to_string())),
        }
    }

    /// API キーを読み込む環境変数名
    pub fn credential_var(&self) -> &'static str {
        match self {
            Provider::OpenAI => "OPENAI_API_KEY",
            Provider::Gemini => "GEMINI_API_KEY",
        }
    }
}

/// 認証情報の取得元
pub trait SecretSource: Send + Sync {
    /// キーに対応する値を返す。未設定・空文字列の場合は `None`
    fn get(&self, key: &str) -> Option<String>;
}

/// プロセスの環境変数から認証情報を読む
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSecrets;

impl SecretSource for EnvSecrets {
    fn get(&self, key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|value| !value.trim().is_empty())
    }
}

impl SecretSource for HashMap<String, String> {
    fn get(&self, key: &str) -> Option<String> {
        HashMap::get(self, key)
            .filter(|value| !value.trim().is_empty())
            .cloned()
    }
}

/// プロバイダークライアントを生成するファクトリー関数
///
/// # 引数
///
/// - `config`: エージェントの実効モデル設定
/// - `secrets`: 認証情報の取得元
///
/// # エラー
///
/// - [`ProviderError::UnsupportedProvider`] - `provider` が未対応
/// - [`ProviderError::MissingCredential`] - 必要な API キーが未設定
pub fn create_provider(
    config: &ModelConfig,
    secrets: &dyn SecretSource,
) -> Result<Box<dyn ChatClient>, ProviderError> {
    let provider = Provider::parse(&config.provider)?;
    let var = provider.credential_var();
    let api_key = secrets
        .get(var)
        .ok_or_else(|| ProviderError::MissingCredential(var.to_string()))?;

    match provider {
        Provider::OpenAI => Ok(Box::new(openai::OpenAIClient::new(api_key, config.clone()))),
        Provider::Gemini => Ok(Box::new(gemini::GeminiClient::new(api_key, config.clone()))),
    }
}

/// JSON ボディを POST し、成功時のレスポンス本文を返す
///
/// HTTP ステータスを [`ProviderError`] に分類します。
pub(crate) async fn post_json<T: Serialize>(
    request: reqwest::RequestBuilder,
    body: &T,
) -> Result<String, ProviderError> {
    let payload = serde_json::to_string(body)
        .map_err(|e| ProviderError::InvalidResponse(format!("request encode error: {e}")))?;

    let response = request
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(payload)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProviderError::Network(format!("Request timeout: {e}"))
            } else if e.is_connect() {
                ProviderError::Network(format!("Connection failed: {e}"))
            } else {
                ProviderError::Network(format!("Request failed: {e}"))
            }
        })?;

    let status = response.status();
    let text = response
        .text()
        .await
        .map_err(|e| ProviderError::Network(format!("Failed to read body: {e}")))?;

    classify_status(status.as_u16(), text)
}

/// HTTP ステータスコードをエラー種別に分類する
fn classify_status(status: u16, body: String) -> Result<String, ProviderError> {
    match status {
        200..=299 => Ok(body),
        401 | 403 => Err(ProviderError::AuthenticationError(body)),
        429 => Err(ProviderError::RateLimitExceeded),
        _ => Err(ProviderError::Http { status, body }),
    }
}
