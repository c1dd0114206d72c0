//! LLMプロバイダーの共通インターフェース定義
//!
//! # 責務
//!
//! - LLMプロバイダー（OpenAI, Gemini）の共通トレイト [`ChatClient`] を定義
//! - ロール付きメッセージ [`ChatMessage`] を定義
//! - プロバイダー非依存のレスポンス型 [`ChatResponse`] とトークン使用量 [`TokenUsage`] を提供
//!
//! # 使用例
//!
//! ```rust,no_run
//! use agentflow::provider::{ChatClient, ChatMessage};
//!
//! async fn example(client: Box<dyn ChatClient>) {
//!     let messages = vec![
//!         ChatMessage::system("You are a helpful assistant."),
//!         ChatMessage::user("Hello!"),
//!     ];
//!     let response = client.chat(&messages).await.unwrap();
//!
//!     println!("Response: {}", response.content);
//!     println!("Tokens: {} in, {} out",
//!         response.token_usage.input_tokens,
//!         response.token_usage.output_tokens
//!     );
//! }
//! ```

use async_trait::async_trait;
use serde::Serialize;

use crate::error::ProviderError;

/// LLMプロバイダーの共通インターフェース
///
/// このトレイトを実装することで、任意のLLMプロバイダーを
/// エージェントに組み込めます。テストではモック実装を差し込みます。
///
/// # 実装要件
///
/// - `Send + Sync`: マルチスレッド環境で安全に使用可能
/// - 非同期実行対応（`async_trait`を使用）
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// ロール付きメッセージ列を送り、生成されたテキストを取得する
    ///
    /// # エラー
    ///
    /// - [`ProviderError::Network`] - 接続失敗
    /// - [`ProviderError::AuthenticationError`] - 認証失敗
    /// - [`ProviderError::RateLimitExceeded`] - レート制限超過
    /// - [`ProviderError::Http`] - その他の HTTP エラー
    /// - [`ProviderError::InvalidResponse`] - 不正なレスポンス
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ProviderError>;
}

/// メッセージのロール
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// ロール付きメッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// LLMプロバイダーからのレスポンス
///
/// プロバイダー固有のレスポンス形式を共通の型に変換したもの。
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// LLMが生成したテキスト（加工なし）
    pub content: String,

    /// トークン使用量
    pub token_usage: TokenUsage,

    /// 使用されたモデル名
    pub model: String,
}

/// トークン使用量
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    /// 入力トークン数（プロンプト）
    pub input_tokens: u32,

    /// 出力トークン数（LLM生成テキスト）
    pub output_tokens: u32,
}

impl TokenUsage {
    /// 総トークン数を計算
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}
