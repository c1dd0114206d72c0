//! エラー型の定義
//!
//! このモジュールは、agentflow 全体で使用されるエラー型を定義します。
//!
//! # 伝播ポリシー
//!
//! - [`ConfigError`] / [`ProviderError::MissingCredential`] / [`ProviderError::UnsupportedProvider`]
//!   はエージェント構築時に発生し、そのエージェントを通るトラバーサル経路を止めます
//! - それ以外の [`ProviderError`] と [`ExtractionError`] は [`AgentError`] に包まれ、
//!   ノード単位で封じ込められます（センチネル文字列として成果物に書き出される）
//! - [`TemplateRenderError`] は常に非致命的で、テンプレートの原文にフォールバックします

use std::path::PathBuf;

use thiserror::Error;

/// 設定関連のエラー
#[derive(Debug, Error)]
pub enum ConfigError {
    /// ファイルの読み込みに失敗
    #[error("設定ファイルの読み込みに失敗しました: {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON のデシリアライズに失敗
    #[error("JSON のデシリアライズに失敗しました: {0}")]
    JsonDeserialize(#[from] serde_json::Error),

    /// TOML のデシリアライズに失敗
    #[error("TOML のデシリアライズに失敗しました: {0}")]
    TomlDeserialize(#[from] toml::de::Error),

    /// バリデーションエラー
    #[error("設定のバリデーションに失敗しました: {0}")]
    Validation(String),

    /// フローが参照するエージェントが登録されていない
    #[error("未知のエージェントが参照されました: {0}")]
    UnknownAgent(String),
}

/// LLMプロバイダー関連のエラー
#[derive(Debug, Error)]
pub enum ProviderError {
    /// 必須の認証情報（環境変数）が設定されていない
    #[error("認証情報が見つかりません: 環境変数 {0} が設定されていません")]
    MissingCredential(String),

    /// `provider` に未対応の値が指定された
    #[error("未対応のプロバイダーです: {0}")]
    UnsupportedProvider(String),

    /// 接続失敗・タイムアウトなどのネットワークエラー
    #[error("ネットワークエラー: {0}")]
    Network(String),

    /// 2xx 以外の HTTP ステータス
    #[error("HTTP {status} が返されました: {body}")]
    Http { status: u16, body: String },

    /// 認証失敗（401 / 403）
    #[error("認証に失敗しました: {0}")]
    AuthenticationError(String),

    /// レート制限超過（429）
    #[error("レート制限を超えました")]
    RateLimitExceeded,

    /// 不正なレスポンス
    #[error("不正なレスポンス: {0}")]
    InvalidResponse(String),
}

/// テンプレートのプレースホルダーに対応する値がコンテキストに存在しない
#[derive(Debug, Error, PartialEq, Eq)]
#[error("テンプレートのプレースホルダーに対応する値がありません: {}", missing.join(", "))]
pub struct TemplateRenderError {
    /// 解決できなかったプレースホルダー名（出現順、重複なし）
    pub missing: Vec<String>,
}

/// レスポンスから区切りブロックを取り出せなかった
#[derive(Debug, Error, PartialEq, Eq)]
#[error("レスポンスに <{tag}> ブロックが見つかりません")]
pub struct ExtractionError {
    pub tag: String,
}

/// エージェント1回の実行における失敗
///
/// この型の [`Display`](std::fmt::Display) がセンチネル文字列
/// `[ERROR from {agent}: {message}]` の `message` 部分になります。
#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("LLM呼び出しが {secs}秒以内に完了しませんでした")]
    Timeout { secs: u64 },

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error("入力ファイルの読み込みに失敗しました: {path}: {source}")]
    InputRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_render_error_lists_missing_names() {
        let err = TemplateRenderError {
            missing: vec!["previous_1".to_string(), "draft".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "テンプレートのプレースホルダーに対応する値がありません: previous_1, draft"
        );
    }

    #[test]
    fn test_agent_error_is_transparent_over_provider() {
        let err = AgentError::from(ProviderError::RateLimitExceeded);
        assert_eq!(err.to_string(), "レート制限を超えました");
    }

    #[test]
    fn test_missing_credential_names_variable() {
        let err = ProviderError::MissingCredential("OPENAI_API_KEY".to_string());
        assert!(err.to_string().contains("OPENAI_API_KEY"));
    }
}
