//! デシリアライズ用の DTO (Data Transfer Object)
//!
//! # 責務
//!
//! このモジュールは、JSON / TOML ファイルからのデータ読み込み専用の構造体を提供します。
//! DTO はバリデーション前の「生データ」を表現し、ドメインモデルとは分離されています。
//!
//! ## 設計思想
//!
//! - **単一責務**: デシリアライズのみを担当
//! - **バリデーション前の状態**: 不正なデータも一旦受け入れる
//! - **カプセル化**: config モジュール内部のみで使用（外部非公開）

use std::path::PathBuf;

use serde::Deserialize;

use super::settings::{ContextInjection, FailurePolicy};

/// フロー定義 DTO
///
/// `flow.json` のトップレベルオブジェクトをそのまま保持します。
/// `serde_json` の `preserve_order` により宣言順が保たれます。
pub(super) type FlowDto = serde_json::Map<String, serde_json::Value>;

/// 実行設定 DTO
///
/// `agentflow.toml` をデシリアライズします。省略されたキーは既定値で補われます。
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub(super) struct SettingsDto {
    pub(super) config_dir: Option<PathBuf>,
    pub(super) prompts_dir: Option<PathBuf>,
    pub(super) input_dir: Option<PathBuf>,
    pub(super) output_dir: Option<PathBuf>,
    pub(super) log_dir: Option<PathBuf>,
    pub(super) timeout_secs: Option<u64>,
    pub(super) failure_policy: Option<FailurePolicy>,
    pub(super) context_injection: Option<ContextInjection>,
}
