//! 設定の読み込みと検証
//!
//! # 責務
//!
//! - フロー定義（`flow.json`）の読み込みと検証 → [`flow::FlowGraph`]
//! - エージェントごとのモデル設定の合成 → [`model::ModelCatalog`]
//! - 実行設定（`agentflow.toml`）の読み込み → [`settings::RunSettings`]
//!
//! ## 変換フロー
//!
//! ```text
//! JSON / TOML ファイル
//!   ↓ (デシリアライズ)
//! DTO（バリデーション前の生データ）
//!   ↓ (TryFrom でバリデーション)
//! ドメインモデル
//! ```
//!
//! どの型もグローバル状態を参照しません。パスはすべて [`settings::RunSettings`]
//! から明示的に渡されます。

pub mod dto;
pub mod flow;
pub mod model;
pub mod settings;

use std::path::Path;

use crate::error::ConfigError;

/// 設定ファイルを文字列として読み込む
///
/// 読み込みに失敗した場合はパスを含む [`ConfigError::FileRead`] を返します。
pub(crate) fn read_config_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::FileRead {
        path: path.to_path_buf(),
        source,
    })
}
