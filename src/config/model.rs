//! エージェント別モデル設定
//!
//! # 責務
//!
//! - 既定値を持つ型付きの [`ModelConfig`] を定義
//! - 部分的な上書き [`ModelOverride`] を順序の決まったオーバーレイとして適用
//! - `default_model_config.json` と `agent_config.json` から [`ModelCatalog`] を構築
//!
//! # 合成順序
//!
//! ```text
//! ModelConfig::default()  ⊕  default_model_config.json  ⊕  agent_config.json[agent]
//! ```
//!
//! 後から適用したものが優先されます。

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::read_config_file;
use crate::error::ConfigError;

/// エージェント1つ分の LLM 呼び出し設定（合成済み）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelConfig {
    /// プロバイダー名（"openai" | "gemini"）。解決は構築時に行う
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub stop: Vec<String>,
    pub presence_penalty: f32,
    pub frequency_penalty: f32,
    pub logit_bias: Option<BTreeMap<String, f32>>,
    pub user: Option<String>,
    /// OpenAI 互換エンドポイント等を使う場合のベース URL
    pub base_url: Option<String>,
    /// 設定されている場合、レスポンスから `<tag>...</tag>` の中身だけを取り出す
    pub extract_tag: Option<String>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.7,
            top_p: 1.0,
            max_tokens: 1024,
            stop: Vec::new(),
            presence_penalty: 0.0,
            frequency_penalty: 0.0,
            logit_bias: None,
            user: None,
            base_url: None,
            extract_tag: None,
        }
    }
}

impl ModelConfig {
    /// 部分設定を重ねた新しい設定を返す（`overlay` 側が優先）
    pub fn overlay(&self, overlay: &ModelOverride) -> Self {
        let base = self.clone();
        Self {
            provider: overlay.provider.clone().unwrap_or(base.provider),
            model: overlay.model.clone().unwrap_or(base.model),
            temperature: overlay.temperature.unwrap_or(base.temperature),
            top_p: overlay.top_p.unwrap_or(base.top_p),
            max_tokens: overlay.max_tokens.unwrap_or(base.max_tokens),
            stop: overlay
                .stop
                .clone()
                .map(StopSequences::into_vec)
                .unwrap_or(base.stop),
            presence_penalty: overlay.presence_penalty.unwrap_or(base.presence_penalty),
            frequency_penalty: overlay.frequency_penalty.unwrap_or(base.frequency_penalty),
            logit_bias: overlay.logit_bias.clone().or(base.logit_bias),
            user: overlay.user.clone().or(base.user),
            base_url: overlay.base_url.clone().or(base.base_url),
            extract_tag: overlay.extract_tag.clone().or(base.extract_tag),
        }
    }
}

/// `stop` は単一文字列でも配列でも受け付ける
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl StopSequences {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            StopSequences::One(stop) => vec![stop],
            StopSequences::Many(stops) => stops,
        }
    }
}

/// モデル設定の部分上書き
///
/// 指定されたキーだけが [`ModelConfig::overlay`] で反映されます。
/// 未知のキー（例: `n`）は無視されます。
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ModelOverride {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    pub stop: Option<StopSequences>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub logit_bias: Option<BTreeMap<String, f32>>,
    pub user: Option<String>,
    pub base_url: Option<String>,
    pub extract_tag: Option<String>,
}

/// 全エージェント分のモデル設定
#[derive(Debug, Clone, Default)]
pub struct ModelCatalog {
    defaults: ModelConfig,
    overrides: HashMap<String, ModelOverride>,
}

impl ModelCatalog {
    /// 既定設定ファイルとエージェント別設定ファイルから読み込む
    ///
    /// どちらのファイルも必須です。存在しない・不正な場合は [`ConfigError`] を返します。
    pub fn load(
        default_path: impl AsRef<Path>,
        agents_path: impl AsRef<Path>,
    ) -> Result<Self, ConfigError> {
        let defaults = read_config_file(default_path.as_ref())?;
        let agents = read_config_file(agents_path.as_ref())?;
        Self::from_json(&defaults, &agents)
    }

    /// JSON 文字列から読み込む
    pub fn from_json(defaults: &str, agents: &str) -> Result<Self, ConfigError> {
        let default_overlay: ModelOverride = serde_json::from_str(defaults)?;
        let overrides: HashMap<String, ModelOverride> = serde_json::from_str(agents)?;
        Ok(Self {
            defaults: ModelConfig::default().overlay(&default_overlay),
            overrides,
        })
    }

    /// エージェントの実効設定を返す
    pub fn resolve(&self, agent: &str) -> ModelConfig {
        match self.overrides.get(agent) {
            Some(overlay) => self.defaults.overlay(overlay),
            None => self.defaults.clone(),
        }
    }

    /// 上書き設定が存在するエージェント名（ソート済み）
    pub fn configured_agents(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.overrides.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
