//! 実行設定
//!
//! 1回の実行で使うディレクトリ、タイムアウト、失敗時ポリシー、
//! コンテキスト注入方式をまとめた [`RunSettings`] を提供します。
//!
//! ## 使用例
//!
//! ```toml
//! input_dir = "repository"
//! output_dir = "output"
//! timeout_secs = 60
//! failure_policy = "contain"
//! context_injection = "placeholders"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::dto::SettingsDto;
use super::read_config_file;
use crate::error::ConfigError;

const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// ノードの LLM 呼び出しが失敗したときの扱い
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// センチネル文字列を成果物として書き出し、後続ノードの実行を続ける
    #[default]
    Contain,
    /// センチネルを書き出した後、入力ファイルのトラバーサルを中断する
    Halt,
}

/// 祖先ノードの出力をプロンプトへ渡す方式
///
/// 1回の実行の中では常に同じ方式が使われます。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextInjection {
    /// ユーザーテンプレート内の `{{祖先名}}` プレースホルダーで参照する
    #[default]
    Placeholders,
    /// 祖先ごとに assistant メッセージを1つ追加する
    Messages,
}

/// 実行設定（ドメインモデル）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub config_dir: PathBuf,
    pub prompts_dir: PathBuf,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    pub timeout_secs: u64,
    pub failure_policy: FailurePolicy,
    pub context_injection: ContextInjection,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            prompts_dir: PathBuf::from("prompts"),
            input_dir: PathBuf::from("repository"),
            output_dir: PathBuf::from("output"),
            log_dir: PathBuf::from("logs"),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            failure_policy: FailurePolicy::default(),
            context_injection: ContextInjection::default(),
        }
    }
}

impl RunSettings {
    /// TOML ファイルから実行設定を読み込む
    ///
    /// # 戻り値
    ///
    /// * `Ok(RunSettings)` - 読み込みに成功した場合
    /// * `Err(ConfigError)` - ファイルの読み込み、パース、バリデーションに失敗した場合
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = read_config_file(path.as_ref())?;
        Self::from_toml(&content)
    }

    /// TOML 文字列から実行設定を読み込む
    pub fn from_toml(toml: &str) -> Result<Self, ConfigError> {
        let dto: SettingsDto = toml::from_str(toml)?;
        Self::try_from(dto)
    }

    /// フロー定義ファイルのパス
    pub fn flow_path(&self) -> PathBuf {
        self.config_dir.join("flow.json")
    }

    /// 既定モデル設定ファイルのパス
    pub fn default_model_config_path(&self) -> PathBuf {
        self.config_dir.join("default_model_config.json")
    }

    /// エージェント別モデル設定ファイルのパス
    pub fn agent_config_path(&self) -> PathBuf {
        self.config_dir.join("agent_config.json")
    }
}

impl TryFrom<SettingsDto> for RunSettings {
    type Error = ConfigError;

    fn try_from(dto: SettingsDto) -> Result<Self, Self::Error> {
        let defaults = RunSettings::default();

        let timeout_secs = dto.timeout_secs.unwrap_or(defaults.timeout_secs);
        if timeout_secs == 0 {
            return Err(ConfigError::Validation(
                "timeout_secs は 1 以上である必要があります".to_string(),
            ));
        }

        Ok(Self {
            config_dir: dto.config_dir.unwrap_or(defaults.config_dir),
            prompts_dir: dto.prompts_dir.unwrap_or(defaults.prompts_dir),
            input_dir: dto.input_dir.unwrap_or(defaults.input_dir),
            output_dir: dto.output_dir.unwrap_or(defaults.output_dir),
            log_dir: dto.log_dir.unwrap_or(defaults.log_dir),
            timeout_secs,
            failure_policy: dto.failure_policy.unwrap_or(defaults.failure_policy),
            context_injection: dto.context_injection.unwrap_or(defaults.context_injection),
        })
    }
}
