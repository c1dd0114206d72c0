//! フロー実行結果の型定義
//!
//! # 責務
//!
//! - ノード実行結果 [`NodeResult`] とステータス [`NodeStatus`] の型定義
//! - 入力ファイル単位の結果 [`FileReport`] と実行全体の結果 [`RunReport`] の型定義
//! - 実行エラー [`ExecutionError`] の型定義
//!
//! # 使用例
//!
//! ```rust,no_run
//! use agentflow::engine::result::RunReport;
//!
//! fn handle_report(report: &RunReport) {
//!     println!("処理ファイル数: {}", report.files.len());
//!     println!("失敗ノード数: {}", report.failed_nodes());
//!     if report.has_fatal() {
//!         println!("構築に失敗したエージェントがあります");
//!     }
//!
//!     if let Ok(json) = report.to_json() {
//!         println!("JSON: {}", json);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use serde::Serialize;
use thiserror::Error;

use crate::error::{AgentError, ConfigError};

/// 実行全体の結果
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// 入力ファイルごとの結果（処理順）
    pub files: Vec<FileReport>,

    /// 実行開始時刻
    pub start_time: SystemTime,

    /// 実行終了時刻
    pub end_time: SystemTime,

    /// 総実行時間
    pub total_duration: Duration,
}

impl RunReport {
    /// 結果をJSON形式でシリアライズ
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// 構築に失敗したエージェントによって止まった経路があるかどうか
    ///
    /// プロセスの終了コードはこの値だけを反映します（ノード単位の LLM 失敗は含まない）。
    pub fn has_fatal(&self) -> bool {
        self.files.iter().any(|file| file.blocked_nodes() > 0)
    }

    /// 全ファイル合計の実行ノード数（Blocked を除く）
    pub fn executed_nodes(&self) -> usize {
        self.files
            .iter()
            .flat_map(|file| &file.nodes)
            .filter(|node| !matches!(node.status, NodeStatus::Blocked { .. }))
            .count()
    }

    /// 全ファイル合計の失敗ノード数
    pub fn failed_nodes(&self) -> usize {
        self.files.iter().map(FileReport::failed_nodes).sum()
    }
}

/// 入力ファイル1つ分の結果
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    /// 入力ファイル
    pub input: PathBuf,

    /// 成果物の出力先ディレクトリ
    pub output_dir: PathBuf,

    /// ノードの実行結果（実行順）
    pub nodes: Vec<NodeResult>,
}

impl FileReport {
    /// 実行順のエージェント名
    pub fn visit_order(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.agent.as_str()).collect()
    }

    pub fn node(&self, agent: &str) -> Option<&NodeResult> {
        self.nodes.iter().find(|node| node.agent == agent)
    }

    pub fn failed_nodes(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.status, NodeStatus::Failed { .. }))
            .count()
    }

    pub fn blocked_nodes(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node.status, NodeStatus::Blocked { .. }))
            .count()
    }
}

/// ノード（エージェント1回分）の実行結果
#[derive(Debug, Clone, Serialize)]
pub struct NodeResult {
    /// エージェント名
    pub agent: String,

    /// 実行ステータス
    pub status: NodeStatus,

    /// 成果物のパス（Blocked の場合は None）
    pub artifact: Option<PathBuf>,

    /// 実行時間
    pub duration: Duration,
}

/// ノードの実行ステータス
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeStatus {
    /// LLM の出力を成果物として保存した
    Completed,

    /// 失敗し、センチネル文字列を成果物として保存した
    Failed { message: String },

    /// エージェントを構築できなかったため実行していない（後続も実行しない）
    Blocked { message: String },
}

/// 実行エラー
///
/// # エラー種別
///
/// - [`ExecutionError::ConfigError`] - 設定エラー（フロー定義・モデル設定・未知のエージェント）
/// - [`ExecutionError::Artifact`] - 成果物の読み書き失敗
/// - [`ExecutionError::InputDiscovery`] - 入力ディレクトリの走査失敗
/// - [`ExecutionError::AgentExecution`] - `halt` ポリシーでのノード失敗
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// 設定エラー
    #[error("設定エラー: {0}")]
    ConfigError(#[from] ConfigError),

    /// 成果物の読み書きに失敗
    #[error("成果物の読み書きに失敗しました: {path}: {source}")]
    Artifact {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// 入力ディレクトリの走査に失敗
    #[error("入力ディレクトリを読み込めませんでした: {path}: {source}")]
    InputDiscovery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// エージェントの実行に失敗（halt ポリシー）
    #[error("エージェント '{agent}' の実行に失敗しました: {source}")]
    AgentExecution {
        agent: String,
        #[source]
        source: AgentError,
    },
}
