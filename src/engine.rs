//! フロー実行エンジン
//!
//! # 責務
//!
//! - フロー定義に従い、入力ファイルごとにエージェントを深さ優先で実行
//! - 親の成果物を子の入力として受け渡し、祖先の出力をコンテキストとして蓄積
//! - 成果物のファイル保存
//! - 実行結果の記録
//!
//! # モジュール構成
//!
//! - [`executor`][]: フロー実行エンジン本体
//! - [`registry`][]: エージェントの構築と登録
//! - [`context`][]: 祖先出力のコンテキスト
//! - [`artifact`][]: 成果物の保存先と読み書き
//! - [`result`][]: 実行結果型とエラー
//!
//! # 使用例
//!
//! ```rust,no_run
//! use agentflow::config::settings::RunSettings;
//! use agentflow::engine::{HttpClientFactory, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 1. 実行設定を読み込む
//!     let settings = RunSettings::from_file("agentflow.toml")?;
//!
//!     // 2. フロー定義とエージェントを読み込む
//!     let orchestrator = Orchestrator::from_settings(&settings, &HttpClientFactory::from_env())?;
//!
//!     // 3. 入力ディレクトリのすべてのファイルを処理
//!     let report = orchestrator.run().await?;
//!
//!     // 4. 結果を出力
//!     for file in &report.files {
//!         println!("{}: {:?}", file.input.display(), file.visit_order());
//!     }
//!     println!("Duration: {:?}", report.total_duration);
//!
//!     Ok(())
//! }
//! ```

pub mod artifact;
pub mod context;
pub mod executor;
pub mod registry;
pub mod result;

// 公開APIの再エクスポート
pub use artifact::ArtifactStore;
pub use context::{ContextBundle, ContextEntry};
pub use executor::Orchestrator;
pub use registry::{AgentRegistry, AgentSlot, ClientFactory, HttpClientFactory};
pub use result::{ExecutionError, FileReport, NodeResult, NodeStatus, RunReport};
