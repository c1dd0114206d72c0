//! agentflow
//!
//! 入力ファイルのフォルダーに対して、LLM エージェントの有向フローを実行します。
//!
//! - [`config`][]: 実行設定・フロー定義・モデル設定の読み込み
//! - [`agent`][]: LLM 呼び出し1回分をラップするエージェント
//! - [`provider`][]: LLM プロバイダーのクライアント
//! - [`engine`][]: フロー実行エンジン
//! - [`logging`][]: ログ出力の初期化

pub mod agent;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod provider;
