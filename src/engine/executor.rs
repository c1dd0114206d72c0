//! フロー実行エンジン
//!
//! # 責務
//!
//! このモジュールは、入力ディレクトリの各ファイルに対してフローを実行する
//! [`Orchestrator`] を提供します。
//!
//! # 実行フロー
//!
//! 1. 入力ディレクトリのファイルを列挙（1階層、拡張子を問わない、名前順）
//! 2. ファイルごとに `{output_root}/{stem}` を作成
//! 3. ルートから深さ優先でトラバース
//!    - エージェントを実行し成果物を保存
//!    - 成果物を読み戻し、コンテキストのコピーに追加
//!    - 後続を宣言順に実行（入力は今のノードの成果物）
//! 4. 結果を [`RunReport`] にまとめて返す
//!
//! トラバーサルは明示的なスタックで行い、コンテキストは不変の値として
//! 各フレームに持たせます。1つの入力ファイルの中で同じノードが実行されるのは
//! 1回だけです（2つ目の親から到達した場合はスキップ）。
//!
//! # 使用例
//!
//! ```rust,no_run
//! use agentflow::config::settings::RunSettings;
//! use agentflow::engine::executor::Orchestrator;
//! use agentflow::engine::registry::HttpClientFactory;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = RunSettings::default();
//!     let orchestrator = Orchestrator::from_settings(&settings, &HttpClientFactory::from_env())?;
//!
//!     let report = orchestrator.run().await?;
//!     println!("失敗ノード数: {}", report.failed_nodes());
//!     Ok(())
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use crate::agent::AgentOutcome;
use crate::agent::prompt::PromptStore;
use crate::config::flow::FlowGraph;
use crate::config::model::ModelCatalog;
use crate::config::settings::{FailurePolicy, RunSettings};
use crate::engine::artifact::{ArtifactStore, read_artifact};
use crate::engine::context::ContextBundle;
use crate::engine::registry::{AgentRegistry, AgentSlot, ClientFactory};
use crate::engine::result::{ExecutionError, FileReport, NodeResult, NodeStatus, RunReport};

/// トラバーサルスタックの1フレーム
struct Frame {
    agent: String,
    input: PathBuf,
    context: ContextBundle,
}

/// フロー実行エンジン
///
/// フロー定義とエージェントテーブルは構築後に変更されず、
/// すべての入力ファイルで共有されます。
pub struct Orchestrator {
    graph: FlowGraph,
    registry: AgentRegistry,
    store: ArtifactStore,
    input_dir: PathBuf,
    policy: FailurePolicy,
}

impl Orchestrator {
    /// 新しいエンジンを生成
    ///
    /// 入力ディレクトリは既定で `repository`、失敗ポリシーは [`FailurePolicy::Contain`] です。
    pub fn new(graph: FlowGraph, registry: AgentRegistry, store: ArtifactStore) -> Self {
        Self {
            graph,
            registry,
            store,
            input_dir: PathBuf::from("repository"),
            policy: FailurePolicy::default(),
        }
    }

    pub fn with_input_dir(mut self, input_dir: impl Into<PathBuf>) -> Self {
        self.input_dir = input_dir.into();
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 実行設定からエンジンを組み立てる
    ///
    /// フロー定義・モデル設定・プロンプトを読み込み、すべてのエージェントを構築します。
    ///
    /// # エラー
    ///
    /// - [`ExecutionError::ConfigError`] - フロー定義やモデル設定が存在しない・不正
    pub fn from_settings(
        settings: &RunSettings,
        factory: &dyn ClientFactory,
    ) -> Result<Self, ExecutionError> {
        let graph = FlowGraph::from_file(settings.flow_path())?;
        let catalog = ModelCatalog::load(
            settings.default_model_config_path(),
            settings.agent_config_path(),
        )?;
        let prompts = PromptStore::new(&settings.prompts_dir);
        let registry = AgentRegistry::build(&graph, &catalog, &prompts, factory, settings)?;

        Ok(Self::new(graph, registry, ArtifactStore::new(&settings.output_dir))
            .with_input_dir(&settings.input_dir)
            .with_failure_policy(settings.failure_policy))
    }

    /// 入力ディレクトリのすべてのファイルに対してフローを実行する
    pub async fn run(&self) -> Result<RunReport, ExecutionError> {
        let start_time = SystemTime::now();
        let started = Instant::now();

        let inputs = self.discover_inputs().await?;
        tracing::info!(
            input_dir = %self.input_dir.display(),
            files = inputs.len(),
            root = self.graph.root(),
            "starting run"
        );

        let mut seen_stems = HashSet::new();
        let mut files = Vec::with_capacity(inputs.len());
        for input in inputs {
            let output_dir = self.store.output_dir(&input);
            if !seen_stems.insert(output_dir.clone()) {
                tracing::warn!(
                    input = %input.display(),
                    output_dir = %output_dir.display(),
                    "another input file shares this stem, artifacts will be overwritten"
                );
            }
            files.push(self.run_file(&input).await?);
        }

        Ok(RunReport {
            files,
            start_time,
            end_time: SystemTime::now(),
            total_duration: started.elapsed(),
        })
    }

    /// 入力ファイル1つに対してフローを実行する
    pub async fn run_file(&self, input: &Path) -> Result<FileReport, ExecutionError> {
        tracing::info!(input = %input.display(), "processing input file");

        let output_dir = self.store.output_dir(input);
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|source| ExecutionError::Artifact {
                path: output_dir.clone(),
                source,
            })?;

        let mut nodes = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut stack = vec![Frame {
            agent: self.graph.root().to_string(),
            input: input.to_path_buf(),
            context: ContextBundle::new(),
        }];

        while let Some(frame) = stack.pop() {
            if !visited.insert(frame.agent.clone()) {
                tracing::debug!(agent = %frame.agent, "already executed for this input, skipping");
                continue;
            }

            let agent = match self.registry.get(&frame.agent)? {
                AgentSlot::Ready(agent) => agent,
                AgentSlot::Unavailable(error) => {
                    tracing::error!(
                        agent = %frame.agent,
                        error = %error,
                        "agent unavailable, skipping it and its successors"
                    );
                    nodes.push(NodeResult {
                        agent: frame.agent,
                        status: NodeStatus::Blocked {
                            message: error.to_string(),
                        },
                        artifact: None,
                        duration: Duration::ZERO,
                    });
                    continue;
                }
            };

            let output_path = self.store.artifact_path(input, &frame.agent);
            let started = Instant::now();
            let outcome = agent.run(&frame.input, &output_path, &frame.context).await?;
            let duration = started.elapsed();

            let status = match outcome {
                AgentOutcome::Completed(_) => NodeStatus::Completed,
                AgentOutcome::Failed(error) => {
                    if self.policy == FailurePolicy::Halt {
                        return Err(ExecutionError::AgentExecution {
                            agent: frame.agent,
                            source: error,
                        });
                    }
                    NodeStatus::Failed {
                        message: error.to_string(),
                    }
                }
            };

            let output = read_artifact(&output_path).await?;
            let context = frame.context.extended(&frame.agent, output);

            for next in self.graph.successors(&frame.agent).iter().rev() {
                stack.push(Frame {
                    agent: next.clone(),
                    input: output_path.clone(),
                    context: context.clone(),
                });
            }

            nodes.push(NodeResult {
                agent: frame.agent,
                status,
                artifact: Some(output_path),
                duration,
            });
        }

        Ok(FileReport {
            input: input.to_path_buf(),
            output_dir,
            nodes,
        })
    }

    /// 入力ディレクトリ直下の通常ファイルを名前順に列挙する
    ///
    /// ディレクトリが存在しない場合は作成し、空の一覧を返します。
    async fn discover_inputs(&self) -> Result<Vec<PathBuf>, ExecutionError> {
        let to_error = |source| ExecutionError::InputDiscovery {
            path: self.input_dir.clone(),
            source,
        };

        tokio::fs::create_dir_all(&self.input_dir)
            .await
            .map_err(to_error)?;

        let mut entries = tokio::fs::read_dir(&self.input_dir)
            .await
            .map_err(to_error)?;
        let mut inputs = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(to_error)? {
            if entry.file_type().await.map_err(to_error)?.is_file() {
                inputs.push(entry.path());
            }
        }
        inputs.sort();
        Ok(inputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Agent;
    use crate::agent::prompt::Prompts;
    use crate::config::model::ModelConfig;
    use crate::error::ProviderError;
    use crate::provider::{ChatClient, ChatMessage, ChatResponse, TokenUsage};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    /// 呼び出し順とユーザープロンプトを記録するモック
    ///
    /// 応答は `"{agent} saw: {user prompt}"`。`fail` が真なら常に失敗する。
    struct RecordingClient {
        agent: String,
        fail: bool,
        log: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl ChatClient for RecordingClient {
        async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ProviderError> {
            let user = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            self.log.lock().unwrap().push((self.agent.clone(), user.clone()));
            if self.fail {
                return Err(ProviderError::Http {
                    status: 500,
                    body: "upstream exploded".to_string(),
                });
            }
            Ok(ChatResponse {
                content: format!("{} saw: {}", self.agent, user),
                token_usage: TokenUsage::default(),
                model: "mock-model".to_string(),
            })
        }
    }

    struct Fixture {
        dir: tempfile::TempDir,
        log: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            std::fs::create_dir_all(dir.path().join("repository")).unwrap();
            Self {
                dir,
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn input(&self, name: &str, content: &str) -> PathBuf {
            let path = self.dir.path().join("repository").join(name);
            std::fs::write(&path, content).unwrap();
            path
        }

        fn output(&self, relative: &str) -> PathBuf {
            self.dir.path().join("output").join(relative)
        }

        /// `templates` の各エージェントを登録し、`failing` に含まれるものは失敗させる
        fn orchestrator(
            &self,
            flow: &str,
            templates: &[(&str, &str)],
            failing: &[&str],
        ) -> Orchestrator {
            let mut registry = AgentRegistry::new();
            for (name, template) in templates {
                let client = RecordingClient {
                    agent: name.to_string(),
                    fail: failing.contains(name),
                    log: Arc::clone(&self.log),
                };
                registry.insert(Agent::new(
                    *name,
                    ModelConfig::default(),
                    Prompts {
                        system: "You are a helpful assistant.".to_string(),
                        user_template: template.to_string(),
                    },
                    Box::new(client),
                ));
            }

            Orchestrator::new(
                FlowGraph::from_json(flow).unwrap(),
                registry,
                ArtifactStore::new(self.dir.path().join("output")),
            )
            .with_input_dir(self.dir.path().join("repository"))
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.log.lock().unwrap().clone()
        }
    }

    #[tokio::test]
    async fn test_fan_out_siblings_share_only_ancestors() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "source text");
        let orchestrator = fx.orchestrator(
            r#"{"A": ["B", "C"], "B": [], "C": []}"#,
            &[
                ("A", "{{input}}"),
                ("B", "B got [{{A}}]"),
                ("C", "C got [{{A}}] and [{{B}}]"),
            ],
            &[],
        );

        let report = orchestrator.run_file(&input).await.unwrap();

        assert_eq!(report.visit_order(), vec!["A", "B", "C"]);
        assert_eq!(
            std::fs::read_to_string(fx.output("doc/A.txt")).unwrap(),
            "A saw: source text"
        );
        assert_eq!(
            std::fs::read_to_string(fx.output("doc/B.txt")).unwrap(),
            "B saw: B got [A saw: source text]"
        );
        // C のコンテキストに B は含まれないため、テンプレートは原文のまま送られる
        assert_eq!(
            std::fs::read_to_string(fx.output("doc/C.txt")).unwrap(),
            "C saw: C got [{{A}}] and [{{B}}]"
        );
    }

    #[tokio::test]
    async fn test_depth_first_in_declared_order() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "x");
        let orchestrator = fx.orchestrator(
            r#"{"A": ["C", "B"], "C": ["D"], "B": ["E"]}"#,
            &[("A", ""), ("B", ""), ("C", ""), ("D", ""), ("E", "")],
            &[],
        );

        let report = orchestrator.run_file(&input).await.unwrap();

        assert_eq!(report.visit_order(), vec!["A", "C", "D", "B", "E"]);
        let called: Vec<String> = fx.calls().into_iter().map(|(agent, _)| agent).collect();
        assert_eq!(called, vec!["A", "C", "D", "B", "E"]);
    }

    #[tokio::test]
    async fn test_child_input_is_parent_artifact() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "original");
        let orchestrator = fx.orchestrator(
            r#"{"A": ["B"]}"#,
            &[("A", "{{input}}"), ("B", "{{input}}")],
            &[],
        );

        orchestrator.run_file(&input).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(fx.output("doc/B.txt")).unwrap(),
            "B saw: A saw: original"
        );
    }

    #[tokio::test]
    async fn test_failed_node_writes_sentinel_and_traversal_continues() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "x");
        let orchestrator = fx.orchestrator(
            r#"{"A": ["B", "C"]}"#,
            &[("A", "{{input}}"), ("B", "{{A}}"), ("C", "{{A}}")],
            &["A"],
        );

        let report = orchestrator.run_file(&input).await.unwrap();

        let sentinel = "[ERROR from A: HTTP 500 が返されました: upstream exploded]";
        assert_eq!(std::fs::read_to_string(fx.output("doc/A.txt")).unwrap(), sentinel);
        assert_eq!(report.visit_order(), vec!["A", "B", "C"]);
        assert_eq!(report.failed_nodes(), 1);
        assert_eq!(
            std::fs::read_to_string(fx.output("doc/B.txt")).unwrap(),
            format!("B saw: {sentinel}")
        );
    }

    #[tokio::test]
    async fn test_halt_policy_stops_traversal() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "x");
        let orchestrator = fx
            .orchestrator(r#"{"A": ["B"]}"#, &[("A", ""), ("B", "")], &["A"])
            .with_failure_policy(FailurePolicy::Halt);

        let result = orchestrator.run_file(&input).await;

        assert!(matches!(
            result,
            Err(ExecutionError::AgentExecution { ref agent, .. }) if agent == "A"
        ));
        assert!(fx.output("doc/A.txt").exists());
        assert!(!fx.output("doc/B.txt").exists());
    }

    #[tokio::test]
    async fn test_unavailable_agent_blocks_its_subtree() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "x");
        let mut orchestrator = fx.orchestrator(
            r#"{"A": ["B", "D"], "B": ["C"]}"#,
            &[("A", ""), ("C", ""), ("D", "")],
            &[],
        );
        orchestrator
            .registry
            .insert_unavailable("B", ProviderError::UnsupportedProvider("unknown".to_string()));

        let report = orchestrator.run_file(&input).await.unwrap();

        assert_eq!(report.visit_order(), vec!["A", "B", "D"]);
        assert_eq!(report.blocked_nodes(), 1);
        assert!(!fx.output("doc/B.txt").exists());
        assert!(!fx.output("doc/C.txt").exists());
        assert!(fx.output("doc/D.txt").exists());
    }

    #[tokio::test]
    async fn test_diamond_node_runs_once() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "x");
        let orchestrator = fx.orchestrator(
            r#"{"A": ["B", "C"], "B": ["D"], "C": ["D"]}"#,
            &[("A", ""), ("B", ""), ("C", ""), ("D", "")],
            &[],
        );

        let report = orchestrator.run_file(&input).await.unwrap();

        assert_eq!(report.visit_order(), vec!["A", "B", "D", "C"]);
        assert_eq!(fx.calls().len(), 4);
    }

    #[tokio::test]
    async fn test_unknown_agent_is_config_error() {
        let fx = Fixture::new();
        let input = fx.input("doc.txt", "x");
        let orchestrator = fx.orchestrator(r#"{"A": ["ghost"]}"#, &[("A", "")], &[]);

        let result = orchestrator.run_file(&input).await;
        assert!(matches!(result, Err(ExecutionError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_run_processes_every_file_independently() {
        let fx = Fixture::new();
        fx.input("b.md", "second");
        fx.input("a.txt", "first");
        fx.input("noext", "third");
        std::fs::create_dir_all(fx.dir.path().join("repository").join("nested")).unwrap();
        let orchestrator = fx.orchestrator(
            r#"{"A": ["B"]}"#,
            &[("A", "{{input}}"), ("B", "{{A}}")],
            &[],
        );

        let report = orchestrator.run().await.unwrap();

        let inputs: Vec<String> = report
            .files
            .iter()
            .map(|f| f.input.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(inputs, vec!["a.txt", "b.md", "noext"]);
        assert_eq!(report.executed_nodes(), 6);
        assert!(!report.has_fatal());
        assert_eq!(
            std::fs::read_to_string(fx.output("b/B.txt")).unwrap(),
            "B saw: A saw: second"
        );
        assert!(fx.output("noext/A.txt").exists());
    }

    #[tokio::test]
    async fn test_run_creates_missing_input_dir() {
        let fx = Fixture::new();
        let orchestrator = fx
            .orchestrator(r#"{"A": []}"#, &[("A", "")], &[])
            .with_input_dir(fx.dir.path().join("fresh"));

        let report = orchestrator.run().await.unwrap();

        assert!(report.files.is_empty());
        assert!(fx.dir.path().join("fresh").is_dir());
    }
}
