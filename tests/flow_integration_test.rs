use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use agentflow::config::model::ModelConfig;
use agentflow::config::settings::{ContextInjection, FailurePolicy, RunSettings};
use agentflow::engine::{ClientFactory, ExecutionError, NodeStatus, Orchestrator};
use agentflow::error::ProviderError;
use agentflow::provider::{
    ChatClient, ChatMessage, ChatResponse, Role, TokenUsage, create_provider,
};
use async_trait::async_trait;

type CallLog = Arc<Mutex<Vec<(String, Vec<ChatMessage>)>>>;

/// ユーザープロンプトをそのまま返すモック
///
/// モデル名が `fail` のエージェントは常に失敗する。
struct EchoClient {
    agent: String,
    fail: bool,
    log: CallLog,
}

#[async_trait]
impl ChatClient for EchoClient {
    async fn chat(&self, messages: &[ChatMessage]) -> Result<ChatResponse, ProviderError> {
        self.log
            .lock()
            .unwrap()
            .push((self.agent.clone(), messages.to_vec()));
        if self.fail {
            return Err(ProviderError::Network("connection refused".to_string()));
        }
        let user = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        Ok(ChatResponse {
            content: format!("<{}>{}</{}>", self.agent, user, self.agent),
            token_usage: TokenUsage::default(),
            model: "echo".to_string(),
        })
    }
}

/// `openai` プロバイダーはモックに差し替え、それ以外は実際の解決処理に任せる
struct EchoFactory {
    log: CallLog,
}

impl ClientFactory for EchoFactory {
    fn create(
        &self,
        agent: &str,
        config: &ModelConfig,
    ) -> Result<Box<dyn ChatClient>, ProviderError> {
        if config.provider != "openai" {
            return create_provider(config, &HashMap::<String, String>::new());
        }
        Ok(Box::new(EchoClient {
            agent: agent.to_string(),
            fail: config.model == "fail",
            log: Arc::clone(&self.log),
        }))
    }
}

struct Workspace {
    dir: tempfile::TempDir,
    log: CallLog,
}

impl Workspace {
    fn new(flow: &str, agent_config: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("config")).unwrap();
        std::fs::create_dir_all(root.join("repository")).unwrap();
        std::fs::write(root.join("config/flow.json"), flow).unwrap();
        std::fs::write(
            root.join("config/default_model_config.json"),
            r#"{"model": "echo-model", "temperature": 0.2}"#,
        )
        .unwrap();
        std::fs::write(root.join("config/agent_config.json"), agent_config).unwrap();

        Self {
            dir,
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn prompt(&self, agent: &str, system: &str, user_template: &str) {
        let dir = self.root().join("prompts").join(agent);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("system.txt"), system).unwrap();
        std::fs::write(dir.join("user_template.txt"), user_template).unwrap();
    }

    fn input(&self, name: &str, content: &str) {
        std::fs::write(self.root().join("repository").join(name), content).unwrap();
    }

    fn settings(&self) -> RunSettings {
        RunSettings {
            config_dir: self.root().join("config"),
            prompts_dir: self.root().join("prompts"),
            input_dir: self.root().join("repository"),
            output_dir: self.root().join("output"),
            log_dir: self.root().join("logs"),
            ..RunSettings::default()
        }
    }

    fn orchestrator(&self, settings: &RunSettings) -> Orchestrator {
        let factory = EchoFactory {
            log: Arc::clone(&self.log),
        };
        Orchestrator::from_settings(settings, &factory).expect("フローの読み込みに失敗")
    }

    fn artifact(&self, relative: &str) -> PathBuf {
        self.root().join("output").join(relative)
    }

    fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.artifact(relative)).unwrap()
    }

    fn calls(&self) -> Vec<(String, Vec<ChatMessage>)> {
        self.log.lock().unwrap().clone()
    }
}

#[tokio::test]
async fn test_fan_out_writes_every_artifact() {
    let ws = Workspace::new(r#"{"A": ["B", "C"], "B": [], "C": []}"#, "{}");
    ws.prompt("A", "You summarize.", "Summarize: {{input}}");
    ws.prompt("B", "You critique.", "Critique {{A}}");
    ws.prompt("C", "You translate.", "Translate {{A}} ignoring {{B}}");
    ws.input("doc.txt", "hello world");

    let report = ws.orchestrator(&ws.settings()).run().await.unwrap();

    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].visit_order(), vec!["A", "B", "C"]);
    assert!(!report.has_fatal());

    let a = ws.read("doc/A.txt");
    assert_eq!(a, "<A>Summarize: hello world</A>");
    assert_eq!(ws.read("doc/B.txt"), format!("<B>Critique {a}</B>"));
    // C の祖先は A のみ。B を参照するテンプレートは原文のまま送られる
    assert_eq!(
        ws.read("doc/C.txt"),
        "<C>Translate {{A}} ignoring {{B}}</C>"
    );
}

#[tokio::test]
async fn test_messages_start_with_system_prompt() {
    let ws = Workspace::new(r#"{"A": ["B"]}"#, "{}");
    ws.prompt("A", "You summarize.", "{{input}}");
    ws.input("doc.txt", "text");

    ws.orchestrator(&ws.settings()).run().await.unwrap();

    let calls = ws.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].1[0].role, Role::System);
    assert_eq!(calls[0].1[0].content, "You summarize.");
    // B はプロンプトフォルダーがないため既定のシステムプロンプトを使う
    assert_eq!(calls[1].1[0].content, "You are a helpful assistant.");
    assert_eq!(calls[1].1.last().unwrap().role, Role::User);
}

#[tokio::test]
async fn test_context_as_messages() {
    let ws = Workspace::new(r#"{"A": ["B"], "B": ["C"]}"#, "{}");
    ws.prompt("A", "s", "{{input}}");
    ws.prompt("B", "s", "next");
    ws.prompt("C", "s", "last");
    ws.input("doc.txt", "text");

    let settings = RunSettings {
        context_injection: ContextInjection::Messages,
        ..ws.settings()
    };
    ws.orchestrator(&settings).run().await.unwrap();

    let calls = ws.calls();
    let (agent, messages) = &calls[2];
    assert_eq!(agent, "C");
    let roles: Vec<Role> = messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![Role::System, Role::Assistant, Role::Assistant, Role::User]
    );
    assert_eq!(messages[1].content, "[Context from A]:\n<A>text</A>");
    assert_eq!(messages[2].content, "[Context from B]:\n<B>next</B>");
}

#[tokio::test]
async fn test_failure_is_contained_and_traversal_continues() {
    let ws = Workspace::new(
        r#"{"A": ["B", "C"], "B": ["D"]}"#,
        r#"{"B": {"model": "fail"}}"#,
    );
    ws.prompt("D", "s", "after {{B}}");
    ws.input("doc.txt", "text");

    let report = ws.orchestrator(&ws.settings()).run().await.unwrap();

    let sentinel = "[ERROR from B: ネットワークエラー: connection refused]";
    assert_eq!(ws.read("doc/B.txt"), sentinel);
    assert_eq!(ws.read("doc/D.txt"), format!("<D>after {sentinel}</D>"));
    assert!(ws.artifact("doc/C.txt").exists());

    let file = &report.files[0];
    assert_eq!(file.visit_order(), vec!["A", "B", "D", "C"]);
    assert!(matches!(
        file.node("B").unwrap().status,
        NodeStatus::Failed { .. }
    ));
    assert_eq!(report.failed_nodes(), 1);
    assert!(!report.has_fatal());
}

#[tokio::test]
async fn test_halt_policy_aborts_run() {
    let ws = Workspace::new(r#"{"A": ["B"]}"#, r#"{"A": {"model": "fail"}}"#);
    ws.input("doc.txt", "text");

    let settings = RunSettings {
        failure_policy: FailurePolicy::Halt,
        ..ws.settings()
    };
    let result = ws.orchestrator(&settings).run().await;

    assert!(matches!(
        result,
        Err(ExecutionError::AgentExecution { ref agent, .. }) if agent == "A"
    ));
    assert!(ws.read("doc/A.txt").starts_with("[ERROR from A: "));
    assert!(!ws.artifact("doc/B.txt").exists());
}

#[tokio::test]
async fn test_unknown_provider_blocks_agent_and_descendants() {
    let ws = Workspace::new(
        r#"{"A": ["B", "C"]}"#,
        r#"{"A": {"provider": "unknown"}}"#,
    );
    ws.input("doc.txt", "text");

    let report = ws.orchestrator(&ws.settings()).run().await.unwrap();

    assert!(report.has_fatal());
    assert_eq!(report.files[0].visit_order(), vec!["A"]);
    assert!(matches!(
        report.files[0].node("A").unwrap().status,
        NodeStatus::Blocked { .. }
    ));
    for agent in ["A", "B", "C"] {
        assert!(!ws.artifact(&format!("doc/{agent}.txt")).exists());
    }
    assert!(ws.calls().is_empty());
}

#[tokio::test]
async fn test_missing_credential_blocks_only_its_path() {
    let ws = Workspace::new(
        r#"{"A": ["B", "C"]}"#,
        r#"{"B": {"provider": "gemini"}}"#,
    );
    ws.input("doc.txt", "text");

    let report = ws.orchestrator(&ws.settings()).run().await.unwrap();

    assert!(report.has_fatal());
    assert_eq!(report.files[0].visit_order(), vec!["A", "B", "C"]);
    assert!(ws.artifact("doc/A.txt").exists());
    assert!(!ws.artifact("doc/B.txt").exists());
    assert!(ws.artifact("doc/C.txt").exists());
}

#[tokio::test]
async fn test_each_input_file_gets_its_own_directory() {
    let ws = Workspace::new(r#"{"A": ["B"]}"#, "{}");
    ws.prompt("A", "s", "{{input}}");
    ws.prompt("B", "s", "{{input}}");
    ws.input("first.txt", "one");
    ws.input("second.md", "two");

    let report = ws.orchestrator(&ws.settings()).run().await.unwrap();

    assert_eq!(report.files.len(), 2);
    assert_eq!(ws.read("first/B.txt"), "<B><A>one</A></B>");
    assert_eq!(ws.read("second/B.txt"), "<B><A>two</A></B>");
    assert_eq!(report.executed_nodes(), 4);
}

#[tokio::test]
async fn test_cyclic_flow_is_rejected() {
    let ws = Workspace::new(r#"{"A": ["B"], "B": ["A"]}"#, "{}");
    let factory = EchoFactory {
        log: Arc::clone(&ws.log),
    };

    let result = Orchestrator::from_settings(&ws.settings(), &factory);
    assert!(matches!(result, Err(ExecutionError::ConfigError(_))));
}

#[tokio::test]
async fn test_missing_model_config_is_rejected() {
    let ws = Workspace::new(r#"{"A": []}"#, "{}");
    std::fs::remove_file(ws.root().join("config/agent_config.json")).unwrap();
    let factory = EchoFactory {
        log: Arc::clone(&ws.log),
    };

    let result = Orchestrator::from_settings(&ws.settings(), &factory);
    assert!(matches!(result, Err(ExecutionError::ConfigError(_))));
}

#[tokio::test]
async fn test_report_serializes() {
    let ws = Workspace::new(r#"{"A": []}"#, "{}");
    ws.input("doc.txt", "text");

    let report = ws.orchestrator(&ws.settings()).run().await.unwrap();
    let json = report.to_json().unwrap();

    assert!(json.contains("\"kind\": \"completed\""));
    assert!(json.contains("doc.txt"));
}

#[tokio::test]
async fn test_agent_name_outside_placeholder_charset_is_rejected() {
    let ws = Workspace::new(r#"{"Code Reviewer": ["Fixer"]}"#, "{}");
    let factory = EchoFactory {
        log: Arc::clone(&ws.log),
    };

    let result = Orchestrator::from_settings(&ws.settings(), &factory);
    assert!(matches!(result, Err(ExecutionError::ConfigError(_))));
}
