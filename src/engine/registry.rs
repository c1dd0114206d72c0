//! エージェントの構築と登録
//!
//! # 責務
//!
//! - フローに現れるすべてのエージェントを実行開始時に一度だけ構築する
//! - プロバイダー解決や認証情報の不足による構築失敗を記録する
//!   （その時点では実行を止めず、該当エージェントを通る経路だけを止める）
//! - 実行中は読み取り専用で共有される

use std::collections::HashMap;
use std::time::Duration;

use crate::agent::Agent;
use crate::agent::prompt::PromptStore;
use crate::config::flow::FlowGraph;
use crate::config::model::{ModelCatalog, ModelConfig};
use crate::config::settings::RunSettings;
use crate::error::{ConfigError, ProviderError};
use crate::provider::{ChatClient, EnvSecrets, SecretSource, create_provider};

/// エージェントごとに [`ChatClient`] を生成するファクトリー
pub trait ClientFactory: Send + Sync {
    fn create(
        &self,
        agent: &str,
        config: &ModelConfig,
    ) -> Result<Box<dyn ChatClient>, ProviderError>;
}

/// HTTP プロバイダークライアントを生成する既定のファクトリー
pub struct HttpClientFactory {
    secrets: Box<dyn SecretSource>,
}

impl HttpClientFactory {
    pub fn new(secrets: impl SecretSource + 'static) -> Self {
        Self {
            secrets: Box::new(secrets),
        }
    }

    /// 環境変数から認証情報を読むファクトリー
    pub fn from_env() -> Self {
        Self::new(EnvSecrets)
    }
}

impl ClientFactory for HttpClientFactory {
    fn create(
        &self,
        _agent: &str,
        config: &ModelConfig,
    ) -> Result<Box<dyn ChatClient>, ProviderError> {
        create_provider(config, self.secrets.as_ref())
    }
}

/// 登録済みエージェントの状態
pub enum AgentSlot {
    Ready(Agent),
    /// 構築に失敗したエージェント。このノードと後続は実行されない
    Unavailable(ProviderError),
}

/// エージェント名 → エージェント の読み取り専用テーブル
#[derive(Default)]
pub struct AgentRegistry {
    slots: HashMap<String, AgentSlot>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// フローに現れるすべてのエージェントを構築する
    ///
    /// # エラー
    ///
    /// プロンプトファイルが読めない場合は [`ConfigError`] を返します。
    /// クライアントの生成失敗はエラーにせず、[`AgentSlot::Unavailable`] として記録します。
    pub fn build(
        graph: &FlowGraph,
        catalog: &ModelCatalog,
        prompts: &PromptStore,
        factory: &dyn ClientFactory,
        settings: &RunSettings,
    ) -> Result<Self, ConfigError> {
        for configured in catalog.configured_agents() {
            if !graph.contains(configured) {
                tracing::warn!(agent = configured, "model override for an agent not in the flow");
            }
        }

        let mut registry = Self::new();
        for name in graph.nodes() {
            tracing::info!(agent = name, "initializing agent");
            let config = catalog.resolve(name);
            let agent_prompts = prompts.load(name)?;

            match factory.create(name, &config) {
                Ok(client) => {
                    let agent = Agent::new(name, config, agent_prompts, client)
                        .with_timeout(Duration::from_secs(settings.timeout_secs))
                        .with_context_injection(settings.context_injection);
                    registry.insert(agent);
                }
                Err(e) => {
                    tracing::error!(agent = name, error = %e, "failed to construct agent");
                    registry.insert_unavailable(name, e);
                }
            }
        }
        Ok(registry)
    }

    pub fn insert(&mut self, agent: Agent) {
        self.slots
            .insert(agent.name().to_string(), AgentSlot::Ready(agent));
    }

    pub fn insert_unavailable(&mut self, name: &str, error: ProviderError) {
        self.slots
            .insert(name.to_string(), AgentSlot::Unavailable(error));
    }

    /// エージェントを取得する
    ///
    /// # エラー
    ///
    /// 登録されていない名前の場合は [`ConfigError::UnknownAgent`]。
    pub fn get(&self, name: &str) -> Result<&AgentSlot, ConfigError> {
        self.slots
            .get(name)
            .ok_or_else(|| ConfigError::UnknownAgent(name.to_string()))
    }

    /// 構築に失敗したエージェント名（ソート済み）
    pub fn unavailable(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .slots
            .iter()
            .filter(|(_, slot)| matches!(slot, AgentSlot::Unavailable(_)))
            .map(|(name, _)| name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}
