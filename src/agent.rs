//! LLM 呼び出し1回分をラップするエージェント
//!
//! # 責務
//!
//! - システムプロンプトとユーザーテンプレートからメッセージ列を組み立てる
//! - [`ChatClient`] をタイムアウト付きで呼び出す
//! - 失敗を [`AgentOutcome::Failed`] として封じ込め、呼び出し元へ例外的に伝播させない
//! - 結果（成功テキストまたはセンチネル文字列）を成果物として保存する
//!
//! # メッセージ列
//!
//! ```text
//! [system]  システムプロンプト
//! [assistant] "[Context from {祖先}]:\n{出力}"   ← context_injection = "messages" のときのみ、祖先ごと
//! [user]    展開済みユーザーテンプレート
//! ```
//!
//! # テンプレート変数
//!
//! - 祖先エージェント名 → その祖先の出力
//! - `input` → このノードの入力ファイルの内容（ルートは入力ファイル、それ以外は親の成果物）
//!
//! 同名の祖先が存在する場合は祖先の出力が優先されます。

pub mod extract;
pub mod prompt;
pub mod template;

use std::path::Path;
use std::time::Duration;

use crate::config::model::ModelConfig;
use crate::config::settings::ContextInjection;
use crate::engine::artifact::write_artifact;
use crate::engine::context::ContextBundle;
use crate::engine::result::ExecutionError;
use crate::error::AgentError;
use crate::provider::{ChatClient, ChatMessage};

use self::extract::extract_block;
use self::prompt::Prompts;
use self::template::render_or_verbatim;

/// テンプレートで入力ファイルの内容を参照する変数名
pub const INPUT_VARIABLE: &str = "input";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// 失敗時に成果物へ書き出すセンチネル文字列
pub fn sentinel(agent: &str, error: &AgentError) -> String {
    format!("[ERROR from {agent}: {error}]")
}

/// エージェント1回の実行結果
#[derive(Debug)]
pub enum AgentOutcome {
    /// LLM が返したテキスト（抽出設定がある場合は抽出後）
    Completed(String),
    /// 封じ込められた失敗
    Failed(AgentError),
}

impl AgentOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, AgentOutcome::Failed(_))
    }

    /// 成果物として保存するテキスト
    pub fn artifact_text(&self, agent: &str) -> String {
        match self {
            AgentOutcome::Completed(text) => text.clone(),
            AgentOutcome::Failed(error) => sentinel(agent, error),
        }
    }
}

/// LLM 呼び出し1回分をラップするエージェント
///
/// 実行開始時に一度だけ構築され、すべての入力ファイルで再利用されます。
/// 呼び出し間で状態を持ちません。
pub struct Agent {
    name: String,
    config: ModelConfig,
    prompts: Prompts,
    client: Box<dyn ChatClient>,
    timeout: Duration,
    injection: ContextInjection,
}

impl Agent {
    pub fn new(
        name: impl Into<String>,
        config: ModelConfig,
        prompts: Prompts,
        client: Box<dyn ChatClient>,
    ) -> Self {
        Self {
            name: name.into(),
            config,
            prompts,
            client,
            timeout: DEFAULT_TIMEOUT,
            injection: ContextInjection::default(),
        }
    }

    /// LLM 呼び出しのタイムアウトを設定
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// 祖先出力の注入方式を設定
    pub fn with_context_injection(mut self, injection: ContextInjection) -> Self {
        self.injection = injection;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// LLM に送るメッセージ列を組み立てる
    ///
    /// 常に `system` で始まり、ちょうど1つの `user` で終わります。
    pub fn build_messages(&self, input: &str, context: &ContextBundle) -> Vec<ChatMessage> {
        let mut vars = context.variables();
        vars.entry(INPUT_VARIABLE).or_insert(input);
        let user_prompt = render_or_verbatim(&self.name, &self.prompts.user_template, &vars);

        let mut messages = vec![ChatMessage::system(self.prompts.system.clone())];
        if self.injection == ContextInjection::Messages {
            messages.extend(context.iter().map(|entry| {
                ChatMessage::assistant(format!(
                    "[Context from {}]:\n{}",
                    entry.agent,
                    entry.output.trim()
                ))
            }));
        }
        messages.push(ChatMessage::user(user_prompt));
        messages
    }

    /// LLM を呼び出し、結果を返す（ファイルには書き込まない）
    ///
    /// LLM 側の失敗は [`AgentOutcome::Failed`] として返され、エラーにはなりません。
    pub async fn invoke(&self, input_path: &Path, context: &ContextBundle) -> AgentOutcome {
        match self.try_invoke(input_path, context).await {
            Ok(text) => AgentOutcome::Completed(text),
            Err(e) => {
                tracing::error!(agent = %self.name, error = %e, "agent call failed");
                AgentOutcome::Failed(e)
            }
        }
    }

    /// LLM を呼び出し、結果を `output_path` に保存する
    ///
    /// # 戻り値
    ///
    /// - `Ok(AgentOutcome)`: 成果物を保存できた場合（LLM の失敗もここに含まれる）
    /// - `Err(ExecutionError::Artifact)`: 成果物の書き込みに失敗した場合
    pub async fn run(
        &self,
        input_path: &Path,
        output_path: &Path,
        context: &ContextBundle,
    ) -> Result<AgentOutcome, ExecutionError> {
        tracing::info!(agent = %self.name, input = %input_path.display(), "running agent");
        let outcome = self.invoke(input_path, context).await;

        tracing::debug!(agent = %self.name, path = %output_path.display(), "writing artifact");
        write_artifact(output_path, &outcome.artifact_text(&self.name)).await?;
        Ok(outcome)
    }

    async fn try_invoke(
        &self,
        input_path: &Path,
        context: &ContextBundle,
    ) -> Result<String, AgentError> {
        let input = read_input(input_path).await?;
        let messages = self.build_messages(&input, context);

        tracing::debug!(agent = %self.name, messages = messages.len(), "sending request to LLM");
        let response = tokio::time::timeout(self.timeout, self.client.chat(&messages))
            .await
            .map_err(|_| AgentError::Timeout {
                secs: self.timeout.as_secs(),
            })??;

        match &self.config.extract_tag {
            Some(tag) => Ok(extract_block(&response.content, tag)?),
            None => Ok(response.content),
        }
    }
}

/// 入力ファイルを読み込む（UTF-8 として不正なバイトは置換する）
async fn read_input(path: &Path) -> Result<String, AgentError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|source| AgentError::InputRead {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
