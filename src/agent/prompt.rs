//! プロンプトファイルの読み込みと雛形生成
//!
//! # ディレクトリ構成
//!
//! ```text
//! prompts/
//! └── {agent}/
//!     ├── system.txt          # システムプロンプト（省略時は既定文）
//!     └── user_template.txt   # ユーザープロンプトテンプレート（省略時は空）
//! ```

use std::io;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// `system.txt` が存在しない場合のシステムプロンプト
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

const SYSTEM_FILE: &str = "system.txt";
const USER_TEMPLATE_FILE: &str = "user_template.txt";

/// エージェント1つ分のプロンプト
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub system: String,
    pub user_template: String,
}

/// プロンプトディレクトリ
#[derive(Debug, Clone)]
pub struct PromptStore {
    root: PathBuf,
}

impl PromptStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn agent_dir(&self, agent: &str) -> PathBuf {
        self.root.join(agent)
    }

    /// エージェントのプロンプトを読み込む
    ///
    /// ファイルが存在しない場合は既定値を使います。存在するが読めない場合は
    /// [`ConfigError::FileRead`] を返します。
    pub fn load(&self, agent: &str) -> Result<Prompts, ConfigError> {
        let dir = self.agent_dir(agent);

        let system = read_optional(&dir.join(SYSTEM_FILE))?.unwrap_or_else(|| {
            tracing::debug!(agent, "no system prompt file, using default");
            DEFAULT_SYSTEM_PROMPT.to_string()
        });

        let user_template = read_optional(&dir.join(USER_TEMPLATE_FILE))?.unwrap_or_else(|| {
            tracing::warn!(agent, "no user prompt template, sending an empty user prompt");
            String::new()
        });

        Ok(Prompts {
            system,
            user_template,
        })
    }

    /// エージェントのプロンプトフォルダと既定テンプレートを作成する
    ///
    /// 既存のファイルは上書きしません。新たに作成したファイルのパスを返します。
    ///
    /// # エラー
    ///
    /// エージェント名が空、またはパス区切りを含む場合は [`io::ErrorKind::InvalidInput`]。
    pub fn scaffold(&self, agent: &str) -> io::Result<Vec<PathBuf>> {
        if agent.trim().is_empty()
            || agent.contains(['/', '\\'])
            || agent == "."
            || agent == ".."
        {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("invalid agent name: {agent:?}"),
            ));
        }

        let dir = self.agent_dir(agent);
        std::fs::create_dir_all(&dir)?;

        let defaults = [
            (
                SYSTEM_FILE,
                format!("You are a helpful assistant specialized in {agent} tasks."),
            ),
            (
                USER_TEMPLATE_FILE,
                "Process the following input.\n\n{{input}}\n".to_string(),
            ),
        ];

        let mut created = Vec::new();
        for (file, content) in defaults {
            let path = dir.join(file);
            if path.exists() {
                continue;
            }
            std::fs::write(&path, content)?;
            created.push(path);
        }
        Ok(created)
    }
}

fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(ConfigError::FileRead {
            path: path.to_path_buf(),
            source,
        }),
    }
}
