//! 成果物（エージェント出力ファイル）の保存と読み出し
//!
//! 成果物は `{output_root}/{入力ファイルのstem}/{agent}.txt` に保存されます。
//! 書き込みは同じディレクトリの一時ファイルに行い、最後にリネームするため、
//! 途中で中断しても書きかけのファイルが最終パスに残ることはありません。

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use super::result::ExecutionError;

/// 出力ディレクトリのレイアウト
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// 入力ファイルに対応する出力サブディレクトリ
    pub fn output_dir(&self, input: &Path) -> PathBuf {
        self.root.join(input_stem(input))
    }

    /// (入力ファイル, エージェント) に対応する成果物のパス
    pub fn artifact_path(&self, input: &Path, agent: &str) -> PathBuf {
        self.output_dir(input).join(format!("{agent}.txt"))
    }
}

/// 入力ファイル名から拡張子を除いた部分
pub fn input_stem(input: &Path) -> String {
    input
        .file_stem()
        .or_else(|| input.file_name())
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "input".to_string())
}

/// 成果物を書き込む（親ディレクトリは必要に応じて作成）
///
/// 書き込んだバイト列はテキストそのままで、変換は行いません。
pub async fn write_artifact(path: &Path, text: &str) -> Result<(), ExecutionError> {
    let to_error = |source| ExecutionError::Artifact {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(to_error)?;
    }

    let partial = partial_path(path);
    let written = async {
        let mut file = tokio::fs::File::create(&partial).await?;
        file.write_all(text.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&partial, path).await
    }
    .await;

    if let Err(e) = written {
        let _ = tokio::fs::remove_file(&partial).await;
        return Err(to_error(e));
    }
    Ok(())
}

/// 成果物を読み出す
pub async fn read_artifact(path: &Path) -> Result<String, ExecutionError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ExecutionError::Artifact {
            path: path.to_path_buf(),
            source,
        })
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!(".{name}.partial"))
}
