//! ログ出力の初期化
//!
//! 標準エラー出力と `{log_dir}/agent.log` の両方にログを書き出します。
//! レベルは `RUST_LOG` で指定でき、未指定の場合は `info` です。

use std::io;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// ログファイル名
pub const LOG_FILE_NAME: &str = "agent.log";

const DEFAULT_FILTER: &str = "info";

/// ログファイルのパス
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// グローバルな subscriber を設定する
///
/// `json` が真の場合、ファイルへは JSON 形式で書き出します。
/// 戻り値のガードが破棄されるとファイルへの書き込みが止まるため、
/// `main` の終わりまで保持してください。
///
/// # エラー
///
/// ログディレクトリを作成できない場合、または subscriber が設定済みの場合。
pub fn init(log_dir: &Path, json: bool) -> io::Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(LOG_FILE_NAME)
        .build(log_dir)
        .map_err(io::Error::other)?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let text_file = (!json).then(|| fmt::layer().with_ansi(false).with_writer(writer.clone()));
    let json_file = json.then(|| fmt::layer().json().with_writer(writer));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).with_writer(io::stderr))
        .with(text_file)
        .with(json_file)
        .try_init()
        .map_err(io::Error::other)?;

    Ok(guard)
}
