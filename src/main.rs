use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use agentflow::agent::prompt::PromptStore;
use agentflow::config::settings::{FailurePolicy, RunSettings};
use agentflow::engine::{HttpClientFactory, NodeStatus, Orchestrator, RunReport};
use agentflow::error::ConfigError;
use agentflow::logging;

const DEFAULT_SETTINGS_FILE: &str = "agentflow.toml";

/// 構築に失敗したエージェントがあった場合の終了コード
const EXIT_BLOCKED: u8 = 2;

#[derive(Parser)]
#[command(name = "agentflow", version, about = "LLM エージェントのフローを入力ファイルごとに実行する")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 入力ディレクトリのすべてのファイルに対してフローを実行する
    Run(RunArgs),
    /// エージェントのプロンプトフォルダーと既定テンプレートを作成する
    Scaffold {
        /// エージェント名
        agent: String,
        /// プロンプトのルートディレクトリ
        #[arg(long, default_value = "prompts")]
        prompts_dir: PathBuf,
    },
}

#[derive(clap::Args)]
struct RunArgs {
    /// 実行設定ファイル（省略時は ./agentflow.toml があれば読み込む）
    #[arg(long)]
    settings: Option<PathBuf>,
    #[arg(long)]
    input_dir: Option<PathBuf>,
    #[arg(long)]
    output_dir: Option<PathBuf>,
    #[arg(long)]
    config_dir: Option<PathBuf>,
    #[arg(long)]
    prompts_dir: Option<PathBuf>,
    /// LLM 呼び出し1回あたりのタイムアウト（秒）
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// ノードが失敗した時点でその入力ファイルの処理を中断する
    #[arg(long)]
    halt_on_error: bool,
    /// ログファイルを JSON 形式で書き出す
    #[arg(long)]
    log_json: bool,
}

impl RunArgs {
    fn load_settings(&self) -> Result<RunSettings, ConfigError> {
        let mut settings = match &self.settings {
            Some(path) => RunSettings::from_file(path)?,
            None if Path::new(DEFAULT_SETTINGS_FILE).is_file() => {
                RunSettings::from_file(DEFAULT_SETTINGS_FILE)?
            }
            None => RunSettings::default(),
        };

        if let Some(dir) = &self.input_dir {
            settings.input_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            settings.output_dir = dir.clone();
        }
        if let Some(dir) = &self.config_dir {
            settings.config_dir = dir.clone();
        }
        if let Some(dir) = &self.prompts_dir {
            settings.prompts_dir = dir.clone();
        }
        if let Some(secs) = self.timeout_secs {
            if secs == 0 {
                return Err(ConfigError::Validation(
                    "timeout_secs は 1 以上である必要があります".to_string(),
                ));
            }
            settings.timeout_secs = secs;
        }
        if self.halt_on_error {
            settings.failure_policy = FailurePolicy::Halt;
        }
        Ok(settings)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run(args).await,
        Commands::Scaffold { agent, prompts_dir } => scaffold(&agent, &prompts_dir),
    }
}

async fn run(args: RunArgs) -> ExitCode {
    let settings = match args.load_settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _guard = match logging::init(&settings.log_dir, args.log_json) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: ログを初期化できませんでした: {e}");
            return ExitCode::FAILURE;
        }
    };
    tracing::debug!(
        path = %logging::log_file_path(&settings.log_dir).display(),
        "writing log file"
    );

    let orchestrator = match Orchestrator::from_settings(&settings, &HttpClientFactory::from_env())
    {
        Ok(orchestrator) => orchestrator,
        Err(e) => {
            tracing::error!(error = %e, "failed to load flow");
            return ExitCode::FAILURE;
        }
    };

    match orchestrator.run().await {
        Ok(report) => {
            print_summary(&report);
            if report.has_fatal() {
                tracing::error!("one or more agents could not be constructed");
                ExitCode::from(EXIT_BLOCKED)
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(report: &RunReport) {
    for file in &report.files {
        println!("{}", file.input.display());
        for node in &file.nodes {
            let status = match &node.status {
                NodeStatus::Completed => "ok".to_string(),
                NodeStatus::Failed { message } => format!("failed: {message}"),
                NodeStatus::Blocked { message } => format!("blocked: {message}"),
            };
            println!("  {:<20} {}", node.agent, status);
        }
    }
    println!(
        "{} files, {} nodes executed, {} failed ({:.1}s)",
        report.files.len(),
        report.executed_nodes(),
        report.failed_nodes(),
        report.total_duration.as_secs_f64()
    );
}

fn scaffold(agent: &str, prompts_dir: &Path) -> ExitCode {
    match PromptStore::new(prompts_dir).scaffold(agent) {
        Ok(created) if created.is_empty() => {
            println!("{} のテンプレートはすでに存在します", agent);
            ExitCode::SUCCESS
        }
        Ok(created) => {
            for path in created {
                println!("created {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
