use anyhow::Context;
use clap::Parser;
use serde_json::Value;
use worktree_manager::cli::{Cli, dispatch, error_json, exit_code};
use worktree_manager::{CancelToken, ManagerConfig, WorktreeManager, WorktreeResult};

fn init_logging() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();
}

async fn run(cli: Cli) -> WorktreeResult<Value> {
    let config = ManagerConfig::load(cli.config.as_deref())?;
    let manager = WorktreeManager::new(config);

    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupt received, cancelling running git operation");
            trigger.cancel();
        }
    });

    dispatch(&manager, cli.command, &cancel).await
}

fn emit(value: &Value, to_stderr: bool) -> anyhow::Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    if to_stderr {
        eprintln!("{text}");
    } else {
        println!("{text}");
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let code = match run(cli).await {
        Ok(value) => match emit(&value, false) {
            Ok(()) => 0,
            Err(e) => {
                log::error!("{e:#}");
                1
            }
        },
        Err(err) => {
            if let Err(e) = emit(&error_json(&err), true) {
                log::error!("{e:#}");
            }
            exit_code(&err)
        }
    };

    std::process::exit(code);
}
