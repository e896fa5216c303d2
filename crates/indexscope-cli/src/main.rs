//! indexscope - manage Windows Search indexing scope from the command line.
//!
//! Commands that touch the indexing subsystem first make sure the search
//! manager access point is usable, repairing it according to the repair
//! flags when it is not.

mod cli;
mod commands;
mod console;
mod elevation;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command, ConfigCommand};
use commands::Reply;
use console::ConsolePrompt;
use indexscope_core::config::AppConfig;
use indexscope_core::{
    FanOutAuditSink, IndexScope, IndexScopeError, JsonLinesAuditSink, OperationResult,
    TracingAuditSink,
};
use serde_json::Value;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, info};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr so `--json` output stays clean
    let level = log_level(cli.verbose);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(level.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let argv: Vec<String> = std::env::args().skip(1).collect();
    let code = match run(&cli, &argv).await {
        Ok(reply) => {
            print_reply(&reply, cli.json);
            reply.exit_code()
        }
        Err(err) => report_error(&err, cli.json),
    };
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}

fn log_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

async fn run(cli: &Cli, argv: &[String]) -> Result<Reply> {
    if let Command::Config(ConfigCommand::Validate { path }) = &cli.command {
        return commands::validate_document(path);
    }

    let scope = build_scope(cli)?;

    if cli.command.needs_access_point() {
        scope.require_usable(argv, &ConsolePrompt).await?;
    }

    commands::dispatch(&scope, &cli.command, argv).await
}

fn build_scope(cli: &Cli) -> Result<IndexScope> {
    let is_elevated = elevation::is_elevated();
    debug!("Process elevated: {}", is_elevated);

    let mut audit = FanOutAuditSink::new().with(Arc::new(TracingAuditSink));
    if let Some(path) = cli.audit_log.clone().or_else(default_audit_log) {
        info!("Registration audit log: {}", path.display());
        audit = audit.with(Arc::new(JsonLinesAuditSink::new(path)));
    }

    let scope = IndexScope::builder()
        .with_system_backend()?
        .elevated(is_elevated)
        .audit_sink(Arc::new(audit))
        .build()?;
    Ok(scope)
}

fn default_audit_log() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| {
        dir.join(AppConfig::APP_NAME)
            .join(AppConfig::AUDIT_LOG_FILENAME)
    })
}

fn print_reply(reply: &Reply, json: bool) {
    if json {
        print_json(&reply.result);
    } else if reply.result.success {
        println!("{}", reply.text);
    } else {
        eprintln!("{}", reply.text);
    }
}

fn report_error(err: &anyhow::Error, json: bool) -> i32 {
    let result = match err.downcast_ref::<IndexScopeError>() {
        Some(e) => OperationResult::<Value>::failure(e),
        None => OperationResult::failure(&IndexScopeError::Other(format!("{:#}", err))),
    };
    if json {
        print_json(&result);
    } else {
        eprintln!("Error: {}", result.message);
    }
    result.exit_code
}

fn print_json(result: &OperationResult<Value>) {
    match serde_json::to_string_pretty(result) {
        Ok(text) => println!("{}", text),
        Err(e) => eprintln!("Error: failed to serialize output: {}", e),
    }
}
