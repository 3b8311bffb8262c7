//! uniqueport-lambda - Lambda custom runtime for the uniqueport executable
//!
//! Every event delivered by the Lambda Runtime API is logged and passed, as a
//! single JSON argument, to the bundled `uniqueport` executable. The
//! invocation succeeds when the executable exits with status 0.

mod config;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uniqueport_core::{ErrorResponse, InvocationContext};
use uniqueport_handler::{InvocationHandler, Launcher};
use uniqueport_runtime::{settings::RUNTIME_API_ENV, FunctionSettings, Runtime, RuntimeApiClient};

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "bootstrap")]
#[command(about = "Lambda runtime that runs the uniqueport executable per event", long_about = None)]
struct Args {
    /// Config file (defaults to ./uniqueport-lambda.toml when present)
    #[arg(long, global = true, env = "UNIQUEPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Executable to launch for each event
    #[arg(long, global = true, env = "UNIQUEPORT_PROGRAM")]
    program: Option<PathBuf>,

    /// Argument placed before the event argument (repeatable)
    #[arg(long = "arg", global = true, allow_hyphen_values = true)]
    args: Vec<String>,

    /// Working directory for the executable
    #[arg(long, global = true, env = "UNIQUEPORT_WORKING_DIR")]
    working_dir: Option<PathBuf>,

    /// Kill the executable after this many seconds
    #[arg(long, global = true, env = "UNIQUEPORT_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "UNIQUEPORT_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the Lambda Runtime API and handle events (default)
    Serve,

    /// Handle a single event locally
    Invoke {
        /// Event JSON; read from stdin when omitted
        #[arg(long)]
        event: Option<String>,

        /// Function name reported in the context
        #[arg(long, default_value = "uniqueport", env = "AWS_LAMBDA_FUNCTION_NAME")]
        function_name: String,

        /// Deadline reported in the context, in milliseconds from now
        #[arg(long, default_value = "300000")]
        deadline_ms: u64,
    },
}

impl Args {
    /// Command line flags take precedence over file and environment config
    fn apply(&self, config: &mut Config) {
        if let Some(program) = &self.program {
            config.child.program = program.clone();
        }
        if !self.args.is_empty() {
            config.child.args = self.args.clone();
        }
        if let Some(dir) = &self.working_dir {
            config.child.working_dir = Some(dir.clone());
        }
        if let Some(secs) = self.timeout_secs {
            config.child.timeout_secs = Some(secs);
        }
        if let Some(level) = &self.log_level {
            config.log_level = level.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            report_init_error(&e).await;
            return Err(e);
        }
    };

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "uniqueport={level},bootstrap={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let handler = InvocationHandler::new(
        Launcher::new(config.child.launcher_config()),
        config.dump,
    );

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(handler).await,
        Command::Invoke {
            event,
            function_name,
            deadline_ms,
        } => invoke(handler, event, function_name, deadline_ms).await,
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = Config::load(args.config.as_deref()).context("failed to load config")?;
    args.apply(&mut config);
    config.validate()?;
    Ok(config)
}

/// Tell the Runtime API that initialization failed, when running under one
async fn report_init_error(err: &anyhow::Error) {
    let Ok(endpoint) = std::env::var(RUNTIME_API_ENV) else {
        return;
    };

    let response = ErrorResponse::new("Runtime.InitError", format!("{:#}", err));
    let sent = match RuntimeApiClient::new(&endpoint) {
        Ok(client) => client.send_init_error(&response).await,
        Err(e) => Err(e),
    };
    if let Err(e) = sent {
        eprintln!("Failed to report init error: {}", e);
    }
}

async fn serve(handler: InvocationHandler) -> anyhow::Result<()> {
    let settings = FunctionSettings::from_env()?;

    info!(
        program = %handler.launcher().program().display(),
        function_name = %settings.function_name,
        "Starting uniqueport-lambda..."
    );

    let runtime = Runtime::new(settings, handler)?;
    runtime.run().await;

    Ok(())
}

async fn invoke(
    handler: InvocationHandler,
    event: Option<String>,
    function_name: String,
    deadline_ms: u64,
) -> anyhow::Result<()> {
    let raw = match event {
        Some(event) => event,
        None => {
            let mut buf = String::new();
            tokio::io::stdin()
                .read_to_string(&mut buf)
                .await
                .context("failed to read event from stdin")?;
            buf
        }
    };
    let event: Value = serde_json::from_str(&raw).context("event is not valid JSON")?;

    let context = InvocationContext::local(function_name, Duration::from_millis(deadline_ms));
    handler.invoke(event, context).await.map_err(|e| {
        error!(error = %e, "Local invocation failed");
        anyhow::Error::new(e)
    })
}
