//! `scriptstep-worker` -- runs one inline script step and reports its outcome.
//!
//! Script output goes to stdout line by line, logs go to stderr, and the
//! final outcome is printed as a JSON object on stdout. The process exits
//! with `0` on `Success` and `1` otherwise. Ctrl-C cancels the step.
//!
//! See [`WorkerConfig::from_env`] for the environment variables read at
//! startup.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use scriptstep_core::scripting::environment::EnvPolicy;
use scriptstep_core::scripting::sink::LineSink;
use scriptstep_core::scripting::spec::{HostOs, ScriptDefaults};
use scriptstep_core::ScriptAction;
use scriptstep_worker::config::WorkerConfig;
use scriptstep_worker::job::JobFile;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scriptstep_worker=info,scriptstep_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = WorkerConfig::from_env().context("invalid worker configuration")?;
    let job = JobFile::load(&config.step_file).await?;

    tracing::info!(
        step_file = %config.step_file.display(),
        basedir = %config.basedir.display(),
        export_port = config.export_port,
        "Starting script step",
    );

    let action = ScriptAction::new(
        ScriptDefaults {
            posix_shell: config.default_shell.clone(),
        },
        EnvPolicy::default(),
        HostOs::current(),
    );

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, canceling script step");
            signal_cancel.cancel();
        }
    });

    let sink: Arc<dyn LineSink> = Arc::new(|line: &str| {
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(stdout, "{line}");
    });

    let outcome = action.run(job.into_request(&config), sink, cancel).await;

    println!("{}", serde_json::to_string(&outcome)?);
    if !outcome.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
