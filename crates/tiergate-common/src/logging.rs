//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Shared primitives and utilities for the authorization engine."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Process-wide tracing for services embedding the engine.
//!
//! Access events carry `tenant`, `principal` and `capability` fields. The
//! JSON layers flatten them to the top level of each record so log
//! pipelines can index decisions per tenant without unpacking `fields`.

use std::io;
use std::path::Path;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

const LOG_ENV: &str = "TIERGATE_LOG";
const DEFAULT_DIRECTIVE: &str = "debug";

/// Non-blocking writers flush on drop; the guards live for the process.
static GUARDS: OnceCell<[WorkerGuard; 2]> = OnceCell::new();

/// Console output format. The rolling file is always JSON.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "kebab-case")]
pub enum LogFormat {
    #[default]
    StructuredJson,
    Pretty,
}

/// Install the global subscriber: console on stderr plus a daily rolling
/// JSON file named `{prefix}-{service}.log` under `config.directory`.
///
/// The filter is read from `TIERGATE_LOG`, then `RUST_LOG`, then falls back
/// to `debug`. A second call leaves the first subscriber in place.
pub fn init_tracing(service_name: &str, config: &LoggingConfig) -> Result<()> {
    std::fs::create_dir_all(&config.directory).with_context(|| {
        format!("unable to create log directory {}", config.directory.display())
    })?;
    let prefix = config.file_prefix.as_deref().unwrap_or(service_name);
    let (file_writer, file_guard) =
        rolling_writer(&config.directory, &format!("{prefix}-{service_name}.log"));
    let (console_writer, console_guard) = tracing_appender::non_blocking(io::stderr());
    let _ = GUARDS.set([file_guard, console_guard]);

    let console = match config.format {
        LogFormat::StructuredJson => json_layer(console_writer),
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_writer(console_writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(console)
        .with(json_layer(file_writer))
        .try_init()
        .ok();

    info!(
        service = %service_name,
        log_dir = %config.directory.display(),
        format = ?config.format,
        "tracing initialised"
    );
    Ok(())
}

fn rolling_writer(directory: &Path, file_name: &str) -> (NonBlocking, WorkerGuard) {
    tracing_appender::non_blocking(rolling::daily(directory, file_name))
}

fn env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive '{directive}' ({err}); using {DEFAULT_DIRECTIVE}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

/// JSON records with event fields (tenant, principal, capability, outcome)
/// at the top level.
fn json_layer<S>(writer: NonBlocking) -> Box<dyn Layer<S> + Send + Sync>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .json()
        .flatten_event(true)
        .with_current_span(false)
        .with_span_list(false)
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(writer)
        .boxed()
}
