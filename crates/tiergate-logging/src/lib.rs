//! ---
//! tg_section: "03-logging"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Structured logging adapters for access decisions."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Logging helpers that attach tenant, principal, and capability fields to
//! every event emitted on the authorization path.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for CLIs and tests.
///
/// Events go to stderr so command output on stdout stays machine-readable.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Tenant the request is evaluated for.
    pub tenant: Option<&'a str>,
    /// Principal being evaluated.
    pub principal: Option<&'a str>,
    /// Capability path (`module.sub.component.action` or a prefix of it).
    pub capability: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a tenant identifier.
    pub fn with_tenant(mut self, tenant: &'a str) -> Self {
        self.tenant = Some(tenant);
        self
    }

    /// Attach a principal identifier.
    pub fn with_principal(mut self, principal: &'a str) -> Self {
        self.principal = Some(principal);
        self
    }

    /// Attach a capability path.
    pub fn with_capability(mut self, capability: &'a str) -> Self {
        self.capability = Some(capability);
        self
    }
}

/// Outcome recorded for administrative events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessEventOutcome {
    /// The operation was applied.
    Applied,
    /// The operation was rejected.
    Rejected,
}

impl AccessEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            AccessEventOutcome::Applied => "applied",
            AccessEventOutcome::Rejected => "rejected",
        }
    }
}

/// Emit a standardized administrative event with an applied/rejected outcome.
pub fn log_access_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: AccessEventOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    match outcome {
        AccessEventOutcome::Applied => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            tenant = ctx.tenant.unwrap_or(""),
            principal = ctx.principal.unwrap_or(""),
            capability = ctx.capability.unwrap_or(""),
            message = %message
        ),
        AccessEventOutcome::Rejected => tracing::event!(
            Level::WARN,
            event,
            outcome = outcome.as_str(),
            tenant = ctx.tenant.unwrap_or(""),
            principal = ctx.principal.unwrap_or(""),
            capability = ctx.capability.unwrap_or(""),
            message = %message
        ),
    }
}
