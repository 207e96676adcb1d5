//! ---
//! tg_section: "03-logging"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Structured logging adapters for access decisions."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---

#[doc(hidden)]
#[macro_export]
macro_rules! __tg_event {
    ($level:expr, $ctx:expr, $($arg:tt)+) => {{
        let ctx = &$ctx;
        tracing::event!(
            $level,
            tenant = ctx.tenant.unwrap_or(""),
            principal = ctx.principal.unwrap_or(""),
            capability = ctx.capability.unwrap_or(""),
            message = %format_args!($($arg)+)
        );
    }};
}

/// Emit an informational log enriched with access context.
#[macro_export]
macro_rules! tg_info {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__tg_event!(tracing::Level::INFO, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__tg_event!(tracing::Level::INFO, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a debug log enriched with access context.
#[macro_export]
macro_rules! tg_debug {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__tg_event!(tracing::Level::DEBUG, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__tg_event!(tracing::Level::DEBUG, $crate::LogContext::default(), $($arg)+)
    };
}

/// Emit a warning enriched with access context.
#[macro_export]
macro_rules! tg_warn {
    (context = $ctx:expr, $($arg:tt)+) => {
        $crate::__tg_event!(tracing::Level::WARN, $ctx, $($arg)+)
    };
    ($($arg:tt)+) => {
        $crate::__tg_event!(tracing::Level::WARN, $crate::LogContext::default(), $($arg)+)
    };
}
