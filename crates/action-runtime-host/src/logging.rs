//! Logging host function implementation.
//!
//! Guest code emits log lines through `env.log`. They are captured in the
//! activation's store and re-emitted through `tracing`, tagged with the
//! activation id so they can be correlated with the `/run` request.

use action_runtime_core::{ActivationContext, LogEntry, LogLevel};
use tracing::{debug, error, info, warn};

/// Host implementation for the logging interface.
///
/// Logs are both:
/// 1. Stored in the [`ActivationContext`] for later retrieval
/// 2. Emitted via the `tracing` crate for observability
pub struct LoggingHost;

impl LoggingHost {
    /// Log a message at the specified level.
    pub fn log(ctx: &mut ActivationContext, level: LogLevel, message: &str) {
        ctx.logs.push(LogEntry {
            level,
            message: message.to_string(),
            timestamp: std::time::Instant::now(),
        });

        let activation_id = &ctx.activation_id;
        match level {
            LogLevel::Debug => debug!(activation_id, guest_log = true, "{}", message),
            LogLevel::Info => info!(activation_id, guest_log = true, "{}", message),
            LogLevel::Warn => warn!(activation_id, guest_log = true, "{}", message),
            LogLevel::Error => error!(activation_id, guest_log = true, "{}", message),
        }
    }
}

/// Convert a numeric log level to [`LogLevel`].
///
/// 0=debug, 1=info, 2=warn, 3=error; anything else is treated as info.
pub fn level_from_i32(level: i32) -> LogLevel {
    match level {
        0 => LogLevel::Debug,
        2 => LogLevel::Warn,
        3 => LogLevel::Error,
        _ => LogLevel::Info,
    }
}
