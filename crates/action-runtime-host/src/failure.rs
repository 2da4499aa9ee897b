//! Explicit failure signal from guest code.
//!
//! `env.fail(ptr, len)` lets an entry point report an error message. The
//! invocation then fails with that message whatever the entry point returns,
//! which keeps "failed" distinct from "returned no result".

use action_runtime_core::ActivationContext;
use tracing::debug;

/// Message recorded when the guest passes a pointer outside its memory.
pub const INVALID_MESSAGE: &str = "<invalid guest memory>";

/// Host implementation for the failure interface.
pub struct FailureHost;

impl FailureHost {
    /// Record a guest failure. Only the first failure of an activation is kept.
    pub fn fail(ctx: &mut ActivationContext, message: &str) {
        debug!(
            activation_id = %ctx.activation_id,
            message,
            "Guest signaled failure"
        );
        ctx.fail(message.to_string());
    }
}
