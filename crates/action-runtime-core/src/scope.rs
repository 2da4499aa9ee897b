//! The activation active on the current thread.
//!
//! Every invocation runs inside an [`ActivationScope`]. Entering a scope makes
//! its [`Activation`] visible through [`current_activation`] for the rest of
//! the call on that thread; dropping the scope restores whatever was active
//! before, on success, on error, and while unwinding from a panic.

use std::cell::RefCell;
use std::sync::Arc;

use uuid::Uuid;

thread_local! {
    static CURRENT: RefCell<Option<Activation>> = const { RefCell::new(None) };
}

/// Identity of one invocation of the loaded entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activation {
    id: String,
    entry_point: Arc<str>,
}

impl Activation {
    /// Create a new activation of `entry_point` with a fresh id.
    pub fn new(entry_point: impl Into<Arc<str>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            entry_point: entry_point.into(),
        }
    }

    /// Unique activation identifier.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Name of the entry point being invoked.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}

/// Guard that keeps an [`Activation`] current for its lifetime.
#[must_use = "the activation is only current while the scope is alive"]
#[derive(Debug)]
pub struct ActivationScope {
    previous: Option<Activation>,
}

impl ActivationScope {
    /// Make `activation` current on this thread until the guard is dropped.
    pub fn enter(activation: Activation) -> Self {
        let previous = CURRENT.with(|current| current.replace(Some(activation)));
        Self { previous }
    }
}

impl Drop for ActivationScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| {
            *current.borrow_mut() = previous;
        });
    }
}

/// The activation current on this thread, if any.
pub fn current_activation() -> Option<Activation> {
    CURRENT.with(|current| current.borrow().clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_sets_and_restores() {
        assert!(current_activation().is_none());

        let activation = Activation::new("echo");
        {
            let _scope = ActivationScope::enter(activation.clone());
            assert_eq!(current_activation(), Some(activation));
        }

        assert!(current_activation().is_none());
    }

    #[test]
    fn test_nested_scopes_restore_outer() {
        let outer = Activation::new("outer");
        let inner = Activation::new("inner");

        let _outer_scope = ActivationScope::enter(outer.clone());
        {
            let _inner_scope = ActivationScope::enter(inner.clone());
            assert_eq!(current_activation().unwrap().entry_point(), "inner");
        }
        assert_eq!(current_activation(), Some(outer));
    }

    #[test]
    fn test_scope_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            let _scope = ActivationScope::enter(Activation::new("boom"));
            panic!("entry point panicked");
        });

        assert!(result.is_err());
        assert!(current_activation().is_none());
    }

    #[test]
    fn test_scope_is_per_thread() {
        let _scope = ActivationScope::enter(Activation::new("main-thread"));

        let seen = std::thread::spawn(current_activation).join().unwrap();
        assert!(seen.is_none());
        assert!(current_activation().is_some());
    }

    #[test]
    fn test_activation_ids_are_unique() {
        let a = Activation::new("same");
        let b = Activation::new("same");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.entry_point(), b.entry_point());
    }
}
