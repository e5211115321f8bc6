//! Admin bypass flag, consulted at every debit.

use std::sync::atomic::{AtomicBool, Ordering};

/// External switch that disables real balance decrements.
pub trait AdminFlag: Send + Sync {
    fn is_set(&self) -> bool;
}

/// Reads an environment variable on every check; `true` or `1` enables bypass.
#[derive(Debug, Clone)]
pub struct EnvAdminFlag {
    var: String,
}

impl EnvAdminFlag {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl AdminFlag for EnvAdminFlag {
    fn is_set(&self) -> bool {
        std::env::var(&self.var)
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false)
    }
}

/// In-process flag, toggled programmatically
#[derive(Debug, Default)]
pub struct StaticAdminFlag(AtomicBool);

impl StaticAdminFlag {
    pub fn new(enabled: bool) -> Self {
        Self(AtomicBool::new(enabled))
    }

    pub fn set(&self, enabled: bool) {
        self.0.store(enabled, Ordering::SeqCst);
    }
}

impl AdminFlag for StaticAdminFlag {
    fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
