use std::sync::atomic::{AtomicU64, Ordering};

use super::provider_kind::ProviderKind;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one resolved execution context; part of the model cache key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

/// Resolved accelerator selection plus the session's memory ceiling.
///
/// Created once per session and shared read-only by every inference call.
#[derive(Debug)]
pub struct ExecutionContext {
    id: ContextId,
    providers: Vec<ProviderKind>,
    memory_limit_mb: Option<u64>,
    advisories: Vec<String>,
}

impl ExecutionContext {
    /// `providers` is in preference order and must not be empty.
    pub fn new(
        providers: Vec<ProviderKind>,
        memory_limit_mb: Option<u64>,
        advisories: Vec<String>,
    ) -> Self {
        debug_assert!(!providers.is_empty(), "execution context needs a provider");
        Self {
            id: ContextId(NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed)),
            providers,
            memory_limit_mb,
            advisories,
        }
    }

    /// CPU-only context without a memory ceiling.
    pub fn cpu() -> Self {
        Self::new(vec![ProviderKind::Cpu], None, Vec::new())
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn providers(&self) -> &[ProviderKind] {
        &self.providers
    }

    /// The provider inference will try first.
    pub fn primary(&self) -> ProviderKind {
        self.providers
            .first()
            .copied()
            .unwrap_or(ProviderKind::Cpu)
    }

    pub fn memory_limit_mb(&self) -> Option<u64> {
        self.memory_limit_mb
    }

    pub fn memory_limit_bytes(&self) -> Option<u64> {
        self.memory_limit_mb.map(|mb| mb.saturating_mul(1024 * 1024))
    }

    /// Non-fatal notes recorded during resolution (fallbacks, unenforced limits).
    pub fn advisories(&self) -> &[String] {
        &self.advisories
    }
}
