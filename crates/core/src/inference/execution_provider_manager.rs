use std::sync::Once;

use log::{info, warn};

use super::domain::execution_context::ExecutionContext;
use super::domain::provider_kind::ProviderKind;
use super::domain::provider_strategy::ProviderStrategy;
use super::infrastructure::ort_providers;
use crate::shared::error::SwapError;

/// Resolves requested accelerator names into a validated [`ExecutionContext`].
pub struct ExecutionProviderManager {
    strategies: Vec<Box<dyn ProviderStrategy>>,
    init_runtime: Box<dyn Fn() + Send + Sync>,
    init: Once,
}

impl ExecutionProviderManager {
    pub fn new(
        strategies: Vec<Box<dyn ProviderStrategy>>,
        init_runtime: Box<dyn Fn() + Send + Sync>,
    ) -> Self {
        Self {
            strategies,
            init_runtime,
            init: Once::new(),
        }
    }

    /// Manager backed by ONNX Runtime provider availability checks.
    pub fn ort() -> Self {
        Self::new(
            ort_providers::ort_strategies(),
            Box::new(ort_providers::init_runtime),
        )
    }

    /// Resolve `requested` (preference order) into an execution context.
    ///
    /// Unknown or unavailable names are skipped with a warning. CPU is
    /// always present as the final fallback. Never fails.
    pub fn resolve(&self, requested: &[String], memory_limit_mb: Option<u64>) -> ExecutionContext {
        self.init.call_once(|| (self.init_runtime)());

        let mut providers: Vec<ProviderKind> = Vec::new();
        let mut advisories = Vec::new();

        for name in requested {
            let Some(kind) = ProviderKind::parse(name) else {
                let err = SwapError::ProviderUnavailable(format!("unknown provider '{name}'"));
                warn!("{err}; skipping");
                advisories.push(err.to_string());
                continue;
            };
            if providers.contains(&kind) {
                continue;
            }
            if !self.is_available(kind) {
                let err = SwapError::ProviderUnavailable(format!("{kind} is not available on this host"));
                warn!("{err}; skipping");
                advisories.push(err.to_string());
                continue;
            }
            providers.push(kind);
        }

        if !providers.contains(&ProviderKind::Cpu) {
            providers.push(ProviderKind::Cpu);
        }

        if let Some(limit) = memory_limit_mb {
            for &kind in &providers {
                if !self.honors_memory_limit(kind) {
                    let note = format!("{kind} cannot enforce the {limit} MB memory limit");
                    warn!("{note}");
                    advisories.push(note);
                }
            }
        }

        let names: Vec<&str> = providers.iter().map(|p| p.short_name()).collect();
        info!("Execution providers: {}", names.join(", "));

        ExecutionContext::new(providers, memory_limit_mb, advisories)
    }

    fn strategy(&self, kind: ProviderKind) -> Option<&dyn ProviderStrategy> {
        self.strategies
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| s.as_ref())
    }

    fn is_available(&self, kind: ProviderKind) -> bool {
        kind == ProviderKind::Cpu || self.strategy(kind).is_some_and(|s| s.is_available())
    }

    fn honors_memory_limit(&self, kind: ProviderKind) -> bool {
        self.strategy(kind).is_some_and(|s| s.honors_memory_limit())
    }
}
