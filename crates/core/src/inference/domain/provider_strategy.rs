use super::provider_kind::ProviderKind;

/// Host-specific knowledge about one execution provider.
///
/// One implementation per [`ProviderKind`]; the manager picks the strategy
/// by kind.
pub trait ProviderStrategy: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the provider can actually run on this host.
    fn is_available(&self) -> bool;

    /// Whether the provider can enforce a memory ceiling on its own arena.
    fn honors_memory_limit(&self) -> bool {
        false
    }
}
