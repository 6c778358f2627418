use crate::shared::error::SwapError;
use crate::shared::patch::Patch;

/// Restores detail in a synthesized face patch.
///
/// Output has the same dimensions as the input. Implementations must be
/// deterministic: the same patch always yields the same result.
pub trait FaceEnhancer: Send + Sync {
    fn enhance(&self, patch: &Patch) -> Result<Patch, SwapError>;
}
