use catalog::EffectKind;

use crate::backend::ShaderDiagnostics;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A catalog program failed to compile or link. Never recovered from
    /// mid-chain: it indicates a bad shader or a driver that cannot run it.
    #[error("failed to compile {kind} program: {diagnostics}")]
    ShaderCompilation {
        kind: EffectKind,
        diagnostics: ShaderDiagnostics,
    },
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("invalid LUT: {0}")]
    InvalidLut(String),
    #[error("graphics backend failure")]
    Backend(#[source] anyhow::Error),
    #[error("graphics context was lost")]
    ContextLost,
    #[error("renderer has been disposed")]
    Disposed,
    #[error("failed to encode canvas: {0}")]
    Export(String),
}

impl RenderError {
    /// Whether the next frame may succeed without reinitializing.
    ///
    /// Compilation failures repeat on every attempt and context loss needs a
    /// new renderer, so neither is recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RenderError::InvalidFrame(_)
                | RenderError::InvalidLut(_)
                | RenderError::Backend(_)
                | RenderError::Export(_)
        )
    }
}
