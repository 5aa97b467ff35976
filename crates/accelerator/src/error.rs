use renderer::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum AcceleratorError {
    #[error("accelerator is not ready; call initialize first")]
    NotReady,
    #[error("accelerator has been disposed")]
    Disposed,
    #[error(transparent)]
    Render(#[from] RenderError),
}
