use thiserror::Error;

/// Renderer subsystem errors.
#[derive(Debug, Error)]
pub enum RendererError {
    #[error("shared handle unavailable for target surface: {0}")]
    SharedHandle(String),

    #[error("failed to open shared target surface: {0}")]
    OpenSharedResource(String),

    #[error("video processing interface unavailable: {0}")]
    VideoInterface(String),

    #[error("frame does not support texture output: {0}")]
    TextureUnavailable(String),

    #[error("failed to create video enumerator: {0}")]
    Enumerator(String),

    #[error("failed to create video processor: {0}")]
    Processor(String),

    #[error("failed to create video output view: {0}")]
    OutputView(String),

    #[error("failed to create video input view: {0}")]
    InputView(String),

    #[error("video blit failed: {0}")]
    Blit(String),

    #[error("failed to lock frame buffer: {0}")]
    Lock(String),

    #[error("failed to unlock frame buffer: {0}")]
    Unlock(String),

    #[error("buffer query failed: {0}")]
    Query(String),
}

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, RendererError>;
