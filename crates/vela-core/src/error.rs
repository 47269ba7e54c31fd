// Error taxonomy of the rendering core.

use std::fmt;
use std::panic::Location;

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error("swap chain is out of date")]
    SwapChainOutOfDate,
    #[error("atlas has no free pages")]
    AtlasFull,
    #[error("atlas upload still in flight")]
    UploadInFlight,
    #[error("frame does not fit the vertex buffers")]
    FrameTooLarge,
    #[error("layout exceeded its time budget")]
    LayoutTimeout,
    #[error("GPU device lost: {0}")]
    DeviceLost(String),
    #[error("out of device memory: {0}")]
    OutOfMemory(String),
    #[error("shader failed to compile: {0}")]
    ShaderCompileFailure(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Handled where it occurs; never surfaced.
    Transient,
    /// Aborts the current frame; the next frame proceeds.
    FrameScoped,
    /// Tears down the window.
    Fatal,
}

impl RenderError {
    pub fn severity(&self) -> Severity {
        match self {
            RenderError::SwapChainOutOfDate
            | RenderError::AtlasFull
            | RenderError::UploadInFlight => Severity::Transient,
            RenderError::FrameTooLarge | RenderError::LayoutTimeout => Severity::FrameScoped,
            RenderError::DeviceLost(_)
            | RenderError::OutOfMemory(_)
            | RenderError::ShaderCompileFailure(_) => Severity::Fatal,
        }
    }
}

/// A `RenderError` with the place it was raised and the resource involved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub location: &'static Location<'static>,
    pub cause: RenderError,
    pub resource_tag: String,
}

impl ErrorInfo {
    #[track_caller]
    pub fn new(cause: RenderError, resource_tag: impl Into<String>) -> Self {
        Self {
            location: Location::caller(),
            cause,
            resource_tag: resource_tag.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        self.cause.severity()
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{}] at {}:{}",
            self.cause,
            self.resource_tag,
            self.location.file(),
            self.location.line()
        )
    }
}

impl std::error::Error for ErrorInfo {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

/// Attach a resource tag and the caller location to an error result.
pub trait ResultExt<T> {
    fn tagged(self, resource_tag: &str) -> Result<T, ErrorInfo>;
}

impl<T> ResultExt<T> for Result<T, RenderError> {
    #[track_caller]
    fn tagged(self, resource_tag: &str) -> Result<T, ErrorInfo> {
        match self {
            Ok(v) => Ok(v),
            Err(cause) => Err(ErrorInfo::new(cause, resource_tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_classes() {
        assert_eq!(RenderError::AtlasFull.severity(), Severity::Transient);
        assert_eq!(RenderError::FrameTooLarge.severity(), Severity::FrameScoped);
        assert_eq!(
            RenderError::DeviceLost("reset".into()).severity(),
            Severity::Fatal
        );
    }

    #[test]
    fn tagged_records_caller() {
        let result: Result<(), RenderError> = Err(RenderError::OutOfMemory("atlas".into()));
        let info = result.tagged("image-atlas").unwrap_err();
        assert_eq!(info.resource_tag, "image-atlas");
        assert!(info.location.file().ends_with("error.rs"));
        assert!(info.to_string().contains("image-atlas"));
    }
}
