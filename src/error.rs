//! Error taxonomy for the inspector.
//!
//! Every failure here is local to the inspector: nothing propagates far
//! enough to take down the host application. The worst outcome of any
//! variant is "no custom overlay this frame".

use thiserror::Error;

/// Failures the inspector can report to its caller.
#[derive(Debug, Error)]
pub enum InspectorError {
    /// The graphics device or context was unavailable at startup.
    /// Fatal to the inspector only; the host keeps rendering without it.
    #[error("inspector initialization failed: {0}")]
    Initialization(String),

    /// A shader stage failed to compile. Carries the driver's info log.
    #[error("shader compilation failed: {0}")]
    Compile(String),

    /// The shader program failed to link. Carries the driver's info log.
    #[error("shader program link failed: {0}")]
    Link(String),

    /// The device error flag was set after a pixel readback. The previous
    /// buffer contents are retained but stale; callers must not display
    /// them as fresh values.
    #[error("pixel readback failed: GL error {0:#06x}")]
    Readback(u32),

    /// An operation was invoked before successful initialization.
    #[error("inspector not initialized")]
    NotInitialized,
}
