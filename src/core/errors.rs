//! Core error types

use std::time::Duration;

use thiserror::Error;
use wayland_client::backend::WaylandError;
use wayland_client::{ConnectError, DispatchError};

use crate::config::Channel;

/// Errors raised while adjusting output gamma.
///
/// Every variant is fatal for the whole run: there is no per-output recovery.
#[derive(Error, Debug)]
pub enum GammaError {
    #[error("cannot connect to display: {0}")]
    Connect(#[from] ConnectError),

    #[error("compositor doesn't support wlr-gamma-control-unstable-v1")]
    MissingManager,

    #[error("failed to create gamma table buffer: {0}")]
    BufferUnavailable(#[source] std::io::Error),

    #[error("failed to set gamma table for output {output}")]
    ControlFailed { output: u32 },

    #[error("invalid {parameter} for {channel} channel: {value}")]
    InvalidParameter {
        parameter: &'static str,
        channel: Channel,
        value: f64,
    },

    #[error("invalid ramp size: {0}")]
    InvalidRampSize(u32),

    #[error("gamma table holds {actual} entries, output expects {expected}")]
    TableSizeMismatch { expected: usize, actual: usize },

    #[error("output {output} never reported a usable ramp size")]
    RampSizeUnknown { output: u32 },

    #[error("output {output}: cannot {action} while {state}")]
    InvalidTransition {
        output: u32,
        action: &'static str,
        state: String,
    },

    #[error("compositor did not answer a roundtrip within {0:?}")]
    Timeout(Duration),

    #[error("Wayland dispatch error: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("Wayland connection error: {0}")]
    Backend(#[from] WaylandError),

    #[error("failed to poll the Wayland socket: {0}")]
    Poll(#[source] std::io::Error),
}

impl GammaError {
    pub fn invalid_transition(output: u32, action: &'static str, state: impl std::fmt::Debug) -> Self {
        Self::InvalidTransition {
            output,
            action,
            state: format!("{:?}", state),
        }
    }

    /// True when the error means the compositor went away rather than refused something.
    pub fn is_connection_closed(&self) -> bool {
        match self {
            Self::Dispatch(DispatchError::Backend(WaylandError::Io(_))) => true,
            Self::Backend(WaylandError::Io(_)) => true,
            _ => false,
        }
    }
}

/// Result type for core operations
pub type Result<T> = std::result::Result<T, GammaError>;
