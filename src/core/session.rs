//! Per-output gamma control session.
//!
//! ```text
//! Unbound -> AwaitingSize -> SizeKnown -> Submitted -> Acknowledged
//!                 \______________\____________\-----> Failed
//! ```
//!
//! The protocol has no success reply. A submission counts as acknowledged
//! once a roundtrip completes after it without a `failed` event.

use crate::core::errors::{GammaError, Result};
use crate::core::protocol::wlr_gamma_control_unstable_v1::zwlr_gamma_control_v1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No gamma control object exists for the output yet
    Unbound,
    /// Control object created, waiting for `gamma_size`
    AwaitingSize,
    SizeKnown { ramp_size: u32 },
    Submitted { ramp_size: u32 },
    Acknowledged { ramp_size: u32 },
    /// The compositor revoked the control object
    Failed,
}

/// Receives the events of one `zwlr_gamma_control_v1` object.
pub trait GammaControlListener {
    fn on_ramp_size(&mut self, size: u32);
    fn on_failed(&mut self);
}

/// Route a protocol event to a listener.
pub fn deliver_event<L>(listener: &mut L, event: zwlr_gamma_control_v1::Event)
where
    L: GammaControlListener + ?Sized,
{
    match event {
        zwlr_gamma_control_v1::Event::GammaSize { size } => listener.on_ramp_size(size),
        zwlr_gamma_control_v1::Event::Failed => listener.on_failed(),
        _ => {}
    }
}

#[derive(Debug)]
pub struct GammaSession {
    output: u32,
    state: SessionState,
}

impl GammaSession {
    /// New session for the output with global name `output`.
    pub fn new(output: u32) -> Self {
        Self {
            output,
            state: SessionState::Unbound,
        }
    }

    pub fn output(&self) -> u32 {
        self.output
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_failed(&self) -> bool {
        self.state == SessionState::Failed
    }

    pub fn ramp_size(&self) -> Option<u32> {
        match self.state {
            SessionState::SizeKnown { ramp_size }
            | SessionState::Submitted { ramp_size }
            | SessionState::Acknowledged { ramp_size } => Some(ramp_size),
            _ => None,
        }
    }

    /// A gamma control object was created for the output.
    pub fn bind(&mut self) -> Result<()> {
        match self.state {
            SessionState::Unbound => {
                self.state = SessionState::AwaitingSize;
                Ok(())
            }
            other => Err(GammaError::invalid_transition(self.output, "bind", other)),
        }
    }

    /// Ramp size to allocate for, if a table may be submitted now.
    pub fn submission_size(&self) -> Result<u32> {
        match self.state {
            SessionState::SizeKnown { ramp_size } => Ok(ramp_size),
            SessionState::AwaitingSize => Err(GammaError::RampSizeUnknown { output: self.output }),
            SessionState::Failed => Err(GammaError::ControlFailed { output: self.output }),
            other => Err(GammaError::invalid_transition(self.output, "submit", other)),
        }
    }

    pub fn mark_submitted(&mut self) -> Result<()> {
        let ramp_size = self.submission_size()?;
        self.state = SessionState::Submitted { ramp_size };
        Ok(())
    }

    /// A roundtrip after submission passed without `failed`.
    ///
    /// Returns false when there was nothing to acknowledge.
    pub fn acknowledge(&mut self) -> bool {
        match self.state {
            SessionState::Submitted { ramp_size } => {
                self.state = SessionState::Acknowledged { ramp_size };
                true
            }
            _ => false,
        }
    }
}

impl GammaControlListener for GammaSession {
    fn on_ramp_size(&mut self, size: u32) {
        match self.state {
            SessionState::AwaitingSize if size > 0 => {
                tracing::debug!("Output {}: gamma ramp size {}", self.output, size);
                self.state = SessionState::SizeKnown { ramp_size: size };
            }
            SessionState::AwaitingSize => {
                tracing::warn!("Output {}: compositor reported an empty gamma ramp", self.output);
            }
            SessionState::Failed => {}
            other => {
                // The size is fixed for the lifetime of the control object
                tracing::warn!(
                    "Output {}: ignoring gamma_size {} in state {:?}",
                    self.output,
                    size,
                    other
                );
            }
        }
    }

    fn on_failed(&mut self) {
        tracing::error!("Output {}: compositor rejected gamma control", self.output);
        self.state = SessionState::Failed;
    }
}
