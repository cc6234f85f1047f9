pub mod errors;
pub mod protocol;
pub mod ramp;
pub mod buffer;
pub mod registry;
pub mod session;
pub mod sync;
pub mod client;


// Re-export key types
pub use client::{ApplyReport, AppliedOutput, ClientOptions, GammaClient, Output};
pub use errors::{GammaError, Result};
pub use session::{GammaControlListener, GammaSession, SessionState};
