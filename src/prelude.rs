//! Common imports and types used throughout wl-gammactl.

pub use crate::config::{Adjustment, Channel, ColorTriple};
pub use crate::core::{ClientOptions, GammaClient, GammaError};

pub type Result<T> = std::result::Result<T, crate::core::errors::GammaError>;
