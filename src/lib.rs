// wl-gammactl
// Copyright (c) 2026
//
// Contrast, brightness and gamma control for Wayland outputs through
// wlr-gamma-control-unstable-v1. All protocol handling lives in core/,
// the binary only parses the command line and reports progress.

pub mod config;
pub mod core;
pub mod prelude;

pub use crate::config::{Adjustment, Channel, ColorTriple};
pub use crate::core::{ClientOptions, GammaClient, GammaError};
