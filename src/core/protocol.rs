//! Protocol re-exports
//!
//! Client-side bindings for the wlroots gamma control protocol, taken from
//! the wayland-protocols-wlr crate.

/// zwlr_gamma_control_v1 - per-output gamma ramps
pub mod wlr_gamma_control_unstable_v1 {
    pub use wayland_protocols_wlr::gamma_control::v1::client::*;
}
