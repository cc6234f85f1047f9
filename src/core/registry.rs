//! Output registry
//!
//! Tracks outputs announced through `wl_registry`, keyed by their global
//! name, in announcement order. The gamma manager may be announced before,
//! between or after the outputs; nothing here depends on that order.

use wayland_client::protocol::wl_output::WlOutput;
use wayland_client::Proxy;

use crate::core::protocol::wlr_gamma_control_unstable_v1::zwlr_gamma_control_manager_v1::ZwlrGammaControlManagerV1;

/// Globals this client cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalKind {
    Output,
    GammaManager,
}

impl GlobalKind {
    pub fn from_interface(interface: &str) -> Option<Self> {
        if interface == WlOutput::interface().name {
            Some(Self::Output)
        } else if interface == ZwlrGammaControlManagerV1::interface().name {
            Some(Self::GammaManager)
        } else {
            None
        }
    }
}

/// Insertion-ordered map from global name to per-output state.
#[derive(Debug)]
pub struct OutputRegistry<T> {
    entries: Vec<(u32, T)>,
}

impl<T> Default for OutputRegistry<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T> OutputRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a newly announced output.
    ///
    /// Global names are unique per connection; a repeated name replaces the
    /// stale entry in place and returns it.
    pub fn insert(&mut self, name: u32, value: T) -> Option<T> {
        if let Some(slot) = self.entries.iter_mut().find(|(n, _)| *n == name) {
            tracing::warn!("Output global {} announced twice, replacing", name);
            return Some(std::mem::replace(&mut slot.1, value));
        }
        self.entries.push((name, value));
        None
    }

    /// Drop the output with this global name, keeping the others in order.
    pub fn remove(&mut self, name: u32) -> Option<T> {
        let index = self.entries.iter().position(|(n, _)| *n == name)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, name: u32) -> bool {
        self.entries.iter().any(|(n, _)| *n == name)
    }

    pub fn get(&self, name: u32) -> Option<&T> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn get_mut(&mut self, name: u32) -> Option<&mut T> {
        self.entries.iter_mut().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> + '_ {
        self.entries.iter().map(|(n, v)| (*n, v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u32, &mut T)> + '_ {
        self.entries.iter_mut().map(|(n, v)| (*n, v))
    }

    pub fn names(&self) -> Vec<u32> {
        self.entries.iter().map(|(n, _)| *n).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
