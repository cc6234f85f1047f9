//! Gamma ramp generation.
//!
//! A table holds `3 * ramp_size` 16-bit entries laid out as three contiguous
//! channel blocks: red, then green, then blue. For channel `j` and index `i`:
//!
//! ```text
//! x = i / (ramp_size - 1)
//! v = contrast[j] * x^(1 / gamma[j]) + (brightness[j] - 1)
//! entry = round(clamp(v, 0, 1) * 65535)
//! ```
//!
//! A ramp of size 1 has the single position `x = 0`.

use crate::config::{Adjustment, Channel};
use crate::core::errors::{GammaError, Result};

/// Number of 16-bit entries a table for `ramp_size` holds.
pub fn table_len(ramp_size: u32) -> Result<usize> {
    if ramp_size == 0 {
        return Err(GammaError::InvalidRampSize(ramp_size));
    }
    (ramp_size as usize)
        .checked_mul(3)
        .ok_or(GammaError::InvalidRampSize(ramp_size))
}

/// Owned three-channel gamma table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GammaTable {
    ramp_size: u32,
    values: Vec<u16>,
}

impl GammaTable {
    pub fn ramp_size(&self) -> u32 {
        self.ramp_size
    }

    pub fn channel(&self, channel: Channel) -> &[u16] {
        let size = self.ramp_size as usize;
        let start = channel.index() * size;
        &self.values[start..start + size]
    }

    pub fn red(&self) -> &[u16] {
        self.channel(Channel::Red)
    }

    pub fn green(&self) -> &[u16] {
        self.channel(Channel::Green)
    }

    pub fn blue(&self) -> &[u16] {
        self.channel(Channel::Blue)
    }

    /// The flat red/green/blue layout the compositor expects
    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }
}

/// Build a fresh table for `ramp_size`.
pub fn generate(ramp_size: u32, adjustment: &Adjustment) -> Result<GammaTable> {
    let mut values = vec![0u16; table_len(ramp_size)?];
    fill(&mut values, ramp_size, adjustment)?;
    Ok(GammaTable { ramp_size, values })
}

/// Fill an existing flat table in place.
///
/// `table` must hold exactly `3 * ramp_size` entries.
pub fn fill(table: &mut [u16], ramp_size: u32, adjustment: &Adjustment) -> Result<()> {
    let expected = table_len(ramp_size)?;
    if table.len() != expected {
        return Err(GammaError::TableSizeMismatch {
            expected,
            actual: table.len(),
        });
    }
    adjustment.validate()?;

    let size = ramp_size as usize;
    let denominator = if size > 1 { (size - 1) as f64 } else { 1.0 };

    for (channel, block) in Channel::ALL.into_iter().zip(table.chunks_exact_mut(size)) {
        let contrast = adjustment.contrast.get(channel);
        let offset = adjustment.brightness.get(channel) - 1.0;
        let exponent = 1.0 / adjustment.gamma.get(channel);

        for (i, entry) in block.iter_mut().enumerate() {
            let x = i as f64 / denominator;
            let value = contrast * x.powf(exponent) + offset;
            *entry = quantize(value);
        }
    }

    Ok(())
}

fn quantize(value: f64) -> u16 {
    (value.clamp(0.0, 1.0) * f64::from(u16::MAX)).round() as u16
}
