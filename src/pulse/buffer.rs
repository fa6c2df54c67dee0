//! Fixed-capacity pulse packet container.
//!
//! A [`PulsePacket`] is an ordered list of (pulse width, gap width) pairs in
//! samples, plus the level and tone estimates captured while the packet was
//! being built. The detector owns and mutates it until end-of-packet; after
//! that it is read-only input for the analyzer and the line-code slicers.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Maximum number of (pulse, gap) entries a packet can hold.
pub const MAX_PULSES: usize = 1024;

/// One pulse and the gap that follows it, both in samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PulseGap {
    /// Run of samples above the detection threshold
    pub pulse: u32,
    /// Run of samples below the detection threshold
    pub gap: u32,
}

/// Capacity was reached; the detector treats this as forced end-of-packet,
/// never as a hard failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("pulse packet full: capacity of {capacity} entries reached")]
pub struct BufferFull {
    pub capacity: usize,
}

/// A completed or in-progress pulse packet.
///
/// The terminal entry's `gap` is a sentinel: at least the detector's reset
/// threshold for OOK packets, zero for FSK packets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PulsePacket {
    /// Absolute sample index of the first sample of the packet
    pub offset: u64,
    /// Noise floor estimate at packet time (raw envelope units)
    pub ook_low_estimate: i32,
    /// Carrier level estimate at packet time (raw envelope units)
    pub ook_high_estimate: i32,
    /// F1 (high) tone estimate; carrier offset estimate for OOK packets
    pub fsk_f1_est: i32,
    /// F2 (low) tone estimate; zero for OOK packets
    pub fsk_f2_est: i32,
    entries: Vec<PulseGap>,
}

impl Default for PulsePacket {
    fn default() -> Self {
        Self::new()
    }
}

impl PulsePacket {
    pub fn new() -> Self {
        Self {
            offset: 0,
            ook_low_estimate: 0,
            ook_high_estimate: 0,
            fsk_f1_est: 0,
            fsk_f2_est: 0,
            entries: Vec::with_capacity(MAX_PULSES),
        }
    }

    /// Drop all entries and zero the metadata, keeping the allocation.
    pub fn clear(&mut self) {
        self.offset = 0;
        self.ook_low_estimate = 0;
        self.ook_high_estimate = 0;
        self.fsk_f1_est = 0;
        self.fsk_f2_est = 0;
        self.entries.clear();
    }

    /// Append a completed (pulse, gap) entry.
    pub fn push(&mut self, pulse: u32, gap: u32) -> Result<(), BufferFull> {
        if self.entries.len() >= MAX_PULSES {
            return Err(BufferFull {
                capacity: MAX_PULSES,
            });
        }
        self.entries.push(PulseGap { pulse, gap });
        Ok(())
    }

    /// Remove and return the most recent entry. The FSK tracker uses this to
    /// rewind a commit when the following run turns out to be spurious.
    pub fn pop(&mut self) -> Option<PulseGap> {
        self.entries.pop()
    }

    /// Overwrite the terminal gap. Used to stamp the reset sentinel before a
    /// packet is handed to the line-code slicers. No-op on an empty packet.
    pub fn set_last_gap(&mut self, gap: u32) {
        if let Some(last) = self.entries.last_mut() {
            last.gap = gap;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= MAX_PULSES
    }

    pub fn get(&self, index: usize) -> Option<PulseGap> {
        self.entries.get(index).copied()
    }

    pub fn last(&self) -> Option<PulseGap> {
        self.entries.last().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = PulseGap> + '_ {
        self.entries.iter().copied()
    }

    /// Total packet span in samples, including the terminal gap.
    pub fn duration(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| u64::from(e.pulse) + u64::from(e.gap))
            .sum()
    }
}

impl std::fmt::Display for PulsePacket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} pulses @ sample {} (levels [{}, {}], tones [{}, {}])",
            self.entries.len(),
            self.offset,
            self.ook_high_estimate,
            self.ook_low_estimate,
            self.fsk_f1_est,
            self.fsk_f2_est,
        )
    }
}
