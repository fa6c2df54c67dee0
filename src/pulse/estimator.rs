//! Adaptive OOK level estimation.
//!
//! Two slow integer EMAs track the noise floor (while the detector idles) and
//! the carrier level (while it is inside a pulse). The detection threshold is
//! the midpoint of the two with a 12.5% hysteresis band, unless the caller
//! pins it with a manual level limit.

/// Default high level is this ratio of the low (noise) level.
const HIGH_LOW_RATIO: i32 = 8;
/// Minimum legal carrier level estimate.
const MIN_HIGH_LEVEL: i32 = 1000;
/// Maximum legal carrier level estimate.
const MAX_HIGH_LEVEL: i32 = 16384;
/// Maximum legal noise floor estimate.
const MAX_LOW_LEVEL: i32 = 8192;
/// EMA ratio for the carrier level (fast, tracks within one pulse). The
/// detector reuses it for the per-packet carrier offset estimate.
pub(crate) const EST_HIGH_RATIO: i32 = 64;
/// EMA ratio for the noise floor (slow, tracks across packets).
pub(crate) const EST_LOW_RATIO: i32 = 1024;

/// Rising/falling comparison levels for one sample.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Threshold {
    pub rising: i32,
    pub falling: i32,
}

/// Noise floor and carrier level estimates, in raw envelope units.
///
/// Lives for the whole stream: levels learned from one packet carry over to
/// the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct OokEstimator {
    low: i32,
    high: i32,
}

impl OokEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn low(&self) -> i32 {
        self.low
    }

    pub fn high(&self) -> i32 {
        self.high
    }

    /// Idle-phase update: track the noise floor and derive the default
    /// carrier estimate from it.
    ///
    /// The trailing sign step keeps the integer EMA moving when the delta
    /// truncates to zero; without it the estimate stalls up to
    /// `EST_LOW_RATIO - 1` units away from the true floor. Once the
    /// estimate matches the input exactly the sign is zero and it holds.
    pub fn update_idle(&mut self, am: i32) {
        let delta = am - self.low;
        self.low += delta / EST_LOW_RATIO;
        self.low += delta.signum();
        self.low = self.low.min(MAX_LOW_LEVEL);

        self.high = (HIGH_LOW_RATIO * self.low).clamp(MIN_HIGH_LEVEL, MAX_HIGH_LEVEL);
    }

    /// In-pulse update: track the carrier level.
    pub fn update_pulse(&mut self, am: i32) {
        self.high += (am - self.high) / EST_HIGH_RATIO;
        self.high = self.high.clamp(MIN_HIGH_LEVEL, MAX_HIGH_LEVEL);
    }

    /// Detection threshold for the current estimates. A non-zero
    /// `level_limit` replaces the adaptive midpoint entirely; hysteresis is
    /// derived from whichever threshold is in effect.
    pub(crate) fn threshold(&self, level_limit: i16) -> Threshold {
        let mut threshold = self.low + (self.high - self.low) / 2;
        if level_limit != 0 {
            threshold = i32::from(level_limit);
        }
        let hysteresis = threshold / 8;
        Threshold {
            rising: threshold + hysteresis,
            falling: threshold - hysteresis,
        }
    }
}
