//! Pulse extraction subsystem.
//!
//! Two demodulation paths run in lockstep over the same sample stream:
//! - **OOK**: the envelope stream drives the [`detector::PulseDetector`]
//!   state machine, with adaptive levels from [`estimator::OokEstimator`].
//! - **FSK**: while the detector sits inside the first envelope pulse, the
//!   FM stream drives [`fsk::FskTracker`] in parallel.
//!
//! Whichever path completes first wins the packet: the detector hands out a
//! [`buffer::PulsePacket`] tagged OOK or FSK.

pub mod buffer;
pub mod detector;
pub mod dump;
pub mod estimator;
pub mod fsk;

pub use buffer::{BufferFull, PulseGap, PulsePacket, MAX_PULSES};
pub use detector::{PacketKind, PulseDetector};
pub use estimator::OokEstimator;
pub use fsk::FskTracker;

/// Minimum run length, in samples, accepted as a real pulse or gap. Shorter
/// runs are treated as glitches by both the OOK and FSK paths.
pub(crate) const MIN_PULSE_SAMPLES: u32 = 10;
