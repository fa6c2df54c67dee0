//! Top-level streaming packet detector.
//!
//! A four-state machine over the envelope stream: IDLE learns the noise
//! floor, PULSE and GAP accumulate widths into the OOK packet, GAP_START
//! absorbs spurious gaps before committing. While the detector sits inside
//! the first envelope pulse, the FM stream is forwarded to the FSK tracker;
//! if enough FSK entries accumulate before a second envelope pulse appears,
//! the packet is emitted as FSK instead of OOK.
//!
//! Input arrives in chunks of arbitrary length. All state, including a
//! position inside the current chunk, persists across calls so packets that
//! straddle chunk boundaries come out identical to single-chunk feeding.

use serde::{Deserialize, Serialize};

use super::buffer::PulsePacket;
use super::estimator::{OokEstimator, EST_HIGH_RATIO, EST_LOW_RATIO};
use super::fsk::FskTracker;
use super::MIN_PULSE_SAMPLES;
use crate::config::DetectorConfig;

/// Minimum number of FSK entries collected inside the first envelope pulse
/// for the packet to be declared FSK.
const MIN_FSK_PULSES: usize = 16;
/// A gap ends the packet once it exceeds this multiple of the widest pulse
/// (and the minimum gap time below).
const MAX_GAP_RATIO: u32 = 10;
/// Minimum gap time, in ms, for the ratio rule to apply.
const MIN_GAP_MS: u32 = 10;
/// A gap this long, in ms, always ends the packet.
const MAX_GAP_MS: u32 = 100;

/// Which modulation produced an emitted packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PacketKind {
    /// Amplitude-pulsed: widths measured from the envelope stream
    Ook,
    /// Frequency-pulsed: widths measured from the FM discriminator stream
    Fsk,
}

impl std::fmt::Display for PacketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacketKind::Ook => write!(f, "OOK"),
            PacketKind::Fsk => write!(f, "FSK"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DetectorState {
    /// Below threshold, tracking the noise floor
    Idle,
    /// Above threshold, accumulating a pulse
    Pulse,
    /// Just dropped below threshold; the gap may still be spurious
    GapStart,
    /// Confirmed gap, waiting for the next pulse or end-of-packet
    Gap,
}

/// Streaming dual-modality pulse detector.
///
/// One instance per stream; feeding two radios through the same instance is
/// not meaningful. Levels learned in IDLE persist across packets.
#[derive(Debug)]
pub struct PulseDetector {
    sample_rate: u32,
    samples_per_ms: u32,
    level_limit: i16,

    state: DetectorState,
    estimator: OokEstimator,
    fsk: FskTracker,

    /// Samples accumulated in the current pulse or gap run
    pulse_length: u32,
    /// Completed pulse width awaiting its gap
    pending_pulse: u32,
    /// Widest pulse seen in the current packet (drives the gap ratio rule)
    max_pulse: u32,
    /// Resume position inside the current chunk
    data_counter: usize,
    /// Saturating count of idle samples; detection is held off until the
    /// noise estimate has had one full EMA period to settle
    lead_in_counter: i32,
}

impl PulseDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            samples_per_ms: config.sample_rate / 1000,
            level_limit: config.level_limit,
            state: DetectorState::Idle,
            estimator: OokEstimator::new(),
            fsk: FskTracker::new(),
            pulse_length: 0,
            pending_pulse: 0,
            max_pulse: 0,
            data_counter: 0,
            lead_in_counter: 0,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Current (noise floor, carrier level) estimates in raw envelope units.
    pub fn level_estimates(&self) -> (i32, i32) {
        (self.estimator.low(), self.estimator.high())
    }

    /// Pin the detection threshold to a fixed envelope level, or pass 0 to
    /// return to the adaptive estimate. The adaptive estimators keep
    /// running while pinned, so switching back is seamless.
    pub fn set_level_limit(&mut self, level_limit: i16) {
        self.level_limit = level_limit;
    }

    /// Feed one chunk of time-aligned envelope and FM samples.
    ///
    /// Returns `Some(kind)` as soon as a packet is complete; the packet is
    /// then in `am_packet` (OOK) or `fsk_packet` (FSK) and the chunk is only
    /// partially consumed. Call again with the **same** chunk and offset to
    /// continue; `None` means the chunk is exhausted and the next chunk
    /// should be supplied. `chunk_offset` is the absolute stream index of
    /// the chunk's first sample.
    pub fn process(
        &mut self,
        envelope: &[i16],
        fm: &[i16],
        chunk_offset: u64,
        am_packet: &mut PulsePacket,
        fsk_packet: &mut PulsePacket,
    ) -> Option<PacketKind> {
        debug_assert_eq!(envelope.len(), fm.len(), "streams must be time-aligned");
        let len = envelope.len().min(fm.len());

        while self.data_counter < len {
            let am = i32::from(envelope[self.data_counter]);
            let fm_n = i32::from(fm[self.data_counter]);
            let threshold = self.estimator.threshold(self.level_limit);

            match self.state {
                DetectorState::Idle => {
                    if am > threshold.rising && self.lead_in_counter > EST_LOW_RATIO {
                        // New packet begins on this sample
                        self.pulse_length = 0;
                        self.max_pulse = 0;
                        self.fsk.reset();
                        am_packet.clear();
                        fsk_packet.clear();
                        let offset = chunk_offset + self.data_counter as u64;
                        am_packet.offset = offset;
                        fsk_packet.offset = offset;
                        self.state = DetectorState::Pulse;
                    } else {
                        self.estimator.update_idle(am);
                        if self.lead_in_counter <= EST_LOW_RATIO {
                            self.lead_in_counter += 1;
                        }
                    }
                }

                DetectorState::Pulse => {
                    self.pulse_length += 1;
                    if am < threshold.falling {
                        if self.pulse_length < MIN_PULSE_SAMPLES {
                            // Too short to be a pulse
                            self.state = DetectorState::Idle;
                        } else {
                            self.pending_pulse = self.pulse_length;
                            self.max_pulse = self.max_pulse.max(self.pulse_length);
                            self.pulse_length = 0;
                            self.state = DetectorState::GapStart;
                        }
                    } else {
                        self.estimator.update_pulse(am);
                        // Carrier offset estimate rides on the OOK packet
                        am_packet.fsk_f1_est += (fm_n - am_packet.fsk_f1_est) / EST_HIGH_RATIO;
                    }
                    if am_packet.is_empty() {
                        self.fsk.feed(fm_n, fsk_packet);
                    }
                }

                DetectorState::GapStart => {
                    self.pulse_length += 1;
                    if am > threshold.rising {
                        // Spurious gap: resume the pulse where it left off
                        self.pulse_length += self.pending_pulse;
                        self.state = DetectorState::Pulse;
                    } else if self.pulse_length >= MIN_PULSE_SAMPLES {
                        self.state = DetectorState::Gap;
                        if fsk_packet.len() > MIN_FSK_PULSES {
                            // The first envelope pulse was continuous carrier
                            // with a toggling discriminator: an FSK packet
                            self.fsk.wrap_up(fsk_packet);
                            fsk_packet.fsk_f1_est = self.fsk.f1_est();
                            fsk_packet.fsk_f2_est = self.fsk.f2_est();
                            fsk_packet.ook_low_estimate = self.estimator.low();
                            fsk_packet.ook_high_estimate = self.estimator.high();
                            self.state = DetectorState::Idle;
                            tracing::debug!(
                                num_pulses = fsk_packet.len(),
                                offset = fsk_packet.offset,
                                "FSK packet"
                            );
                            return Some(PacketKind::Fsk);
                        }
                    }
                    if am_packet.is_empty() {
                        self.fsk.feed(fm_n, fsk_packet);
                    }
                }

                DetectorState::Gap => {
                    self.pulse_length += 1;
                    if am > threshold.rising {
                        // Next pulse begins: the entry is complete
                        if am_packet.push(self.pending_pulse, self.pulse_length).is_err()
                            || am_packet.is_full()
                        {
                            return self.emit_ook(am_packet);
                        }
                        self.pulse_length = 0;
                        self.state = DetectorState::Pulse;
                    }
                    if (self.pulse_length > MAX_GAP_RATIO * self.max_pulse
                        && self.pulse_length > MIN_GAP_MS * self.samples_per_ms)
                        || self.pulse_length > MAX_GAP_MS * self.samples_per_ms
                    {
                        // Gap too long: end of packet, gap width becomes the
                        // terminator
                        let _ = am_packet.push(self.pending_pulse, self.pulse_length);
                        return self.emit_ook(am_packet);
                    }
                }
            }
            self.data_counter += 1;
        }

        self.data_counter = 0;
        None
    }

    fn emit_ook(&mut self, am_packet: &mut PulsePacket) -> Option<PacketKind> {
        am_packet.ook_low_estimate = self.estimator.low();
        am_packet.ook_high_estimate = self.estimator.high();
        self.state = DetectorState::Idle;
        tracing::debug!(
            num_pulses = am_packet.len(),
            offset = am_packet.offset,
            "OOK packet"
        );
        Some(PacketKind::Ook)
    }
}
