//! FSK tone tracking.
//!
//! Splits the FM discriminator stream into runs at two tones, F1 (high) and
//! F2 (low), emitting F1 runs as pulses and F2 runs as gaps. The tone
//! estimates are learned online: a fast average primes F1 from the first few
//! samples, then slow EMAs track both tones for the rest of the packet.
//!
//! The tracker only runs while the outer detector is inside the first
//! envelope pulse of a potential packet. An FSK transmission is continuous
//! carrier, so the envelope sees one long high level while the discriminator
//! toggles; gating on that window also keeps genuinely-OOK signals from
//! triggering false FSK detections.

use super::buffer::PulsePacket;
use super::MIN_PULSE_SAMPLES;

/// Tone boundary in INIT is declared at half this discriminator swing.
const DEFAULT_FM_DELTA: i32 = 6000;
/// EMA ratio for the tone estimates.
const EST_RATIO: i32 = 32;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum FskState {
    /// Learning the initial tone; not yet known whether it is F1 or F2
    #[default]
    Init,
    /// Inside an F1 run (accumulating a pulse)
    F1,
    /// Inside an F2 run (accumulating a gap)
    F2,
    /// Packet buffer overflowed; sticky until the next reset
    Error,
}

/// Per-packet FSK tracking state. Reset by the detector on every IDLE to
/// PULSE transition.
#[derive(Debug, Clone, Copy, Default)]
pub struct FskTracker {
    state: FskState,
    /// Samples accumulated in the current run
    run_length: u32,
    /// Pulse width awaiting its gap; valid while in F2
    pending_pulse: u32,
    f1_est: i32,
    f2_est: i32,
}

impl FskTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn f1_est(&self) -> i32 {
        self.f1_est
    }

    pub fn f2_est(&self) -> i32 {
        self.f2_est
    }

    /// Feed one FM sample, committing completed runs into `packet`.
    pub fn feed(&mut self, fm: i32, packet: &mut PulsePacket) {
        let f1_delta = (fm - self.f1_est).abs();
        let f2_delta = (fm - self.f2_est).abs();
        self.run_length += 1;

        match self.state {
            FskState::Init => {
                if self.run_length < MIN_PULSE_SAMPLES {
                    // Fast priming of the first tone estimate; sum before
                    // halving so truncation cannot skew mixed-parity inputs
                    self.f1_est = (self.f1_est + fm) / 2;
                } else if f1_delta > DEFAULT_FM_DELTA / 2 {
                    if fm > self.f1_est {
                        // The initial tone was the low one: record it as a
                        // zero-width pulse followed by the measured gap.
                        if packet.push(0, self.run_length).is_err() {
                            self.enter_error(packet.len());
                            return;
                        }
                        self.f2_est = self.f1_est;
                        self.f1_est = fm;
                        self.run_length = 0;
                        self.state = FskState::F1;
                    } else {
                        // The initial tone was the high one: hold it as the
                        // pending pulse and start measuring the gap.
                        self.pending_pulse = self.run_length;
                        self.f2_est = fm;
                        self.run_length = 0;
                        self.state = FskState::F2;
                    }
                } else {
                    self.f1_est += (fm - self.f1_est) / EST_RATIO;
                }
            }

            FskState::F1 => {
                if f1_delta > f2_delta {
                    // Run ended; sample already belongs to the F2 side
                    if self.run_length >= MIN_PULSE_SAMPLES {
                        self.pending_pulse = self.run_length;
                        self.run_length = 0;
                        self.state = FskState::F2;
                    } else {
                        // Spurious blip: fold it back into the previous gap
                        if let Some(last) = packet.pop() {
                            self.run_length += last.gap;
                            self.pending_pulse = last.pulse;
                            if packet.is_empty() && last.pulse == 0 {
                                // Only the synthetic first entry existed, so
                                // the tones were assigned backwards
                                std::mem::swap(&mut self.f1_est, &mut self.f2_est);
                                self.state = FskState::Init;
                            } else {
                                self.state = FskState::F2;
                            }
                        } else {
                            self.state = FskState::F2;
                        }
                    }
                } else {
                    self.f1_est += (fm - self.f1_est) / EST_RATIO;
                }
            }

            FskState::F2 => {
                if f2_delta > f1_delta {
                    if self.run_length >= MIN_PULSE_SAMPLES {
                        if packet.push(self.pending_pulse, self.run_length).is_err()
                            || packet.is_full()
                        {
                            self.enter_error(packet.len());
                            return;
                        }
                        self.run_length = 0;
                        self.state = FskState::F1;
                    } else {
                        // Spurious gap: fold it back into the pending pulse
                        self.run_length += self.pending_pulse;
                        self.state = FskState::F1;
                    }
                } else {
                    self.f2_est += (fm - self.f2_est) / EST_RATIO;
                }
            }

            FskState::Error => {}
        }
    }

    /// Terminal commit, called by the detector once the envelope gap is
    /// confirmed real: the run in flight becomes the last pulse (zero gap)
    /// or the last gap.
    pub fn wrap_up(&mut self, packet: &mut PulsePacket) {
        match self.state {
            FskState::F1 => {
                let _ = packet.push(self.run_length, 0);
            }
            FskState::F2 => {
                let _ = packet.push(self.pending_pulse, self.run_length);
            }
            FskState::Init | FskState::Error => {}
        }
    }

    fn enter_error(&mut self, num_pulses: usize) {
        tracing::warn!(num_pulses, "FSK tracker out of packet space, tracking lost");
        self.state = FskState::Error;
    }
}
