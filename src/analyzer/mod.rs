//! Packet shape analysis and line-code classification.
//!
//! Histograms a completed packet's pulse, gap and period widths, then walks
//! a rule table over the bin counts to guess the line code and derive the
//! slicer parameters (short/long/reset limits) a downstream line-code
//! demodulator needs. Classification is heuristic: a packet can also come
//! out as a single pulse, an un-modulated preamble, or nothing recognizable.

pub mod histogram;

use serde::{Deserialize, Serialize};

use crate::pulse::{PacketKind, PulsePacket};
use histogram::Histogram;

/// Symbol-level encoding above the pulse layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineCode {
    /// Pulse position modulation: fixed pulse width, data in the gaps
    Ppm,
    /// Pulse width modulation: data in the pulse widths
    Pwm,
    /// Pulse width modulation with a third, rare pulse width acting as a
    /// sync/delimiter
    PwmSync,
    /// Manchester coding: data in the edge directions
    Manchester,
    /// Non-return-to-zero pulse code modulation (FSK bitstream)
    PcmNrz,
}

impl std::fmt::Display for LineCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineCode::Ppm => write!(f, "PPM"),
            LineCode::Pwm => write!(f, "PWM"),
            LineCode::PwmSync => write!(f, "PWM+sync"),
            LineCode::Manchester => write!(f, "Manchester"),
            LineCode::PcmNrz => write!(f, "PCM/NRZ"),
        }
    }
}

/// Slicer parameters consumed by the line-code demodulators. All widths are
/// in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlicerSpec {
    pub line_code: LineCode,
    /// Boundary between the short and long symbol width
    pub short_limit: u32,
    /// Upper bound of the long symbol width; 0 when the code has no second
    /// width (Manchester)
    pub long_limit: u32,
    /// A gap at least this wide terminates the packet
    pub reset_limit: u32,
    /// Width of the sync/delimiter pulse; 0 when the code has none
    pub sync_width: u32,
}

/// Outcome of classifying one packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modulation {
    /// Only one pulse: nothing to classify
    SinglePulse,
    /// One pulse class and one gap class: carrier blip or preamble
    Unmodulated,
    /// Recognized line code, ready to slice
    Coded(SlicerSpec),
    /// No rule matched
    Unknown,
}

/// Everything the analyzer learned about one packet.
#[derive(Debug, Clone)]
pub struct Analysis {
    pub num_pulses: usize,
    pub sample_rate: u32,
    /// Packet span in samples, excluding the terminal gap
    pub total_width: u64,
    /// Pulse width classes, sorted by mean, FSK zero marker removed
    pub pulses: Histogram,
    /// Gap width classes (terminal gap excluded), sorted by mean
    pub gaps: Histogram,
    /// Period (pulse+gap) classes, terminal entry excluded
    pub periods: Histogram,
    pub ook_high_estimate: i32,
    pub ook_low_estimate: i32,
    pub fsk_f1_est: i32,
    pub fsk_f2_est: i32,
    pub modulation: Modulation,
    /// Human-readable classification verdict
    pub guess: &'static str,
}

/// Histogram a completed packet and guess its line code.
pub fn analyze(packet: &PulsePacket, kind: PacketKind, sample_rate: u32) -> Analysis {
    let num_pulses = packet.len();

    let mut pulses = Histogram::new();
    let mut gaps = Histogram::new();
    let mut periods = Histogram::new();
    let mut total_width: u64 = 0;

    for (n, entry) in packet.iter().enumerate() {
        pulses.add(entry.pulse);
        total_width += u64::from(entry.pulse);
        if n + 1 < num_pulses {
            // The terminal gap is the end-of-packet marker, not data
            gaps.add(entry.gap);
            periods.add(entry.pulse + entry.gap);
            total_width += u64::from(entry.gap);
        }
    }

    pulses.fuse_bins();
    gaps.fuse_bins();
    periods.fuse_bins();

    pulses.sort_by_mean();
    gaps.sort_by_mean();
    if pulses.bins().first().is_some_and(|bin| bin.mean == 0) {
        // Zero-width marker from an FSK packet that started on the low tone
        pulses.delete_bin(0);
    }

    let (modulation, guess) = classify(num_pulses, kind, &mut pulses, &gaps, &periods);
    tracing::debug!(%kind, guess, "modulation guess");

    Analysis {
        num_pulses,
        sample_rate,
        total_width,
        pulses,
        gaps,
        periods,
        ook_high_estimate: packet.ook_high_estimate,
        ook_low_estimate: packet.ook_low_estimate,
        fsk_f1_est: packet.fsk_f1_est,
        fsk_f2_est: packet.fsk_f2_est,
        modulation,
        guess,
    }
}

/// Stamp the terminal gap with the slicer's reset sentinel so every
/// line-code demodulator sees the packet terminate. Call before dispatch.
pub fn prepare_for_slicing(packet: &mut PulsePacket, spec: &SlicerSpec) {
    packet.set_last_gap(spec.reset_limit + 1);
}

/// Rule table over the histogram shapes; first match wins.
fn classify(
    num_pulses: usize,
    kind: PacketKind,
    pulses: &mut Histogram,
    gaps: &Histogram,
    periods: &Histogram,
) -> (Modulation, &'static str) {
    let p = pulses.len();
    let g = gaps.len();
    let r = periods.len();

    if num_pulses == 1 {
        return (
            Modulation::SinglePulse,
            "Single pulse detected. Probably frequency shift keying or just noise...",
        );
    }
    if p == 1 && g == 1 {
        // A continuous FSK bitstream has one width on both sides; for an
        // amplitude packet the same shape is just unbroken carrier
        if kind == PacketKind::Fsk {
            let bit_width = pulses.bins()[0].mean;
            return (
                coded(SlicerSpec {
                    line_code: LineCode::PcmNrz,
                    short_limit: bit_width,
                    long_limit: bit_width,
                    reset_limit: bit_width * 1024,
                    sync_width: 0,
                }),
                "Pulse code modulation (not return to zero)",
            );
        }
        return (Modulation::Unmodulated, "Un-modulated signal. Maybe a preamble...");
    }
    if p == 1 && g > 1 {
        let gap_bins = gaps.bins();
        return (
            coded(SlicerSpec {
                line_code: LineCode::Ppm,
                short_limit: (gap_bins[0].mean + gap_bins[1].mean) / 2,
                long_limit: gap_bins[1].max + 1,
                reset_limit: gap_bins[g - 1].max + 1,
                sync_width: 0,
            }),
            "Pulse position modulation with fixed pulse width",
        );
    }
    if p == 2 && g == 1 {
        return (
            coded(pwm_fixed_gap(pulses, gaps)),
            "Pulse width modulation with fixed gap",
        );
    }
    if p == 2 && g == 2 && r == 1 {
        return (
            coded(pwm_fixed_gap(pulses, gaps)),
            "Pulse width modulation with fixed period",
        );
    }
    if p == 2 && g == 2 && r == 3 {
        let pulse_bins = pulses.bins();
        return (
            coded(SlicerSpec {
                line_code: LineCode::Manchester,
                short_limit: pulse_bins[0].mean.min(pulse_bins[1].mean),
                long_limit: 0,
                reset_limit: gaps.bins()[g - 1].max + 1,
                sync_width: 0,
            }),
            "Manchester coding",
        );
    }
    if p == 2 && g >= 3 {
        let pulse_bins = pulses.bins();
        let gap_bins = gaps.bins();
        return (
            coded(SlicerSpec {
                line_code: LineCode::Pwm,
                short_limit: (pulse_bins[0].mean + pulse_bins[1].mean) / 2,
                long_limit: gap_bins[1].max + 1,
                reset_limit: gap_bins[g - 1].max + 1,
                sync_width: 0,
            }),
            "Pulse width modulation with multiple packets",
        );
    }
    if p >= 3 && g >= 3 && widths_are_bit_multiples(pulses, gaps) {
        let bit_width = pulses.bins()[0].mean;
        return (
            coded(SlicerSpec {
                line_code: LineCode::PcmNrz,
                short_limit: bit_width,
                long_limit: bit_width,
                reset_limit: bit_width * 1024,
                sync_width: 0,
            }),
            "Pulse code modulation (not return to zero)",
        );
    }
    if p == 3 {
        // The rarest pulse width is probably a sync or delimiter
        pulses.sort_by_count();
        let pulse_bins = pulses.bins();
        let p1 = pulse_bins[1].mean;
        let p2 = pulse_bins[2].mean;
        return (
            coded(SlicerSpec {
                line_code: LineCode::PwmSync,
                short_limit: p1.min(p2),
                long_limit: p1.max(p2),
                reset_limit: gaps.bins().last().map_or(0, |bin| bin.max) + 1,
                sync_width: pulse_bins[0].mean,
            }),
            "Pulse width modulation with sync/delimiter",
        );
    }
    (Modulation::Unknown, "No clue...")
}

fn pwm_fixed_gap(pulses: &Histogram, gaps: &Histogram) -> SlicerSpec {
    let pulse_bins = pulses.bins();
    let long_limit = gaps.bins().last().map_or(0, |bin| bin.max) + 1;
    SlicerSpec {
        line_code: LineCode::Pwm,
        short_limit: (pulse_bins[0].mean + pulse_bins[1].mean) / 2,
        long_limit,
        reset_limit: long_limit,
        sync_width: 0,
    }
}

/// All pulse and gap classes sit on a {1, 2, 3} x bit-width grid.
fn widths_are_bit_multiples(pulses: &Histogram, gaps: &Histogram) -> bool {
    let bit = i64::from(pulses.bins()[0].mean);
    let slack = bit / 8;
    let near = |mean: u32, multiple: i64| (i64::from(mean) - multiple * bit).abs() <= slack;
    near(pulses.bins()[1].mean, 2)
        && near(pulses.bins()[2].mean, 3)
        && near(gaps.bins()[0].mean, 1)
        && near(gaps.bins()[1].mean, 2)
        && near(gaps.bins()[2].mean, 3)
}

/// Wrap a spec, keeping the limits ordered even for degenerate histograms.
fn coded(mut spec: SlicerSpec) -> Modulation {
    if spec.long_limit != 0 && spec.short_limit > spec.long_limit {
        spec.long_limit = spec.short_limit;
    }
    Modulation::Coded(spec)
}

impl std::fmt::Display for Analysis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let to_ms = 1e3 / f64::from(self.sample_rate);
        let to_us = 1e6 / f64::from(self.sample_rate);
        writeln!(f, "Analyzing pulses...")?;
        writeln!(
            f,
            "Total count: {:4},  width: {:.2} ms\t\t({} S)",
            self.num_pulses,
            self.total_width as f64 * to_ms,
            self.total_width
        )?;
        for (name, hist) in [
            ("Pulse width distribution", &self.pulses),
            ("Gap width distribution", &self.gaps),
            ("Pulse period distribution", &self.periods),
        ] {
            writeln!(f, "{name}:")?;
            for (n, bin) in hist.bins().iter().enumerate() {
                writeln!(
                    f,
                    " [{:2}] count: {:4},  width: {:5} S ({:.0} us) [{};{}]",
                    n,
                    bin.count,
                    bin.mean,
                    f64::from(bin.mean) * to_us,
                    bin.min,
                    bin.max
                )?;
            }
        }
        writeln!(
            f,
            "Level estimates [high, low]: {:6}, {:6}",
            self.ook_high_estimate, self.ook_low_estimate
        )?;
        writeln!(
            f,
            "Frequency offsets [F1, F2]:  {:6}, {:6}\t({:+.1} kHz, {:+.1} kHz)",
            self.fsk_f1_est,
            self.fsk_f2_est,
            tone_khz(self.fsk_f1_est, self.sample_rate),
            tone_khz(self.fsk_f2_est, self.sample_rate),
        )?;
        write!(f, "Guessing modulation: {}", self.guess)
    }
}

/// Discriminator units to kHz: full scale is half the sample rate.
fn tone_khz(est: i32, sample_rate: u32) -> f64 {
    f64::from(est) / f64::from(i16::MAX) * f64::from(sample_rate) / 2.0 / 1000.0
}
