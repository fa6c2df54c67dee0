//! subpulse - pulse extraction for sub-GHz ISM band sensors.
//!
//! Consumes two time-aligned streams of signed 16-bit samples from a
//! quadrature front-end - an AM envelope stream and an FM discriminator
//! stream - and emits discrete pulse packets: ordered (pulse width, gap
//! width) pairs in sample counts, tagged OOK or FSK. A post-hoc analyzer
//! histograms a packet's widths, guesses the line code (PPM, PWM variants,
//! Manchester, PCM/NRZ) and produces the slicer parameters a line-code
//! demodulator needs.
//!
//! The detector is streaming: feed chunks of any length and packets that
//! straddle chunk boundaries come out whole. Noise floor, carrier level and
//! the two FSK tone frequencies are estimated online; no calibration is
//! required.
//!
//! ```no_run
//! use subpulse::{analyze, DetectorConfig, PulseDetector, PulsePacket};
//!
//! let mut detector = PulseDetector::new(DetectorConfig::default());
//! let mut am = PulsePacket::new();
//! let mut fsk = PulsePacket::new();
//! # let (envelope, fm): (Vec<i16>, Vec<i16>) = (vec![], vec![]);
//! while let Some(kind) = detector.process(&envelope, &fm, 0, &mut am, &mut fsk) {
//!     let packet = match kind {
//!         subpulse::PacketKind::Ook => &am,
//!         subpulse::PacketKind::Fsk => &fsk,
//!     };
//!     println!("{}", analyze(packet, kind, detector.sample_rate()));
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod pulse;

pub use analyzer::{analyze, prepare_for_slicing, Analysis, LineCode, Modulation, SlicerSpec};
pub use config::DetectorConfig;
pub use pulse::{BufferFull, PacketKind, PulseDetector, PulseGap, PulsePacket, MAX_PULSES};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
