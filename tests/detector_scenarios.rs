//! End-to-end detector and analyzer scenarios at fs = 250 kHz.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use subpulse::{
    analyze, DetectorConfig, LineCode, Modulation, PacketKind, PulseDetector, PulsePacket,
    MAX_PULSES,
};

const FS: u32 = 250_000;
const SAMPLES_PER_MS: u32 = FS / 1000;

fn init_logging() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "off".into()))
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}

fn detector() -> PulseDetector {
    PulseDetector::new(DetectorConfig {
        sample_rate: FS,
        level_limit: 0,
    })
}

fn extend(stream: &mut Vec<i16>, level: i16, count: usize) {
    stream.extend(std::iter::repeat(level).take(count));
}

/// Feed a whole stream in chunks, draining every emitted packet.
fn run_stream(
    detector: &mut PulseDetector,
    envelope: &[i16],
    fm: &[i16],
    chunk_size: usize,
) -> Vec<(PacketKind, PulsePacket)> {
    let mut packets = Vec::new();
    let mut am = PulsePacket::new();
    let mut fsk = PulsePacket::new();
    let mut offset = 0u64;
    for (env_chunk, fm_chunk) in envelope.chunks(chunk_size).zip(fm.chunks(chunk_size)) {
        loop {
            match detector.process(env_chunk, fm_chunk, offset, &mut am, &mut fsk) {
                Some(PacketKind::Ook) => packets.push((PacketKind::Ook, am.clone())),
                Some(PacketKind::Fsk) => packets.push((PacketKind::Fsk, fsk.clone())),
                None => break,
            }
        }
        offset += env_chunk.len() as u64;
    }
    packets
}

/// A two-pulse PWM burst: lead-in, 250-sample pulse, 500 gap, 750 pulse, long tail.
fn pwm_burst_signal() -> (Vec<i16>, Vec<i16>) {
    let mut env = Vec::new();
    extend(&mut env, 40, 2000);
    extend(&mut env, 4000, 250);
    extend(&mut env, 40, 500);
    extend(&mut env, 4000, 750);
    extend(&mut env, 40, 80_000);
    let fm = vec![0i16; env.len()];
    (env, fm)
}

#[test]
fn pure_noise_yields_no_packets() {
    init_logging();
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let env_noise = Normal::new(50.0f32, 10.0).unwrap();
    let fm_noise = Normal::new(0.0f32, 200.0).unwrap();
    let envelope: Vec<i16> = (0..2_000_000)
        .map(|_| env_noise.sample(&mut rng).max(0.0) as i16)
        .collect();
    let fm: Vec<i16> = (0..2_000_000)
        .map(|_| fm_noise.sample(&mut rng) as i16)
        .collect();

    let mut det = detector();
    let packets = run_stream(&mut det, &envelope, &fm, 65536);
    assert!(packets.is_empty(), "noise produced {} packets", packets.len());

    let (low, _high) = det.level_estimates();
    assert!((40..=60).contains(&low), "noise floor estimate = {low}");
}

#[test]
fn single_pwm_burst() {
    init_logging();
    let (envelope, fm) = pwm_burst_signal();
    let mut det = detector();
    let packets = run_stream(&mut det, &envelope, &fm, envelope.len());

    assert_eq!(packets.len(), 1);
    let (kind, packet) = &packets[0];
    assert_eq!(*kind, PacketKind::Ook);
    assert_eq!(packet.len(), 2);
    assert_eq!(packet.offset, 2000);

    let first = packet.get(0).unwrap();
    let last = packet.get(1).unwrap();
    assert!((248..=252).contains(&first.pulse), "pulse 0 = {}", first.pulse);
    assert!((498..=502).contains(&first.gap), "gap 0 = {}", first.gap);
    assert!((748..=752).contains(&last.pulse), "pulse 1 = {}", last.pulse);
    // The terminal gap is the end-of-packet threshold, not the full silence
    assert!(last.gap > 10 * SAMPLES_PER_MS, "terminal gap = {}", last.gap);

    let analysis = analyze(packet, *kind, FS);
    match analysis.modulation {
        Modulation::Coded(spec) => assert_eq!(spec.line_code, LineCode::Pwm),
        other => panic!("expected PWM, got {:?}", other),
    }
}

#[test]
fn fsk_square_wave_packet() {
    init_logging();
    let mut env = Vec::new();
    extend(&mut env, 40, 2000);
    // Carrier on through 20 025 samples; the odd tail length leaves the tone
    // tracker mid-gap when the envelope drops, exercising the F2 wrap-up
    extend(&mut env, 3000, 20_025);
    extend(&mut env, 40, 30_000);

    let mut fm = vec![0i16; 2000];
    for n in 0..(env.len() - 2000) {
        fm.push(if n % 40 < 20 { 6000 } else { -6000 });
    }

    let mut det = detector();
    let packets = run_stream(&mut det, &env, &fm, env.len());

    assert_eq!(packets.len(), 1);
    let (kind, packet) = &packets[0];
    assert_eq!(*kind, PacketKind::Fsk);
    assert!(
        (480..=520).contains(&packet.len()),
        "fsk entries = {}",
        packet.len()
    );
    // Interior entries alternate near the 20-sample half period
    for entry in packet.iter().skip(1).take(packet.len() - 2) {
        assert!((18..=22).contains(&entry.pulse), "pulse = {}", entry.pulse);
        assert!((18..=22).contains(&entry.gap), "gap = {}", entry.gap);
    }
    assert!(packet.fsk_f1_est > 4000, "f1 = {}", packet.fsk_f1_est);
    assert!(packet.fsk_f2_est < -4000, "f2 = {}", packet.fsk_f2_est);

    let analysis = analyze(packet, *kind, FS);
    match analysis.modulation {
        Modulation::Coded(spec) => {
            assert_eq!(spec.line_code, LineCode::PcmNrz);
            assert!((18..=22).contains(&spec.short_limit), "bit = {}", spec.short_limit);
            assert_eq!(spec.short_limit, spec.long_limit);
        }
        other => panic!("expected PCM/NRZ, got {:?}", other),
    }
}

#[test]
fn chunked_feeding_matches_single_chunk() {
    init_logging();
    let (envelope, fm) = pwm_burst_signal();

    let mut whole_det = detector();
    let whole = run_stream(&mut whole_det, &envelope, &fm, envelope.len());

    let mut chunked_det = detector();
    let chunked = run_stream(&mut chunked_det, &envelope, &fm, 37);

    assert_eq!(whole, chunked);
}

#[test]
fn buffer_overflow_splits_packets() {
    init_logging();
    let mut env = Vec::new();
    extend(&mut env, 40, 2000);
    for n in 0..MAX_PULSES + 6 {
        extend(&mut env, 4000, 100);
        extend(&mut env, 40, if n % 2 == 0 { 200 } else { 400 });
    }
    extend(&mut env, 40, 80_000);
    let fm = vec![0i16; env.len()];

    let mut det = detector();
    let packets = run_stream(&mut det, &env, &fm, 65536);

    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0].1.len(), MAX_PULSES);
    assert_eq!(packets[1].1.len(), 6);
    // The second packet picks up exactly where the first left off
    assert!(packets[1].1.offset > packets[0].1.offset);
}

#[test]
fn manchester_burst_classifies() {
    init_logging();
    let pairs = [
        (80, 80),
        (160, 160),
        (80, 160),
        (160, 80),
        (80, 80),
        (160, 0),
    ];
    let mut env = Vec::new();
    extend(&mut env, 40, 2000);
    for (pulse, gap) in pairs {
        extend(&mut env, 4000, pulse);
        extend(&mut env, 40, gap);
    }
    extend(&mut env, 40, 80_000);
    let fm = vec![0i16; env.len()];

    let mut det = detector();
    let packets = run_stream(&mut det, &env, &fm, 65536);

    assert_eq!(packets.len(), 1);
    let (kind, packet) = &packets[0];
    assert_eq!(packet.len(), pairs.len());

    let analysis = analyze(packet, *kind, FS);
    match analysis.modulation {
        Modulation::Coded(spec) => {
            assert_eq!(spec.line_code, LineCode::Manchester);
            assert!((78..=82).contains(&spec.short_limit), "short = {}", spec.short_limit);
            assert_eq!(spec.long_limit, 0);
            // Reset must clear the longest coded gap
            assert!(spec.reset_limit > 160, "reset = {}", spec.reset_limit);
        }
        other => panic!("expected Manchester, got {:?}", other),
    }
}

#[test]
fn analyzer_report_renders_for_live_packet() {
    init_logging();
    let (envelope, fm) = pwm_burst_signal();
    let mut det = detector();
    let packets = run_stream(&mut det, &envelope, &fm, 65536);
    let (kind, packet) = &packets[0];

    let report = analyze(packet, *kind, FS).to_string();
    assert!(report.contains("Total count:"));
    assert!(report.contains("Pulse width distribution"));
    assert!(report.contains("Guessing modulation:"));
}
