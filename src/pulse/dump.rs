//! Packet dump renderers.
//!
//! Two debug-oriented renderings of emitted packets:
//! - **VCD**: value-change-dump text with three wires (FRAME `/`, AM `'`,
//!   FM `"`) under module `rtl_433`, loadable in any waveform viewer.
//! - **Raw**: a byte-per-sample window where pulse samples carry a caller
//!   chosen mark bit and every in-packet sample carries bit 0.

use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;

use super::buffer::PulsePacket;
use super::detector::PacketKind;

/// Events are emitted in these time units per the header's `$timescale`.
fn time_scale(sample_rate: u32) -> f64 {
    if sample_rate <= 500_000 {
        1e6 / f64::from(sample_rate) // 1 us units
    } else {
        1e7 / f64::from(sample_rate) // 100 ns units
    }
}

/// VCD file header: date, version, timescale and the three wire
/// definitions. Written once per file, before any [`vcd_events`] output.
pub fn vcd_header(sample_rate: u32) -> String {
    let timescale = if sample_rate <= 500_000 { "1 us" } else { "100 ns" };
    let mut out = String::new();
    let _ = writeln!(out, "$date {} $end", Utc::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "$version subpulse {} $end", crate::VERSION);
    let _ = writeln!(out, "$comment Acquisition at {} Hz $end", sample_rate);
    let _ = writeln!(out, "$timescale {timescale} $end");
    out.push_str("$scope module rtl_433 $end\n");
    out.push_str("$var wire 1 / FRAME $end\n");
    out.push_str("$var wire 1 ' AM $end\n");
    out.push_str("$var wire 1 \" FM $end\n");
    out.push_str("$upscope $end\n");
    out.push_str("$enddefinitions $end\n");
    out
}

/// Value changes for one packet on the AM or FM wire, with FRAME raised for
/// the packet's span.
pub fn vcd_events(packet: &PulsePacket, kind: PacketKind, sample_rate: u32) -> String {
    let scale = time_scale(sample_rate);
    let wire = match kind {
        PacketKind::Ook => '\'',
        PacketKind::Fsk => '"',
    };
    let mut out = String::new();
    let mut pos = packet.offset;
    for (n, entry) in packet.iter().enumerate() {
        if n == 0 {
            let _ = writeln!(out, "#{:.0} 1/ 1{}", pos as f64 * scale, wire);
        } else {
            let _ = writeln!(out, "#{:.0} 1{}", pos as f64 * scale, wire);
        }
        pos += u64::from(entry.pulse);
        let _ = writeln!(out, "#{:.0} 0{}", pos as f64 * scale, wire);
        pos += u64::from(entry.gap);
    }
    if !packet.is_empty() {
        let _ = writeln!(out, "#{:.0} 0/", pos as f64 * scale);
    }
    out
}

/// Write a VCD file for a batch of emitted packets.
pub fn export_vcd(path: &Path, sample_rate: u32, packets: &[(PacketKind, PulsePacket)]) -> Result<()> {
    let mut content = vcd_header(sample_rate);
    for (kind, packet) in packets {
        content.push_str(&vcd_events(packet, *kind, sample_rate));
    }
    std::fs::write(path, content).with_context(|| format!("Write VCD file: {:?}", path))?;
    tracing::info!("Exported VCD to {:?}", path);
    Ok(())
}

/// Mark one packet into a byte-per-sample window starting at absolute sample
/// index `window_offset`. Pulse samples get `0x01 | bits`, gap samples get
/// `0x01`; marks are OR-ed so OOK and FSK packets can overlay. Samples
/// outside the window are clipped.
pub fn dump_raw(window: &mut [u8], window_offset: u64, packet: &PulsePacket, bits: u8) {
    let len = window.len() as i64;
    let mut pos = packet.offset as i64 - window_offset as i64;
    for entry in packet.iter() {
        let pulse_end = pos + i64::from(entry.pulse);
        for n in pos.max(0)..pulse_end.min(len) {
            window[n as usize] |= 0x01 | bits;
        }
        pos = pulse_end;
        let gap_end = pos + i64::from(entry.gap);
        for n in pos.max(0)..gap_end.min(len) {
            window[n as usize] |= 0x01;
        }
        pos = gap_end;
    }
}
