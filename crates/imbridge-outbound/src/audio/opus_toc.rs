// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Opus TOC byte parsing (RFC 6716 §3.1): just enough to recover a
//! packet's duration in 48 kHz samples, the fixed timebase Ogg Opus
//! granule positions use regardless of the stream's actual sample rate
//! (RFC 7845 §4).

const FRAME_SIZE_48K: [u64; 32] = [
    // SILK NB: 10, 20, 40, 60 ms
    480, 960, 1920, 2880,
    // SILK MB: 10, 20, 40, 60 ms
    480, 960, 1920, 2880,
    // SILK WB: 10, 20, 40, 60 ms
    480, 960, 1920, 2880,
    // Hybrid SWB: 10, 20 ms
    480, 960,
    // Hybrid FB: 10, 20 ms
    480, 960,
    // CELT NB: 2.5, 5, 10, 20 ms
    120, 240, 480, 960,
    // CELT WB: 2.5, 5, 10, 20 ms
    120, 240, 480, 960,
    // CELT SWB: 2.5, 5, 10, 20 ms
    120, 240, 480, 960,
    // CELT FB: 2.5, 5, 10, 20 ms
    120, 240, 480, 960,
];

/// Returns the packet's total duration across all its frames, or `None`
/// if the packet is too short to carry a valid TOC.
pub fn packet_duration_48k(packet: &[u8]) -> Option<u64> {
    let toc = *packet.first()?;
    let config = (toc >> 3) as usize;
    let frame_count_code = toc & 0x03;
    let frame_size = FRAME_SIZE_48K[config];
    let frame_count = match frame_count_code {
        0 => 1,
        1 | 2 => 2,
        _ => (*packet.get(1)? & 0x3f) as u64,
    };
    Some(frame_size * frame_count)
}
