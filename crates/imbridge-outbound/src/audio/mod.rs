// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! OGG↔CAF remux for voice messages: both containers carry the same Opus
//! packets, so this only repackages them, never decodes or re-encodes.

pub mod caf;
mod opus_toc;

use std::io::Cursor;

use ogg::reading::PacketReader;
use ogg::writing::{PacketWriteEndInfo, PacketWriter};

use crate::error::{OutboundError, OutboundResult};
use caf::{CafOpusFile, CafPacket};

/// Repackages an OGG Opus stream (as delivered by the sink) into Apple's
/// CAF Opus container for the protocol client.
pub fn ogg_opus_to_caf(ogg_bytes: &[u8]) -> OutboundResult<Vec<u8>> {
    let mut reader = PacketReader::new(Cursor::new(ogg_bytes));
    let head = reader
        .read_packet()?
        .ok_or_else(|| OutboundError::Codec("empty ogg stream".to_string()))?;
    let _tags = reader
        .read_packet()?
        .ok_or_else(|| OutboundError::Codec("missing OpusTags packet".to_string()))?;

    let channels = *head
        .data
        .get(9)
        .ok_or_else(|| OutboundError::Codec("truncated OpusHead".to_string()))? as u32;
    let pre_skip = u16::from_le_bytes([*head.data.get(10).unwrap_or(&0), *head.data.get(11).unwrap_or(&0)]) as i32;
    let sample_rate_hz = u32::from_le_bytes([
        *head.data.get(12).unwrap_or(&0),
        *head.data.get(13).unwrap_or(&0),
        *head.data.get(14).unwrap_or(&0),
        *head.data.get(15).unwrap_or(&0),
    ]);

    let mut packets = Vec::new();
    while let Some(pck) = reader.read_packet()? {
        let frames = opus_toc::packet_duration_48k(&pck.data)
            .ok_or_else(|| OutboundError::Codec("malformed Opus packet".to_string()))?;
        packets.push(CafPacket { bytes: pck.data, frames });
    }

    caf::write_caf(&CafOpusFile {
        sample_rate: sample_rate_hz as f64,
        channels,
        magic_cookie: head.data,
        priming_frames: pre_skip,
        remainder_frames: 0,
        packets,
    })
}

/// Repackages a CAF Opus voice message (as received from the protocol
/// client) back into an OGG Opus stream for the sink.
pub fn caf_opus_to_ogg(caf_bytes: &[u8]) -> OutboundResult<Vec<u8>> {
    let file = caf::read_caf(caf_bytes)?;
    let mut output = Vec::new();
    {
        let mut writer = PacketWriter::new(&mut output);
        let serial = 1u32;

        writer
            .write_packet(file.magic_cookie.clone(), serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(|e| OutboundError::Codec(e.to_string()))?;
        writer
            .write_packet(synth_opus_tags(), serial, PacketWriteEndInfo::EndPage, 0)
            .map_err(|e| OutboundError::Codec(e.to_string()))?;

        let last_index = file.packets.len().saturating_sub(1);
        let mut granule = 0u64;
        for (i, packet) in file.packets.into_iter().enumerate() {
            granule += packet.frames;
            let info = if i == last_index { PacketWriteEndInfo::EndStream } else { PacketWriteEndInfo::EndPage };
            writer
                .write_packet(packet.bytes, serial, info, granule)
                .map_err(|e| OutboundError::Codec(e.to_string()))?;
        }
    }
    Ok(output)
}

fn synth_opus_tags() -> Vec<u8> {
    let vendor = b"imbridge-outbound";
    let mut out = Vec::new();
    out.extend_from_slice(b"OpusTags");
    out.extend_from_slice(&(vendor.len() as u32).to_le_bytes());
    out.extend_from_slice(vendor);
    out.extend_from_slice(&0u32.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_opus_head() -> Vec<u8> {
        let mut head = Vec::new();
        head.extend_from_slice(b"OpusHead");
        head.push(1); // version
        head.push(1); // channels
        head.extend_from_slice(&312u16.to_le_bytes()); // pre-skip
        head.extend_from_slice(&48_000u32.to_le_bytes()); // input sample rate
        head.extend_from_slice(&0i16.to_le_bytes()); // output gain
        head.push(0); // channel mapping family
        head
    }

    fn sample_opus_tags() -> Vec<u8> {
        let mut tags = Vec::new();
        tags.extend_from_slice(b"OpusTags");
        tags.extend_from_slice(&0u32.to_le_bytes());
        tags.extend_from_slice(&0u32.to_le_bytes());
        tags
    }

    fn sample_ogg_stream() -> Vec<u8> {
        let mut ogg_bytes = Vec::new();
        {
            let mut writer = PacketWriter::new(&mut ogg_bytes);
            writer.write_packet(sample_opus_head(), 1, PacketWriteEndInfo::EndPage, 0).unwrap();
            writer.write_packet(sample_opus_tags(), 1, PacketWriteEndInfo::EndPage, 0).unwrap();
            // config 0 (SILK NB, 10ms), frame count code 0 (one frame): 480 samples @ 48kHz.
            writer.write_packet(vec![0x00, 0xab], 1, PacketWriteEndInfo::EndStream, 480).unwrap();
        }
        ogg_bytes
    }

    #[test]
    fn ogg_to_caf_preserves_packet_payload_and_duration() {
        let caf_bytes = ogg_opus_to_caf(&sample_ogg_stream()).unwrap();
        assert!(caf_bytes.starts_with(b"caff"));

        let file = caf::read_caf(&caf_bytes).unwrap();
        assert_eq!(file.channels, 1);
        assert_eq!(file.packets.len(), 1);
        assert_eq!(file.packets[0].bytes, vec![0x00, 0xab]);
        assert_eq!(file.packets[0].frames, 480);
    }

    #[test]
    fn caf_to_ogg_round_trip_preserves_packet_sequence_and_granule() {
        let caf_bytes = ogg_opus_to_caf(&sample_ogg_stream()).unwrap();
        let ogg_roundtrip = caf_opus_to_ogg(&caf_bytes).unwrap();

        let mut reader = PacketReader::new(Cursor::new(&ogg_roundtrip));
        let _head = reader.read_packet().unwrap().unwrap();
        let _tags = reader.read_packet().unwrap().unwrap();
        let audio = reader.read_packet().unwrap().unwrap();
        assert_eq!(audio.data, vec![0x00, 0xab]);
        assert_eq!(audio.absgp_page, 480);
        assert!(reader.read_packet().unwrap().is_none());
    }
}
