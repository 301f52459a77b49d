// SPDX-FileCopyrightText: 2023 Phoenix R&D GmbH <hello@phnx.im>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Minimal reader/writer for the chunks of Apple's Core Audio Format file
//! that carry a compressed, variable-frames-per-packet stream (Opus).
//! No crate on the registry covers CAF's packet table encoding, so this
//! speaks the chunk layout directly from Apple's published format.

use std::io::{Cursor, Read, Write};

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{OutboundError, OutboundResult};

const FILE_TYPE: u32 = u32::from_be_bytes(*b"caff");
const DESC_TYPE: u32 = u32::from_be_bytes(*b"desc");
const KUKI_TYPE: u32 = u32::from_be_bytes(*b"kuki");
const PAKT_TYPE: u32 = u32::from_be_bytes(*b"pakt");
const DATA_TYPE: u32 = u32::from_be_bytes(*b"data");
const OPUS_FORMAT_ID: u32 = u32::from_be_bytes(*b"opus");

/// One compressed packet: its payload and how many PCM frames it decodes
/// to, needed to rebuild Ogg granule positions on the way back out.
#[derive(Debug, Clone)]
pub struct CafPacket {
    pub bytes: Vec<u8>,
    pub frames: u64,
}

pub struct CafOpusFile {
    pub sample_rate: f64,
    pub channels: u32,
    pub magic_cookie: Vec<u8>,
    pub priming_frames: i32,
    pub remainder_frames: i32,
    pub packets: Vec<CafPacket>,
}

pub fn write_caf(file: &CafOpusFile) -> OutboundResult<Vec<u8>> {
    let mut out = Vec::new();
    out.write_u32::<BigEndian>(FILE_TYPE)?;
    out.write_u16::<BigEndian>(1)?; // mFileVersion
    out.write_u16::<BigEndian>(0)?; // mFileFlags

    let mut desc = Vec::new();
    desc.write_f64::<BigEndian>(file.sample_rate)?;
    desc.write_u32::<BigEndian>(OPUS_FORMAT_ID)?;
    desc.write_u32::<BigEndian>(0)?; // mFormatFlags
    desc.write_u32::<BigEndian>(0)?; // mBytesPerPacket: variable
    desc.write_u32::<BigEndian>(0)?; // mFramesPerPacket: variable
    desc.write_u32::<BigEndian>(file.channels)?;
    desc.write_u32::<BigEndian>(0)?; // mBitsPerChannel: compressed, n/a
    write_chunk(&mut out, DESC_TYPE, &desc)?;

    write_chunk(&mut out, KUKI_TYPE, &file.magic_cookie)?;

    let mut pakt = Vec::new();
    pakt.write_i64::<BigEndian>(file.packets.len() as i64)?;
    let total_frames: u64 = file.packets.iter().map(|p| p.frames).sum();
    pakt.write_i64::<BigEndian>(total_frames as i64)?;
    pakt.write_i32::<BigEndian>(file.priming_frames)?;
    pakt.write_i32::<BigEndian>(file.remainder_frames)?;
    for packet in &file.packets {
        write_var_len_u64(&mut pakt, packet.bytes.len() as u64);
        write_var_len_u64(&mut pakt, packet.frames);
    }
    write_chunk(&mut out, PAKT_TYPE, &pakt)?;

    let mut data = Vec::new();
    data.write_u32::<BigEndian>(0)?; // mEditCount
    for packet in &file.packets {
        data.extend_from_slice(&packet.bytes);
    }
    write_chunk(&mut out, DATA_TYPE, &data)?;

    Ok(out)
}

pub fn read_caf(bytes: &[u8]) -> OutboundResult<CafOpusFile> {
    let mut cursor = Cursor::new(bytes);
    let file_type = cursor.read_u32::<BigEndian>()?;
    if file_type != FILE_TYPE {
        return Err(OutboundError::Codec("not a CAF file".to_string()));
    }
    let _version = cursor.read_u16::<BigEndian>()?;
    let _flags = cursor.read_u16::<BigEndian>()?;

    let mut sample_rate = 0.0;
    let mut channels = 0;
    let mut magic_cookie = Vec::new();
    let mut priming_frames = 0;
    let mut remainder_frames = 0;
    let mut packet_lengths: Vec<(u64, u64)> = Vec::new();
    let mut data = Vec::new();

    while (cursor.position() as usize) < bytes.len() {
        let chunk_type = cursor.read_u32::<BigEndian>()?;
        let chunk_size = cursor.read_i64::<BigEndian>()?;
        let mut payload = vec![0u8; chunk_size.max(0) as usize];
        cursor.read_exact(&mut payload)?;

        if chunk_type == DESC_TYPE {
            let mut d = Cursor::new(&payload);
            sample_rate = d.read_f64::<BigEndian>()?;
            let format_id = d.read_u32::<BigEndian>()?;
            if format_id != OPUS_FORMAT_ID {
                return Err(OutboundError::Codec("CAF file is not Opus-encoded".to_string()));
            }
            let _flags = d.read_u32::<BigEndian>()?;
            let _bytes_per_packet = d.read_u32::<BigEndian>()?;
            let _frames_per_packet = d.read_u32::<BigEndian>()?;
            channels = d.read_u32::<BigEndian>()?;
        } else if chunk_type == KUKI_TYPE {
            magic_cookie = payload;
        } else if chunk_type == PAKT_TYPE {
            let mut p = Cursor::new(&payload);
            let packet_count = p.read_i64::<BigEndian>()?;
            let _valid_frames = p.read_i64::<BigEndian>()?;
            priming_frames = p.read_i32::<BigEndian>()?;
            remainder_frames = p.read_i32::<BigEndian>()?;
            for _ in 0..packet_count {
                let size = read_var_len_u64(&mut p)?;
                let frames = read_var_len_u64(&mut p)?;
                packet_lengths.push((size, frames));
            }
        } else if chunk_type == DATA_TYPE {
            let _edit_count = &payload[..4.min(payload.len())];
            data = payload[4.min(payload.len())..].to_vec();
        }
    }

    let mut packets = Vec::with_capacity(packet_lengths.len());
    let mut offset = 0usize;
    for (size, frames) in packet_lengths {
        let end = offset + size as usize;
        let bytes = data.get(offset..end).ok_or_else(|| OutboundError::Codec("pakt/data length mismatch".to_string()))?.to_vec();
        packets.push(CafPacket { bytes, frames });
        offset = end;
    }

    Ok(CafOpusFile { sample_rate, channels, magic_cookie, priming_frames, remainder_frames, packets })
}

fn write_chunk(out: &mut Vec<u8>, chunk_type: u32, payload: &[u8]) -> OutboundResult<()> {
    out.write_u32::<BigEndian>(chunk_type)?;
    out.write_i64::<BigEndian>(payload.len() as i64)?;
    out.write_all(payload)?;
    Ok(())
}

/// CAF's packet-table integer encoding: big-endian, 7 payload bits per
/// byte, MSB set on every byte but the last.
fn write_var_len_u64(out: &mut Vec<u8>, mut value: u64) {
    let mut stack = Vec::new();
    stack.push((value & 0x7f) as u8);
    value >>= 7;
    while value > 0 {
        stack.push(((value & 0x7f) as u8) | 0x80);
        value >>= 7;
    }
    out.extend(stack.into_iter().rev());
}

fn read_var_len_u64(cursor: &mut Cursor<&Vec<u8>>) -> OutboundResult<u64> {
    let mut value: u64 = 0;
    loop {
        let byte = cursor.read_u8()?;
        value = (value << 7) | (byte & 0x7f) as u64;
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(value)
}
