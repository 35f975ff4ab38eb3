//! Frame writer/reader: magic number, frame descriptor, window descriptor,
//! dictionary ID, frame content size, and checksum trailer.
//!
//! Fixed-layout header read via explicit byte indexing, with a write side
//! mirroring the read side field for field.

use crate::error::{ErrorCode, Res};
use crate::xxhash::Xxh64;

pub const MAGIC: u32 = 0xFD2FB528;

#[derive(Debug, Clone, Copy)]
pub struct FrameDescriptor {
    pub dict_id_size: u8, // 0, 1, 2, or 4 bytes
    pub checksum_flag: bool,
    pub single_segment: bool,
    pub fcs_code: u8, // 0..=3
}

impl FrameDescriptor {
    fn dict_id_bits(&self) -> u8 {
        match self.dict_id_size {
            0 => 0,
            1 => 1,
            2 => 2,
            4 => 3,
            _ => unreachable!("dict id size must be 0/1/2/4"),
        }
    }

    pub fn to_byte(self) -> u8 {
        self.dict_id_bits()
            | (self.checksum_flag as u8) << 2
            | (self.single_segment as u8) << 5
            | (self.fcs_code & 0x3) << 6
    }

    pub fn from_byte(byte: u8) -> Res<Self> {
        let dict_id_bits = byte & 0x3;
        let checksum_flag = (byte >> 2) & 1 != 0;
        let single_segment = (byte >> 5) & 1 != 0;
        let reserved = (byte >> 4) & 1;
        crate::ensure!(reserved == 0, ErrorCode::FrameParameterUnsupported, "frame descriptor reserved bit set");
        let fcs_code = (byte >> 6) & 0x3;
        let dict_id_size = match dict_id_bits {
            0 => 0,
            1 => 1,
            2 => 2,
            3 => 4,
            _ => unreachable!(),
        };
        Ok(FrameDescriptor { dict_id_size, checksum_flag, single_segment, fcs_code })
    }

    /// Length in bytes of the frame content size field implied by
    /// `fcs_code`/`single_segment`: 0/1/2/8 bytes, with the 1-byte form
    /// present only when `single_segment` is set.
    fn fcs_byte_len(&self) -> usize {
        match (self.fcs_code, self.single_segment) {
            (0, true) => 1,
            (0, false) => 0,
            (1, _) => 2,
            (2, _) => 4,
            (3, _) => 8,
            _ => unreachable!(),
        }
    }
}

pub struct FrameHeader {
    pub descriptor: FrameDescriptor,
    pub window_log: Option<u32>,
    pub dict_id: Option<u32>,
    pub content_size: Option<u64>,
}

pub fn write_frame_header(header: &FrameHeader, out: &mut Vec<u8>) {
    out.extend_from_slice(&MAGIC.to_le_bytes());
    out.push(header.descriptor.to_byte());

    if !header.descriptor.single_segment {
        let log = header.window_log.expect("windowLog required unless singleSegment");
        out.push(((log - 10) as u8) << 3);
    }

    if let Some(id) = header.dict_id {
        match header.descriptor.dict_id_size {
            1 => out.push(id as u8),
            2 => out.extend_from_slice(&(id as u16).to_le_bytes()),
            4 => out.extend_from_slice(&id.to_le_bytes()),
            _ => {}
        }
    }

    if let Some(size) = header.content_size {
        match header.descriptor.fcs_byte_len() {
            1 => out.push(size as u8),
            2 => out.extend_from_slice(&((size - 256) as u16).to_le_bytes()),
            4 => out.extend_from_slice(&(size as u32).to_le_bytes()),
            8 => out.extend_from_slice(&size.to_le_bytes()),
            _ => {}
        }
    }
}

pub fn read_frame_header(data: &[u8]) -> Res<(FrameHeader, &[u8])> {
    crate::ensure!(data.len() >= 5, ErrorCode::PrefixUnknown, "input too short for a frame header");
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    crate::ensure!(magic == MAGIC, ErrorCode::PrefixUnknown, "bad magic number {magic:#010x}");

    let descriptor = FrameDescriptor::from_byte(data[4])?;
    let mut rest = &data[5..];

    let window_log = if !descriptor.single_segment {
        crate::ensure!(!rest.is_empty(), ErrorCode::CorruptionDetected, "missing window-log byte");
        let exponent = (rest[0] >> 3) + 10;
        rest = &rest[1..];
        Some(exponent as u32)
    } else {
        None
    };

    let dict_id = match descriptor.dict_id_size {
        0 => None,
        1 => {
            crate::ensure!(!rest.is_empty(), ErrorCode::CorruptionDetected, "truncated dictID");
            let v = rest[0] as u32;
            rest = &rest[1..];
            Some(v)
        }
        2 => {
            crate::ensure!(rest.len() >= 2, ErrorCode::CorruptionDetected, "truncated dictID");
            let v = u16::from_le_bytes([rest[0], rest[1]]) as u32;
            rest = &rest[2..];
            Some(v)
        }
        4 => {
            crate::ensure!(rest.len() >= 4, ErrorCode::CorruptionDetected, "truncated dictID");
            let v = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
            rest = &rest[4..];
            Some(v)
        }
        _ => unreachable!(),
    };

    let fcs_len = descriptor.fcs_byte_len();
    let content_size = match fcs_len {
        0 => None,
        1 => {
            crate::ensure!(!rest.is_empty(), ErrorCode::CorruptionDetected, "truncated content size");
            let v = rest[0] as u64;
            rest = &rest[1..];
            Some(v)
        }
        2 => {
            crate::ensure!(rest.len() >= 2, ErrorCode::CorruptionDetected, "truncated content size");
            let v = u16::from_le_bytes([rest[0], rest[1]]) as u64 + 256;
            rest = &rest[2..];
            Some(v)
        }
        4 => {
            crate::ensure!(rest.len() >= 4, ErrorCode::CorruptionDetected, "truncated content size");
            let v = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as u64;
            rest = &rest[4..];
            Some(v)
        }
        8 => {
            crate::ensure!(rest.len() >= 8, ErrorCode::CorruptionDetected, "truncated content size");
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(&rest[..8]);
            rest = &rest[8..];
            Some(u64::from_le_bytes(bytes))
        }
        _ => unreachable!(),
    };

    Ok((FrameHeader { descriptor, window_log, dict_id, content_size }, rest))
}

pub fn write_block_header(header: &crate::block::BlockHeader, out: &mut Vec<u8>) {
    out.extend_from_slice(&header.encode());
}

/// Checksum trailer: low 32 bits of xxh64 of the uncompressed content.
pub fn checksum_trailer(hasher: &Xxh64) -> [u8; 4] {
    hasher.digest_low32().to_le_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_with_all_fields() {
        let header = FrameHeader {
            descriptor: FrameDescriptor { dict_id_size: 4, checksum_flag: true, single_segment: false, fcs_code: 2 },
            window_log: Some(20),
            dict_id: Some(0xdeadbeef),
            content_size: Some(1_000_000),
        };
        let mut out = Vec::new();
        write_frame_header(&header, &mut out);
        let (parsed, rest) = read_frame_header(&out).unwrap();
        assert!(rest.is_empty());
        assert_eq!(parsed.window_log, Some(20));
        assert_eq!(parsed.dict_id, Some(0xdeadbeef));
        assert_eq!(parsed.content_size, Some(1_000_000));
        assert!(parsed.descriptor.checksum_flag);
    }

    #[test]
    fn empty_input_single_segment_header_matches_size() {
        let header = FrameHeader {
            descriptor: FrameDescriptor { dict_id_size: 0, checksum_flag: false, single_segment: true, fcs_code: 0 },
            window_log: None,
            dict_id: None,
            content_size: Some(0),
        };
        let mut out = Vec::new();
        write_frame_header(&header, &mut out);
        // magic(4) + descriptor(1) + content-size byte(1)
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn rejects_bad_magic() {
        let data = [0, 0, 0, 0, 0];
        assert!(read_frame_header(&data).is_err());
    }
}
