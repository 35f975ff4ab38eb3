//! Decompression side: frame parsing, block iteration, and sequence
//! execution against a growing output window.
//!
//! Each block is parsed by type (raw, RLE, or entropy-compressed), then
//! its sequences are replayed: literal runs are copied verbatim and
//! back-references are copied byte-by-byte so overlapping matches (source
//! and destination ranges intersecting, as in run-length patterns) work.

use crate::block::{decode_block_body, BlockHeader, BlockType};
use crate::error::{ErrorCode, Res};
use crate::frame::{read_frame_header, MAGIC};
use crate::sequences::RepOffsets;
use crate::xxhash::Xxh64;

/// Decompress one or more concatenated frames ("framing independence") into
/// a single output buffer.
pub fn decompress(mut data: &[u8]) -> Res<Vec<u8>> {
    let mut out = Vec::new();
    while !data.is_empty() {
        data = decompress_one_frame(data, &mut out)?;
    }
    Ok(out)
}

fn decompress_one_frame<'a>(data: &'a [u8], out: &mut Vec<u8>) -> Res<&'a [u8]> {
    crate::ensure!(data.len() >= 4, ErrorCode::PrefixUnknown, "truncated frame magic");
    let magic = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    crate::ensure!(magic == MAGIC, ErrorCode::PrefixUnknown, "bad magic number {magic:#010x}");

    let (header, mut rest) = read_frame_header(data)?;
    log::debug!("decoding frame, descriptor {:?}", header.descriptor);
    let start = out.len();
    let mut rep = RepOffsets::new();
    let mut hasher = header.descriptor.checksum_flag.then(Xxh64::default);

    loop {
        crate::ensure!(rest.len() >= 3, ErrorCode::CorruptionDetected, "truncated block header");
        let mut header_bytes = [0u8; 3];
        header_bytes.copy_from_slice(&rest[..3]);
        let block_header = BlockHeader::decode(header_bytes)?;
        rest = &rest[3..];

        let block_size = block_header.block_size as usize;
        log::trace!("block type {:?}, size {block_size}, last {}", block_header.block_type, block_header.last_block);
        match block_header.block_type {
            BlockType::Raw => {
                crate::ensure!(rest.len() >= block_size, ErrorCode::CorruptionDetected, "truncated raw block");
                let (body, tail) = rest.split_at(block_size);
                out.extend_from_slice(body);
                rest = tail;
            }
            BlockType::Rle => {
                crate::ensure!(!rest.is_empty(), ErrorCode::CorruptionDetected, "truncated rle block");
                let byte = rest[0];
                rest = &rest[1..];
                out.resize(out.len() + block_size, byte);
            }
            BlockType::Compressed => {
                crate::ensure!(rest.len() >= block_size, ErrorCode::CorruptionDetected, "truncated compressed block");
                let (body, tail) = rest.split_at(block_size);
                rest = tail;
                let (literals, sequences) = decode_block_body(body)?;
                execute_sequences(out, &literals, &sequences, &mut rep)?;
            }
        }

        if let Some(hasher) = &mut hasher {
            hasher.update(&out[start..]);
        }

        if block_header.last_block {
            break;
        }
    }

    if let Some(hasher) = hasher {
        crate::ensure!(rest.len() >= 4, ErrorCode::CorruptionDetected, "missing checksum trailer");
        let expected = hasher.digest_low32();
        let actual = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
        crate::ensure!(expected == actual, ErrorCode::ChecksumWrong, "content checksum mismatch");
        rest = &rest[4..];
    }

    Ok(rest)
}

/// Replay a block's sequences against the growing `out` buffer: copy each
/// sequence's literal run from `literals`, then copy `match_length` bytes
/// from `out.len() - offset` (overlap-permitted back-copy), finally
/// appending any trailing literal run with no matching sequence.
fn execute_sequences(out: &mut Vec<u8>, literals: &[u8], sequences: &[crate::sequences::Sequence], rep: &mut RepOffsets) -> Res<()> {
    let mut lit_cursor = 0usize;

    for seq in sequences {
        let lit_len = seq.lit_length as usize;
        crate::ensure!(lit_cursor + lit_len <= literals.len(), ErrorCode::CorruptionDetected, "literal run overruns literals section");
        out.extend_from_slice(&literals[lit_cursor..lit_cursor + lit_len]);
        lit_cursor += lit_len;

        let offset = seq.offset;
        crate::ensure!(offset as usize <= out.len(), ErrorCode::CorruptionDetected, "match offset exceeds decoded history");
        let match_len = seq.match_length as usize;
        let mut src = out.len() - offset as usize;
        for _ in 0..match_len {
            let byte = out[src];
            out.push(byte);
            src += 1;
        }

        let offset_code = crate::sequences::offset_code(offset);
        rep.update(offset_code as u32, seq.lit_length, offset);
    }

    out.extend_from_slice(&literals[lit_cursor..]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{encode_block_body, BlockHeader, BlockType};
    use crate::frame::{write_frame_header, FrameDescriptor, FrameHeader};
    use crate::sequences::{Sequence, SeqStore};

    #[test_log::test]
    fn raw_block_round_trips_through_a_full_frame() {
        let payload = b"hello, streaming world!".to_vec();
        let mut out = Vec::new();
        let header = FrameHeader {
            descriptor: FrameDescriptor { dict_id_size: 0, checksum_flag: false, single_segment: true, fcs_code: 1 },
            window_log: None,
            dict_id: None,
            content_size: Some(payload.len() as u64),
        };
        write_frame_header(&header, &mut out);
        let block = BlockHeader { last_block: true, block_type: BlockType::Raw, block_size: payload.len() as u32 };
        out.extend_from_slice(&block.encode());
        out.extend_from_slice(&payload);

        let decoded = decompress(&out).unwrap();
        assert_eq!(decoded, payload);
    }

    #[test]
    fn rle_block_round_trips() {
        let mut out = Vec::new();
        let header = FrameHeader {
            descriptor: FrameDescriptor { dict_id_size: 0, checksum_flag: false, single_segment: true, fcs_code: 2 },
            window_log: None,
            dict_id: None,
            content_size: Some(300),
        };
        write_frame_header(&header, &mut out);
        let block = BlockHeader { last_block: true, block_type: BlockType::Rle, block_size: 300 };
        out.extend_from_slice(&block.encode());
        out.push(0x5A);

        let decoded = decompress(&out).unwrap();
        assert_eq!(decoded, vec![0x5Au8; 300]);
    }

    #[test_log::test]
    fn compressed_block_with_sequences_reconstructs_original_bytes() {
        // "abcabcabc" = literal "abc" + two matches of length 3 at offset 3.
        let original = b"abcabcabc".to_vec();
        let mut seq_store = SeqStore::new();
        seq_store.push(b"abc", Sequence { lit_length: 3, match_length: 3, offset: 3 });
        seq_store.push(b"", Sequence { lit_length: 0, match_length: 3, offset: 3 });

        let body = encode_block_body(&seq_store, b"abc").expect("should compress");

        let mut out = Vec::new();
        let header = FrameHeader {
            descriptor: FrameDescriptor { dict_id_size: 0, checksum_flag: true, single_segment: true, fcs_code: 1 },
            window_log: None,
            dict_id: None,
            content_size: Some(original.len() as u64),
        };
        write_frame_header(&header, &mut out);
        let block = BlockHeader { last_block: true, block_type: BlockType::Compressed, block_size: body.len() as u32 };
        out.extend_from_slice(&block.encode());
        out.extend_from_slice(&body);
        let mut hasher = Xxh64::default();
        hasher.update(&original);
        out.extend_from_slice(&hasher.digest_low32().to_le_bytes());

        let decoded = decompress(&out).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn bad_checksum_is_rejected() {
        let original = b"checksum me".to_vec();
        let mut out = Vec::new();
        let header = FrameHeader {
            descriptor: FrameDescriptor { dict_id_size: 0, checksum_flag: true, single_segment: true, fcs_code: 1 },
            window_log: None,
            dict_id: None,
            content_size: Some(original.len() as u64),
        };
        write_frame_header(&header, &mut out);
        let block = BlockHeader { last_block: true, block_type: BlockType::Raw, block_size: original.len() as u32 };
        out.extend_from_slice(&block.encode());
        out.extend_from_slice(&original);
        out.extend_from_slice(&0xDEADBEEFu32.to_le_bytes());

        assert!(decompress(&out).is_err());
    }
}
