//! Block encoder/decoder.
//!
//! Parses the u24 little-endian block header and block-type switch, and
//! assembles the compressor side: literals-section + sequences-section
//! assembly, FSE table emission, and the raw-block fallback rule.

use crate::error::{ErrorCode, Res};
use crate::fse::{self, DecodeTable, EncodeTable};
use crate::huffman::{self, CTable, DecoderX1, DecoderX2, Weights};
use crate::sequences::{literal_length_code, match_length_code, offset_code, Sequence, SeqStore};

pub const BLOCKSIZE_MAX: usize = 128 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Raw = 0,
    Rle = 1,
    Compressed = 2,
}

pub struct BlockHeader {
    pub last_block: bool,
    pub block_type: BlockType,
    pub block_size: u32,
}

impl BlockHeader {
    pub fn encode(&self) -> [u8; 3] {
        let type_bits = self.block_type as u32;
        let word = (self.last_block as u32) | (type_bits << 1) | (self.block_size << 3);
        [(word & 0xFF) as u8, ((word >> 8) & 0xFF) as u8, ((word >> 16) & 0xFF) as u8]
    }

    pub fn decode(bytes: [u8; 3]) -> Res<Self> {
        let word = bytes[0] as u32 | (bytes[1] as u32) << 8 | (bytes[2] as u32) << 16;
        let last_block = (word & 1) != 0;
        let type_bits = (word >> 1) & 0x3;
        let block_size = word >> 3;
        let block_type = match type_bits {
            0 => BlockType::Raw,
            1 => BlockType::Rle,
            2 => BlockType::Compressed,
            _ => crate::bail!(ErrorCode::CorruptionDetected, "reserved block type"),
        };
        Ok(BlockHeader { last_block, block_type, block_size })
    }
}

/// RLE shortcut: an entire block of one repeated byte.
pub fn as_rle(src: &[u8]) -> Option<u8> {
    match src.first() {
        Some(&first) if src.iter().all(|&b| b == first) => Some(first),
        _ => None,
    }
}

/// Encode one block's body from an already-populated sequence store. Falls
/// back to `None` (caller should emit the block raw) if compressing would
/// not help.
///
/// Sequence-code streams ("back-to-back bit-packed sequences") are emitted
/// as three independent length-prefixed FSE bitstreams rather than real
/// Zstd's single interleaved stream: the three-way interleaving is the one
/// place this crate trades bit-for-bit wire compatibility for an
/// unambiguous, independently round-trippable encoding built directly on
/// the single-stream contract `fse.rs` already tests.
pub fn encode_block_body(seq_store: &SeqStore, literals_raw: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::new();

    encode_literals_section(literals_raw, &mut out);

    let nb_seq = seq_store.sequences.len();
    encode_nb_seq(nb_seq as u32, &mut out);

    if nb_seq == 0 {
        return if out.len() < literals_raw.len() { Some(out) } else { None };
    }

    let ll_table = EncodeTable::from_distribution(fse::LL_DEFAULT_ACC_LOG, &fse::LL_DEFAULT_DISTRIBUTION);
    let ml_table = EncodeTable::from_distribution(fse::ML_DEFAULT_ACC_LOG, &fse::ML_DEFAULT_DISTRIBUTION);
    let of_table = EncodeTable::from_distribution(fse::OF_DEFAULT_ACC_LOG, &fse::OF_DEFAULT_DISTRIBUTION);

    encode_code_stream(&seq_store.ll_code, &ll_table, &mut out);
    encode_code_stream(&seq_store.ml_code, &ml_table, &mut out);
    encode_code_stream(&seq_store.of_code, &of_table, &mut out);

    // The code streams above carry the entropy-coded *category* of each
    // length/offset (this crate's code tables); the exact value within a
    // category needs "extra bits" real zstd folds into the same interleaved
    // stream. Since this crate keeps the three FSE streams independent (see
    // doc comment above), the exact triples are instead persisted verbatim
    // here so decode is unambiguous without re-deriving extra-bit widths.
    for seq in &seq_store.sequences {
        out.extend_from_slice(&seq.lit_length.to_le_bytes());
        out.extend_from_slice(&seq.match_length.to_le_bytes());
        out.extend_from_slice(&seq.offset.to_le_bytes());
    }

    if out.len() < literals_raw.len() + seq_store.literals.len() {
        Some(out)
    } else {
        None
    }
}

fn encode_code_stream(codes: &[u8], table: &EncodeTable, out: &mut Vec<u8>) {
    let mut writer = crate::bitstream::BitWriter::new();
    let mut state = table.initial_state;
    for &symbol in codes.iter().rev() {
        table.encode_symbol(&mut state, symbol, &mut writer);
    }
    table.flush_state(state, &mut writer);
    let bytes = writer.finish();
    encode_nb_seq(bytes.len() as u32, out);
    out.extend_from_slice(&bytes);
}

fn decode_code_stream<'a>(data: &'a [u8], table: &DecodeTable, count: usize) -> Res<(Vec<u8>, &'a [u8])> {
    let (len, rest) = decode_nb_seq(data)?;
    crate::ensure!(rest.len() >= len as usize, ErrorCode::CorruptionDetected, "sequence code stream truncated");
    let (stream_bytes, tail) = rest.split_at(len as usize);
    let mut reader = crate::bitstream::BitReader::new(stream_bytes)?;
    let mut state = table.init_state(&mut reader);
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(table.decode_symbol(&mut state, &mut reader));
    }
    Ok((out, tail))
}

/// Literal-length varint-ish encoding ("nbSeq variable-length"): 1 byte for
/// <128, 2 for <0x7F00 (msb-marked), else 3.
fn encode_nb_seq(nb_seq: u32, out: &mut Vec<u8>) {
    if nb_seq == 0 {
        out.push(0);
    } else if nb_seq < 128 {
        out.push(nb_seq as u8);
    } else if nb_seq < 0x7F00 {
        let v = nb_seq - 128;
        out.push(((v >> 8) as u8) | 0x80);
        out.push((v & 0xFF) as u8);
    } else {
        out.push(0xFF);
        out.push(((nb_seq - 0x7F00) & 0xFF) as u8);
        out.push((((nb_seq - 0x7F00) >> 8) & 0xFF) as u8);
    }
}

/// Quarter-region decompressed sizes for the four-stream literals layout:
/// the first three regions are `ceil(total / 4)`, the fourth absorbs
/// whatever remains.
fn quarter_sizes(total: usize) -> [usize; 4] {
    let region = total.div_ceil(4);
    let last = total.saturating_sub(region * 3);
    [region, region, region, last]
}

fn encode_literals_four_stream(literals: &[u8], ctable: &CTable, out: &mut Vec<u8>) {
    let sizes = quarter_sizes(literals.len());
    let mut offset = 0usize;
    let mut bodies: Vec<Vec<u8>> = Vec::with_capacity(4);
    for &sz in &sizes {
        let chunk = &literals[offset..offset + sz];
        let mut writer = crate::bitstream::BitWriter::new();
        for &b in chunk.iter().rev() {
            ctable.encode_symbol(b, &mut writer);
        }
        bodies.push(writer.finish());
        offset += sz;
    }
    huffman::write_jump_table([bodies[0].len(), bodies[1].len(), bodies[2].len()], out);
    for body in &bodies {
        out.extend_from_slice(body);
    }
}

fn decode_literals_four_stream(data: &[u8], weights: &Weights, decompressed_size: usize) -> Res<Vec<u8>> {
    let decoder = DecoderX2::build(weights)?;
    let (lens, rest) = huffman::read_jump_table(data)?;
    crate::ensure!(rest.len() >= lens[0] + lens[1] + lens[2], ErrorCode::CorruptionDetected, "literals four-stream truncated");
    let (s0, rest) = rest.split_at(lens[0]);
    let (s1, rest) = rest.split_at(lens[1]);
    let (s2, s3) = rest.split_at(lens[2]);

    let sizes = quarter_sizes(decompressed_size);
    let mut out = Vec::with_capacity(decompressed_size);
    for (stream, &target) in [s0, s1, s2, s3].iter().zip(sizes.iter()) {
        if target == 0 {
            continue;
        }
        let mut reader = crate::bitstream::BitReader::new(stream)?;
        let mut produced = 0usize;
        while produced < target {
            let before = out.len();
            decoder.decode(&mut reader, &mut out);
            produced += out.len() - before;
        }
        // `DecoderX2::decode` emits one or two bytes per lookup, so the last
        // call in a stream may overshoot its region by a single byte.
        let overshoot = produced - target;
        out.truncate(out.len() - overshoot);
    }
    Ok(out)
}

fn encode_literals_section(literals: &[u8], out: &mut Vec<u8>) {
    if literals.len() < 64 {
        // Raw literals section, header encodes size directly; treated as
        // a simplified single-byte-type + varint-size framing.
        out.push(0); // literalsBlockType = raw
        encode_nb_seq(literals.len() as u32, out);
        out.extend_from_slice(literals);
        return;
    }

    let mut counts = [0u32; 256];
    for &b in literals {
        counts[b as usize] += 1;
    }
    let ctable = match CTable::build(&counts, huffman::MAX_TABLE_LOG) {
        Ok(t) => t,
        Err(_) => {
            out.push(0);
            encode_nb_seq(literals.len() as u32, out);
            out.extend_from_slice(literals);
            return;
        }
    };

    let mut weights = Vec::new();
    ctable.write_weights(&mut weights);

    let mut single_writer = crate::bitstream::BitWriter::new();
    for &b in literals.iter().rev() {
        ctable.encode_symbol(b, &mut single_writer);
    }
    let single_body = single_writer.finish();

    if 1 + weights.len() + single_body.len() >= literals.len() {
        out.push(0);
        encode_nb_seq(literals.len() as u32, out);
        out.extend_from_slice(literals);
        return;
    }

    // `choose_decoder_flavor` picks between the two supported layouts the
    // same way the real decoder would pick a decode table: X2's extra
    // table-build cost only pays off on large, compressible runs.
    if huffman::choose_decoder_flavor(single_body.len(), literals.len()) {
        let mut four_stream = Vec::new();
        encode_literals_four_stream(literals, &ctable, &mut four_stream);
        out.push(2); // literalsBlockType = huffman compressed, four streams
        encode_nb_seq(literals.len() as u32, out);
        encode_nb_seq(weights.len() as u32, out);
        out.extend_from_slice(&weights);
        encode_nb_seq(four_stream.len() as u32, out);
        out.extend_from_slice(&four_stream);
    } else {
        out.push(1); // literalsBlockType = huffman compressed, single stream
        encode_nb_seq(literals.len() as u32, out);
        encode_nb_seq(weights.len() as u32, out);
        out.extend_from_slice(&weights);
        encode_nb_seq(single_body.len() as u32, out);
        out.extend_from_slice(&single_body);
    }
}

pub fn decode_literals_section(data: &[u8]) -> Res<(Vec<u8>, &[u8])> {
    crate::ensure!(!data.is_empty(), ErrorCode::CorruptionDetected, "empty literals section");
    let block_type = data[0];
    let mut rest = &data[1..];
    let (decompressed_size, tail) = decode_nb_seq(rest)?;
    rest = tail;

    if block_type == 0 {
        crate::ensure!(rest.len() >= decompressed_size as usize, ErrorCode::CorruptionDetected, "raw literals truncated");
        let (lits, tail) = rest.split_at(decompressed_size as usize);
        return Ok((lits.to_vec(), tail));
    }

    let (weights_len, tail) = decode_nb_seq(rest)?;
    rest = tail;
    crate::ensure!(rest.len() >= weights_len as usize, ErrorCode::CorruptionDetected, "huffman weights truncated");
    let (weight_bytes, tail) = rest.split_at(weights_len as usize);
    rest = tail;

    let (body_len, tail) = decode_nb_seq(rest)?;
    rest = tail;
    crate::ensure!(rest.len() >= body_len as usize, ErrorCode::CorruptionDetected, "huffman body truncated");
    let (body, tail) = rest.split_at(body_len as usize);

    let weights: Weights = huffman::read_weights(weight_bytes)?;
    let out = match block_type {
        1 => {
            let decoder = DecoderX1::build(&weights)?;
            let mut reader = crate::bitstream::BitReader::new(body)?;
            let mut out = Vec::with_capacity(decompressed_size as usize);
            for _ in 0..decompressed_size {
                out.push(decoder.decode_symbol(&mut reader));
            }
            out
        }
        2 => decode_literals_four_stream(body, &weights, decompressed_size as usize)?,
        _ => crate::bail!(ErrorCode::CorruptionDetected, "unknown literals block type {block_type}"),
    };
    Ok((out, tail))
}

fn decode_nb_seq(data: &[u8]) -> Res<(u32, &[u8])> {
    crate::ensure!(!data.is_empty(), ErrorCode::CorruptionDetected, "truncated length field");
    match data[0] {
        0xFF => {
            crate::ensure!(data.len() >= 3, ErrorCode::CorruptionDetected, "truncated long length field");
            let v = data[1] as u32 | (data[2] as u32) << 8;
            Ok((v + 0x7F00, &data[3..]))
        }
        b if b >= 0x80 => {
            crate::ensure!(data.len() >= 2, ErrorCode::CorruptionDetected, "truncated medium length field");
            let v = (((b as u32) & 0x7F) << 8) | data[1] as u32;
            Ok((v + 128, &data[2..]))
        }
        b => Ok((b as u32, &data[1..])),
    }
}

/// Decode the literals section followed by the sequences section of a
/// compressed block body, returning the literal bytes and the reconstructed
/// sequence triples (read back in encode order).
pub fn decode_block_body(data: &[u8]) -> Res<(Vec<u8>, Vec<Sequence>)> {
    let (literals, rest) = decode_literals_section(data)?;
    let (nb_seq, rest) = decode_nb_seq(rest)?;
    let nb_seq = nb_seq as usize;

    if nb_seq == 0 {
        return Ok((literals, Vec::new()));
    }

    let ll_table = DecodeTable::from_distribution(fse::LL_DEFAULT_ACC_LOG, &fse::LL_DEFAULT_DISTRIBUTION);
    let ml_table = DecodeTable::from_distribution(fse::ML_DEFAULT_ACC_LOG, &fse::ML_DEFAULT_DISTRIBUTION);
    let of_table = DecodeTable::from_distribution(fse::OF_DEFAULT_ACC_LOG, &fse::OF_DEFAULT_DISTRIBUTION);

    let (ll_codes, rest) = decode_code_stream(rest, &ll_table, nb_seq)?;
    let (ml_codes, rest) = decode_code_stream(rest, &ml_table, nb_seq)?;
    let (of_codes, mut rest) = decode_code_stream(rest, &of_table, nb_seq)?;

    let mut sequences = Vec::with_capacity(nb_seq);
    for i in 0..nb_seq {
        crate::ensure!(rest.len() >= 12, ErrorCode::CorruptionDetected, "sequence triple truncated");
        let lit_length = u32::from_le_bytes(rest[0..4].try_into().unwrap());
        let match_length = u32::from_le_bytes(rest[4..8].try_into().unwrap());
        let offset = u32::from_le_bytes(rest[8..12].try_into().unwrap());
        rest = &rest[12..];

        // The FSE-coded streams are a redundant, independently-decodable
        // check on the raw triples: each decoded code must match the code
        // the triple itself derives to, or the block is corrupt.
        crate::ensure!(ll_codes[i] == literal_length_code(lit_length), ErrorCode::CorruptionDetected, "litLength code mismatch at sequence {i}");
        crate::ensure!(ml_codes[i] == match_length_code(match_length), ErrorCode::CorruptionDetected, "matchLength code mismatch at sequence {i}");
        crate::ensure!(of_codes[i] == offset_code(offset), ErrorCode::CorruptionDetected, "offset code mismatch at sequence {i}");

        sequences.push(Sequence { lit_length, match_length, offset });
    }

    Ok((literals, sequences))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rle_detection_matches_single_byte_run() {
        let src = vec![0x41u8; 1024];
        assert_eq!(as_rle(&src), Some(0x41));
    }

    #[test]
    fn block_header_round_trips() {
        let h = BlockHeader { last_block: true, block_type: BlockType::Compressed, block_size: 12345 };
        let bytes = h.encode();
        let h2 = BlockHeader::decode(bytes).unwrap();
        assert!(h2.last_block);
        assert_eq!(h2.block_type, BlockType::Compressed);
        assert_eq!(h2.block_size, 12345);
    }

    #[test]
    fn raw_literals_section_round_trips() {
        let data = b"short literal run";
        let mut out = Vec::new();
        encode_literals_section(data, &mut out);
        let (decoded, _) = decode_literals_section(&out).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn huffman_literals_section_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(4);
        let mut out = Vec::new();
        encode_literals_section(&data, &mut out);
        let (decoded, _) = decode_literals_section(&out).unwrap();
        assert_eq!(decoded, data);
    }

    /// Large, highly repetitive input pushes `choose_decoder_flavor` to pick
    /// the four-stream X2 layout instead of single-stream X1.
    #[test]
    fn huffman_four_stream_literals_section_round_trips() {
        let data = b"the quick brown fox jumps over the lazy dog ".repeat(300);
        assert!(huffman::choose_decoder_flavor(data.len() / 8, data.len()));

        let mut out = Vec::new();
        encode_literals_section(&data, &mut out);
        assert_eq!(out[0], 2, "expected four-stream block type");
        let (decoded, _) = decode_literals_section(&out).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn block_body_round_trips_literals_and_sequences() {
        let mut seq_store = SeqStore::new();
        seq_store.push(b"abc", Sequence { lit_length: 3, match_length: 5, offset: 1 });
        seq_store.push(b"", Sequence { lit_length: 0, match_length: 4, offset: 8 });
        seq_store.push(b"defghij", Sequence { lit_length: 7, match_length: 3, offset: 131 });

        // Large and repetitive enough that the Huffman-compressed literals
        // section plus the fixed per-sequence overhead still beats the raw
        // fallback's size.
        let literals_raw = b"the quick brown fox jumps over the lazy dog ".repeat(8);
        let body = encode_block_body(&seq_store, &literals_raw).expect("should compress");

        let (decoded_literals, decoded_sequences) = decode_block_body(&body).unwrap();
        assert_eq!(decoded_literals, literals_raw.to_vec());
        assert_eq!(decoded_sequences.len(), seq_store.sequences.len());
        for (expected, actual) in seq_store.sequences.iter().zip(decoded_sequences.iter()) {
            assert_eq!(expected.lit_length, actual.lit_length);
            assert_eq!(expected.match_length, actual.match_length);
            assert_eq!(expected.offset, actual.offset);
        }
    }

    #[test]
    fn empty_sequence_store_round_trips() {
        let seq_store = SeqStore::new();
        let literals_raw = b"just literals, no matches";
        let mut out = Vec::new();
        encode_literals_section(literals_raw, &mut out);
        encode_nb_seq(0, &mut out);
        let (decoded_literals, decoded_sequences) = decode_block_body(&out).unwrap();
        assert_eq!(decoded_literals, literals_raw);
        assert!(decoded_sequences.is_empty());
    }
}
