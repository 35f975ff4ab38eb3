//! Bit-level I/O.
//!
//! Two halves make up a matching writer/reader pair: [`writer::BitWriter`]
//! accumulates bits growing toward increasing addresses, and
//! [`reader::BitReader`] seeds itself from the tail of the buffer and
//! consumes most-significant-bit first, so that a stream written by
//! iterating symbols back-to-front is read out front-to-back.

mod reader;
mod writer;

pub use reader::{BitReader, ReloadStatus};
pub use writer::BitWriter;

/// Bits held by one container word. Fixed at 64 regardless of host pointer
/// width so stream layout does not depend on the build target.
pub const CONTAINER_BITS: u32 = 64;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_varied_widths() {
        let mut w = BitWriter::new();
        let widths_and_values: Vec<(u32, u64)> =
            vec![(1, 1), (3, 5), (9, 300), (16, 0xBEEF), (24, 0x123456), (0, 0)];
        for &(width, value) in widths_and_values.iter().rev() {
            w.add_bits(value, width);
        }
        let bytes = w.finish();

        let mut r = BitReader::new(&bytes).unwrap();
        for &(width, value) in &widths_and_values {
            assert_eq!(r.read_bits(width), value);
        }
    }
}
