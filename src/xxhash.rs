//! xxHash64, used for the frame checksum trailer.
//!
//! The zstd frame format always uses seed 0. This is a standalone
//! reimplementation of the public xxHash64 algorithm; the constants below
//! are the algorithm's published primes.

const PRIME1: u64 = 0x9E3779B185EBCA87;
const PRIME2: u64 = 0xC2B2AE3D27D4EB4F;
const PRIME3: u64 = 0x165667B19E3779F9;
const PRIME4: u64 = 0x85EBCA77C2B2AE63;
const PRIME5: u64 = 0x27D4EB2F165667C5;

#[inline]
fn round(acc: u64, input: u64) -> u64 {
    let acc = acc.wrapping_add(input.wrapping_mul(PRIME2));
    acc.rotate_left(31).wrapping_mul(PRIME1)
}

#[inline]
fn merge_round(acc: u64, val: u64) -> u64 {
    let val = round(0, val);
    let acc = acc ^ val;
    acc.wrapping_mul(PRIME1).wrapping_add(PRIME4)
}

/// Streaming xxh64 accumulator, seeded at 0 as required by the zstd frame
/// checksum.
#[derive(Clone)]
pub struct Xxh64 {
    seed: u64,
    total_len: u64,
    v: [u64; 4],
    buf: [u8; 32],
    buf_len: usize,
}

impl Default for Xxh64 {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Xxh64 {
    pub fn new(seed: u64) -> Self {
        Xxh64 {
            seed,
            total_len: 0,
            v: [
                seed.wrapping_add(PRIME1).wrapping_add(PRIME2),
                seed.wrapping_add(PRIME2),
                seed,
                seed.wrapping_sub(PRIME1),
            ],
            buf: [0; 32],
            buf_len: 0,
        }
    }

    pub fn update(&mut self, mut data: &[u8]) {
        self.total_len += data.len() as u64;

        if self.buf_len > 0 {
            let need = 32 - self.buf_len;
            let take = need.min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];
            if self.buf_len < 32 {
                return;
            }
            let buf = self.buf;
            for lane in 0..4 {
                let word = u64::from_le_bytes(buf[lane * 8..lane * 8 + 8].try_into().unwrap());
                self.v[lane] = round(self.v[lane], word);
            }
            self.buf_len = 0;
        }

        while data.len() >= 32 {
            for lane in 0..4 {
                let word = u64::from_le_bytes(data[lane * 8..lane * 8 + 8].try_into().unwrap());
                self.v[lane] = round(self.v[lane], word);
            }
            data = &data[32..];
        }

        if !data.is_empty() {
            self.buf[..data.len()].copy_from_slice(data);
            self.buf_len = data.len();
        }
    }

    pub fn digest(&self) -> u64 {
        let mut acc = if self.total_len >= 32 {
            let mut acc = self.v[0]
                .rotate_left(1)
                .wrapping_add(self.v[1].rotate_left(7))
                .wrapping_add(self.v[2].rotate_left(12))
                .wrapping_add(self.v[3].rotate_left(18));
            for &v in &self.v {
                acc = merge_round(acc, v);
            }
            acc
        } else {
            self.seed.wrapping_add(PRIME5)
        };

        acc = acc.wrapping_add(self.total_len);

        let mut rest = &self.buf[..self.buf_len];
        while rest.len() >= 8 {
            let word = u64::from_le_bytes(rest[..8].try_into().unwrap());
            acc ^= round(0, word);
            acc = acc.rotate_left(27).wrapping_mul(PRIME1).wrapping_add(PRIME4);
            rest = &rest[8..];
        }
        if rest.len() >= 4 {
            let word = u32::from_le_bytes(rest[..4].try_into().unwrap()) as u64;
            acc ^= word.wrapping_mul(PRIME1);
            acc = acc.rotate_left(23).wrapping_mul(PRIME2).wrapping_add(PRIME3);
            rest = &rest[4..];
        }
        for &byte in rest {
            acc ^= (byte as u64).wrapping_mul(PRIME5);
            acc = acc.rotate_left(11).wrapping_mul(PRIME1);
        }

        acc ^= acc >> 33;
        acc = acc.wrapping_mul(PRIME2);
        acc ^= acc >> 29;
        acc = acc.wrapping_mul(PRIME3);
        acc ^= acc >> 32;
        acc
    }

    /// The low 32 bits of the digest, as used by the frame checksum.
    pub fn digest_low32(&self) -> u32 {
        self.digest() as u32
    }
}

/// One-shot convenience wrapper over [`Xxh64`].
pub fn xxh64(data: &[u8], seed: u64) -> u64 {
    let mut h = Xxh64::new(seed);
    h.update(data);
    h.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_matches_known_vector() {
        // Published reference vector for xxh64("", seed=0).
        assert_eq!(xxh64(b"", 0), 0xEF46DB3751D8E999);
    }

    #[test]
    fn streaming_matches_one_shot() {
        let data: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        let one_shot = xxh64(&data, 0);
        let mut streaming = Xxh64::new(0);
        for chunk in data.chunks(7) {
            streaming.update(chunk);
        }
        assert_eq!(one_shot, streaming.digest());
    }
}
