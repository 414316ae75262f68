//! xxHash64, used for the optional frame content checksum.
//!
//! The frame trailer only ever needs the lower 32 bits of the final hash,
//! but the algorithm itself is defined over 64-bit accumulators throughout.

const PRIME_1: u64 = 0x9E3779B185EBCA87;
const PRIME_2: u64 = 0xC2B2AE3D27D4EB4F;
const PRIME_3: u64 = 0x165667B19E3779F9;
const PRIME_4: u64 = 0x85EBCA77C2B2AE63;
const PRIME_5: u64 = 0x27D4EB2F165667C5;

pub struct XxHash64 {
    seed: u64,
    total_len: u64,
    v: [u64; 4],
    buf: [u8; 32],
    buf_len: usize,
}

impl XxHash64 {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            total_len: 0,
            v: [
                seed.wrapping_add(PRIME_1).wrapping_add(PRIME_2),
                seed.wrapping_add(PRIME_2),
                seed,
                seed.wrapping_sub(PRIME_1),
            ],
            buf: [0; 32],
            buf_len: 0,
        }
    }

    pub fn write(&mut self, mut data: &[u8]) {
        self.total_len += data.len() as u64;

        if self.buf_len > 0 {
            let want = 32 - self.buf_len;
            let take = want.min(data.len());
            self.buf[self.buf_len..self.buf_len + take].copy_from_slice(&data[..take]);
            self.buf_len += take;
            data = &data[take..];

            if self.buf_len == 32 {
                let buf = self.buf;
                for lane in 0..4 {
                    let bytes = &buf[lane * 8..lane * 8 + 8];
                    self.v[lane] = round(self.v[lane], u64::from_le_bytes(bytes.try_into().unwrap()));
                }
                self.buf_len = 0;
            }
        }

        while data.len() >= 32 {
            for lane in 0..4 {
                let bytes = &data[lane * 8..lane * 8 + 8];
                self.v[lane] = round(self.v[lane], u64::from_le_bytes(bytes.try_into().unwrap()));
            }
            data = &data[32..];
        }

        if !data.is_empty() {
            self.buf[..data.len()].copy_from_slice(data);
            self.buf_len = data.len();
        }
    }

    pub fn finish(&self) -> u64 {
        let mut acc = if self.total_len >= 32 {
            let mut acc = self.v[0]
                .rotate_left(1)
                .wrapping_add(self.v[1].rotate_left(7))
                .wrapping_add(self.v[2].rotate_left(12))
                .wrapping_add(self.v[3].rotate_left(18));
            for &v in &self.v {
                acc ^= round(0, v);
                acc = acc.wrapping_mul(PRIME_1).wrapping_add(PRIME_4);
            }
            acc
        } else {
            self.seed.wrapping_add(PRIME_5)
        };

        acc = acc.wrapping_add(self.total_len);

        let mut rest = &self.buf[..self.buf_len];
        while rest.len() >= 8 {
            let lane = u64::from_le_bytes(rest[..8].try_into().unwrap());
            acc ^= round(0, lane);
            acc = acc.rotate_left(27).wrapping_mul(PRIME_1).wrapping_add(PRIME_4);
            rest = &rest[8..];
        }
        if rest.len() >= 4 {
            let lane = u32::from_le_bytes(rest[..4].try_into().unwrap()) as u64;
            acc ^= lane.wrapping_mul(PRIME_1);
            acc = acc.rotate_left(23).wrapping_mul(PRIME_2).wrapping_add(PRIME_3);
            rest = &rest[4..];
        }
        for &byte in rest {
            acc ^= (byte as u64).wrapping_mul(PRIME_5);
            acc = acc.rotate_left(11).wrapping_mul(PRIME_1);
        }

        acc = avalanche(acc);
        acc
    }
}

fn round(acc: u64, input: u64) -> u64 {
    let acc = acc.wrapping_add(input.wrapping_mul(PRIME_2));
    let acc = acc.rotate_left(31);
    acc.wrapping_mul(PRIME_1)
}

fn avalanche(mut acc: u64) -> u64 {
    acc ^= acc >> 33;
    acc = acc.wrapping_mul(PRIME_2);
    acc ^= acc >> 29;
    acc = acc.wrapping_mul(PRIME_3);
    acc ^= acc >> 32;
    acc
}

/// One-shot hash of a whole buffer with seed zero, as used for the frame
/// content checksum.
pub fn hash(data: &[u8]) -> u64 {
    let mut h = XxHash64::new(0);
    h.write(data);
    h.finish()
}

/// The lower 32 bits of `hash(data)`, as stored in the frame trailer.
pub fn checksum(data: &[u8]) -> u32 {
    hash(data) as u32
}
