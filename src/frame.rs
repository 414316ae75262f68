//! Frame framing: magic number, frame header descriptor,
//! window descriptor, dictionary id (rejected if present) and content size.

pub const MAGIC_NUM: u32 = 0xFD2F_B528;
const MAGIC_NUM_V07: u32 = 0xFD2F_B527;
const SKIPPABLE_MAGIC_LOW: u32 = 0x184D_2A50;
const SKIPPABLE_MAGIC_HIGH: u32 = 0x184D_2A5F;

pub const MIN_WINDOW_LOG: u8 = 10;
pub const MIN_WINDOW_SIZE: u64 = 1 << MIN_WINDOW_LOG;
/// Window sizes above this ceiling are rejected; the wire format can
/// express much larger windows but this implementation never needs to
/// address more than an 8 MiB history.
pub const MAX_WINDOW_SIZE: u64 = 1 << 23;

#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub window_size: Option<u64>,
    pub content_size: Option<u64>,
    pub has_checksum: bool,
    pub header_size: usize,
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FrameHeaderError {
    #[error("not enough bytes to read a frame header, got {got}")]
    NotEnoughBytes { got: usize },
    #[error("bad magic number: {found:#010x}")]
    BadMagicNumber { found: u32 },
    #[error("legacy zstd v0.7 frames are not supported")]
    LegacyFrame,
    #[error("skippable frame with magic {magic:#010x} and length {len} bytes")]
    SkippableFrame { magic: u32, len: u32 },
    #[error("custom dictionaries are not supported (dictionary id {dict_id})")]
    DictionaryNotSupported { dict_id: u32 },
    #[error("window size {got} exceeds the maximum of {MAX_WINDOW_SIZE}")]
    WindowTooBig { got: u64 },
    #[error("window size {got} is below the minimum of {MIN_WINDOW_SIZE}")]
    WindowTooSmall { got: u64 },
    #[error("window size {got} is not expressible as base + mantissa*(base/8)")]
    WindowNotExpressible { got: u64 },
}

impl FrameHeader {
    /// Parse the frame header at the front of `source`, including the
    /// 4-byte magic number. Returns the header and the number of bytes it
    /// occupied (equal to `header.header_size`).
    pub fn decode(source: &[u8]) -> Result<Self, FrameHeaderError> {
        if source.len() < 5 {
            return Err(FrameHeaderError::NotEnoughBytes { got: source.len() });
        }
        let magic = u32::from_le_bytes([source[0], source[1], source[2], source[3]]);

        if (SKIPPABLE_MAGIC_LOW..=SKIPPABLE_MAGIC_HIGH).contains(&magic) {
            let len = source
                .get(4..8)
                .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .ok_or(FrameHeaderError::NotEnoughBytes { got: source.len() })?;
            return Err(FrameHeaderError::SkippableFrame { magic, len });
        }
        if magic == MAGIC_NUM_V07 {
            return Err(FrameHeaderError::LegacyFrame);
        }
        if magic != MAGIC_NUM {
            return Err(FrameHeaderError::BadMagicNumber { found: magic });
        }

        let descriptor = source[4];
        let content_size_flag = descriptor >> 6;
        let single_segment = (descriptor >> 5) & 0x1 != 0;
        let has_checksum = (descriptor >> 2) & 0x1 != 0;
        let dict_id_flag = descriptor & 0x3;

        let mut pos = 5usize;

        let window_size = if single_segment {
            None
        } else {
            let &window_descriptor = source
                .get(pos)
                .ok_or(FrameHeaderError::NotEnoughBytes { got: source.len() })?;
            pos += 1;

            let exponent = window_descriptor >> 3;
            let mantissa = window_descriptor & 0x7;
            let base = 1u64 << (10 + exponent as u32);
            let window_size = base + (base / 8) * u64::from(mantissa);

            if window_size < MIN_WINDOW_SIZE {
                return Err(FrameHeaderError::WindowTooSmall { got: window_size });
            }
            if window_size > MAX_WINDOW_SIZE {
                return Err(FrameHeaderError::WindowTooBig { got: window_size });
            }
            Some(window_size)
        };

        let dict_id_len = match dict_id_flag {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };
        if dict_id_len != 0 {
            let bytes = source
                .get(pos..pos + dict_id_len)
                .ok_or(FrameHeaderError::NotEnoughBytes { got: source.len() })?;
            pos += dict_id_len;
            let mut dict_id = 0u32;
            for (i, &b) in bytes.iter().enumerate() {
                dict_id |= u32::from(b) << (8 * i);
            }
            if dict_id != 0 {
                return Err(FrameHeaderError::DictionaryNotSupported { dict_id });
            }
        }

        let fcs_len = match content_size_flag {
            0 => {
                if single_segment {
                    1
                } else {
                    0
                }
            }
            1 => 2,
            2 => 4,
            _ => 8,
        };
        let content_size = if fcs_len == 0 {
            None
        } else {
            let bytes = source
                .get(pos..pos + fcs_len)
                .ok_or(FrameHeaderError::NotEnoughBytes { got: source.len() })?;
            pos += fcs_len;
            let mut fcs = 0u64;
            for (i, &b) in bytes.iter().enumerate() {
                fcs |= u64::from(b) << (8 * i);
            }
            if fcs_len == 2 {
                fcs += 256;
            }
            Some(fcs)
        };

        Ok(Self {
            window_size,
            content_size,
            has_checksum,
            header_size: pos,
        })
    }

    /// Encode a frame header. Always emits a checksum flag and never a
    /// dictionary id. `content_size` is `None` only when the caller has no
    /// size to declare; `window_size` must satisfy the same bounds as
    /// `decode`.
    pub fn encode(content_size: Option<u64>, window_size: u64) -> Result<Vec<u8>, FrameHeaderError> {
        if window_size < MIN_WINDOW_SIZE {
            return Err(FrameHeaderError::WindowTooSmall { got: window_size });
        }
        if window_size > MAX_WINDOW_SIZE {
            return Err(FrameHeaderError::WindowTooBig { got: window_size });
        }

        let mut out = Vec::with_capacity(14);
        out.extend_from_slice(&MAGIC_NUM.to_le_bytes());

        let single_segment = match content_size {
            Some(size) => window_size >= size,
            None => false,
        };

        let content_size_flag: u8 = match content_size {
            None => 0,
            Some(size) if size < 256 => 0,
            Some(size) if size < 65_792 => 1,
            Some(size) if size <= u32::MAX as u64 => 2,
            Some(_) => 3,
        };

        let descriptor = (content_size_flag << 6) | ((single_segment as u8) << 5) | (1 << 2);
        out.push(descriptor);

        if !single_segment {
            let (exponent, mantissa) = window_descriptor_fields(window_size)?;
            out.push((exponent << 3) | mantissa);
        }

        if let Some(size) = content_size {
            match content_size_flag {
                0 => {
                    if single_segment {
                        out.push(size as u8);
                    }
                    // flag 0 with !single_segment means "no content size field".
                }
                1 => out.extend_from_slice(&((size - 256) as u16).to_le_bytes()),
                2 => out.extend_from_slice(&(size as u32).to_le_bytes()),
                _ => out.extend_from_slice(&size.to_le_bytes()),
            }
        }

        Ok(out)
    }
}

/// Decompose `window_size` into `(exponent, mantissa)` such that `window_size
/// == (1 << (10+exponent)) + (1 << (10+exponent)) / 8 * mantissa`.
fn window_descriptor_fields(window_size: u64) -> Result<(u8, u8), FrameHeaderError> {
    if window_size < MIN_WINDOW_SIZE {
        return Err(FrameHeaderError::WindowTooSmall { got: window_size });
    }
    let highest = 63 - window_size.leading_zeros();
    let exponent = highest.saturating_sub(10) as u8;
    let base = 1u64 << (10 + exponent as u32);
    let remainder = window_size - base;
    if remainder % (base / 8) != 0 {
        return Err(FrameHeaderError::WindowNotExpressible { got: window_size });
    }
    let mantissa = (remainder / (base / 8)) as u8;
    if mantissa > 7 {
        return Err(FrameHeaderError::WindowNotExpressible { got: window_size });
    }
    Ok((exponent, mantissa))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_small_frame_header() {
        let bytes = FrameHeader::encode(Some(1000), 1 << 20).unwrap();
        let header = FrameHeader::decode(&bytes).unwrap();
        assert_eq!(header.content_size, Some(1000));
        assert!(header.has_checksum);
        assert_eq!(header.header_size, bytes.len());
    }

    #[test]
    fn round_trips_an_empty_frame_header() {
        let bytes = FrameHeader::encode(Some(0), MIN_WINDOW_SIZE).unwrap();
        let header = FrameHeader::decode(&bytes).unwrap();
        assert_eq!(header.content_size, Some(0));
    }

    #[test]
    fn rejects_bad_magic() {
        let bytes = [0, 0, 0, 0, 0];
        assert!(matches!(
            FrameHeader::decode(&bytes),
            Err(FrameHeaderError::BadMagicNumber { .. })
        ));
    }

    #[test]
    fn rejects_oversized_window() {
        let bytes = {
            let mut v = MAGIC_NUM.to_le_bytes().to_vec();
            v.push(0b0000_0100); // single_segment=0, checksum=0, dict=0
            v.push(0xFF); // exponent=31, mantissa=7: far above the ceiling
            v
        };
        assert!(matches!(
            FrameHeader::decode(&bytes),
            Err(FrameHeaderError::WindowTooBig { .. })
        ));
    }

    #[test]
    fn rejects_dictionary_ids() {
        let bytes = {
            let mut v = MAGIC_NUM.to_le_bytes().to_vec();
            v.push(0b0010_0001); // single_segment=1, dict_id_flag=1
            v.push(7); // dict id byte, content size (1 byte since single-segment, flag 0) comes after
            v.push(0);
            v
        };
        assert!(matches!(
            FrameHeader::decode(&bytes),
            Err(FrameHeaderError::DictionaryNotSupported { .. })
        ));
    }
}
