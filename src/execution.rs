//! Sequence execution: replays a decoded
//! `(literalsLength, matchLength, offset)` triple list against the literals
//! buffer, writing into the frame's growing output region.

use crate::blocks::sequence_section::Sequence;
use crate::error::DecompressError;

/// Copies literals and matches for one block's sequences into
/// `output[..]`, starting at `written` and never reading before
/// `frame_origin` (the first output byte of the current frame). Returns the
/// new `written` cursor.
pub fn execute_sequences(
    output: &mut [u8],
    mut written: usize,
    frame_origin: usize,
    literals: &[u8],
    sequences: &[Sequence],
) -> Result<usize, DecompressError> {
    let mut literal_pos = 0usize;

    for seq in sequences {
        let ll = seq.ll as usize;
        let remaining = literals.len() - literal_pos;
        if ll > remaining {
            return Err(DecompressError::malformed(
                written,
                "sequence literals length exceeds the literals buffer",
            ));
        }
        copy_literals(output, &mut written, literals, &mut literal_pos, ll)?;

        let ml = seq.ml as usize;
        if ml > 0 {
            let offset = seq.of as usize;
            if offset == 0 || offset > written - frame_origin {
                return Err(DecompressError::malformed(
                    written,
                    "match offset points before the frame origin",
                ));
            }
            let match_start = written - offset;
            if written + ml > output.len() {
                return Err(DecompressError::OutputTooSmall {
                    needed: written + ml,
                    got: output.len(),
                });
            }
            copy_match(output, written, offset, ml);
            written += ml;
            let _ = match_start;
        }
    }

    // Trailing literals residue: bytes past the last sequence's literals
    // that belong to this block's literals section but aren't covered by
    // any sequence.
    let residue = literals.len() - literal_pos;
    copy_literals(output, &mut written, literals, &mut literal_pos, residue)?;

    Ok(written)
}

fn copy_literals(
    output: &mut [u8],
    written: &mut usize,
    literals: &[u8],
    literal_pos: &mut usize,
    len: usize,
) -> Result<(), DecompressError> {
    if *written + len > output.len() {
        return Err(DecompressError::OutputTooSmall {
            needed: *written + len,
            got: output.len(),
        });
    }
    output[*written..*written + len].copy_from_slice(&literals[*literal_pos..*literal_pos + len]);
    *written += len;
    *literal_pos += len;
    Ok(())
}

/// Copies `len` bytes of a back-reference match into `output`, reading from
/// `dest_start - offset` and writing to `dest_start`. Proceeds one byte at a
/// time in increasing address order, which is what makes self-overlapping
/// offsets (an offset smaller than the match length, e.g. an RLE run) see
/// their own just-written bytes rather than stale data.
fn copy_match(output: &mut [u8], dest_start: usize, offset: usize, len: usize) {
    for i in 0..len {
        output[dest_start + i] = output[dest_start + i - offset];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copies_plain_literals_with_no_sequences() {
        let mut output = vec![0u8; 16];
        let written = execute_sequences(&mut output, 0, 0, b"hello world", &[]).unwrap();
        assert_eq!(written, 11);
        assert_eq!(&output[..11], b"hello world");
    }

    #[test]
    fn replays_a_non_overlapping_match() {
        let mut output = vec![0u8; 32];
        let literals = b"abcdefg";
        let sequences = [Sequence { ll: 7, ml: 4, of: 7 }];
        let written = execute_sequences(&mut output, 0, 0, literals, &sequences).unwrap();
        assert_eq!(&output[..11], b"abcdefgabcd");
        assert_eq!(written, 11);
    }

    #[test]
    fn replays_an_overlapping_rle_style_match() {
        let mut output = vec![0u8; 32];
        let literals = b"a";
        let sequences = [Sequence { ll: 1, ml: 10, of: 1 }];
        let written = execute_sequences(&mut output, 0, 0, literals, &sequences).unwrap();
        assert_eq!(&output[..11], &[b'a'; 11][..]);
        assert_eq!(written, 11);
    }

    #[test]
    fn rejects_a_match_reaching_before_the_frame_origin() {
        let mut output = vec![0u8; 32];
        output[0..5].copy_from_slice(b"prior");
        let literals: &[u8] = b"";
        let sequences = [Sequence { ll: 0, ml: 4, of: 10 }];
        // frame_origin = 5, written starts at 5: offset 10 would read before origin.
        let result = execute_sequences(&mut output, 5, 5, literals, &sequences);
        assert!(result.is_err());
    }
}
