//! Repeated-offset tracking.
//!
//! Written fresh against the RFC 8478 semantics, rejecting a once-seen
//! variant that self-overwrites `scratch[0]` in its rep-code-2 branch
//! instead of rotating the old `scratch[0]` into `scratch[1]` first. The
//! four repeat codes are
//! kept distinct: a wire value in `1..=3` selects `off1`/`off2`/`off3`
//! respectively (biased up by one when `literals_length == 0`, per the RFC);
//! only when that bias pushes the code to 4 does it mean the special
//! "`off1 - 1`" case. A wire value above 3 is always a literal offset.

/// `[off1, off2, off3]`, most-recently-used first.
pub type Offsets = [u32; 3];

pub const INITIAL_OFFSETS: Offsets = [1, 4, 8];

/// Decode side: turn a wire offset value (already `(1<<offsetCode) + extra`
/// plus the sequence's literals length into a real
/// byte distance, updating `offsets` in place.
pub fn resolve(wire_value: u32, literals_length: u32, offsets: &mut Offsets) -> u32 {
    if wire_value > 3 {
        let resolved = wire_value - 3;
        offsets[2] = offsets[1];
        offsets[1] = offsets[0];
        offsets[0] = resolved;
        return resolved;
    }

    let ll0 = u32::from(literals_length == 0);
    let rep_code = wire_value + ll0;
    match rep_code {
        1 => {
            // off1, no rotation: only reachable when literals_length != 0.
            offsets[0]
        }
        2 => {
            let resolved = offsets[1];
            offsets[1] = offsets[0];
            offsets[0] = resolved;
            resolved
        }
        3 => {
            let resolved = offsets[2];
            offsets[2] = offsets[1];
            offsets[1] = offsets[0];
            offsets[0] = resolved;
            resolved
        }
        _ => {
            let resolved = offsets[0].saturating_sub(1).max(1);
            offsets[2] = offsets[1];
            offsets[1] = offsets[0];
            offsets[0] = resolved;
            resolved
        }
    }
}

/// Encode side: the inverse of `resolve`. Given the real offset the match
/// finder wants to emit, find the wire value that makes `resolve` reproduce
/// it, updating `offsets` the same way `resolve` would. Checked in the same
/// priority order `resolve` would resolve them in, so ties (e.g. `off1 == 1`
/// coinciding with the clamped `off1 - 1` case) never diverge between the
/// two sides.
pub fn encode_offset(desired: u32, literals_length: u32, offsets: &mut Offsets) -> u32 {
    let ll0 = literals_length == 0;

    if !ll0 && desired == offsets[0] {
        return 1;
    }
    if desired == offsets[1] {
        let resolved = offsets[1];
        offsets[1] = offsets[0];
        offsets[0] = resolved;
        return if ll0 { 1 } else { 2 };
    }
    if desired == offsets[2] {
        let resolved = offsets[2];
        offsets[2] = offsets[1];
        offsets[1] = offsets[0];
        offsets[0] = resolved;
        return if ll0 { 2 } else { 3 };
    }
    if ll0 && desired == offsets[0].saturating_sub(1).max(1) {
        let resolved = offsets[0].saturating_sub(1).max(1);
        offsets[2] = offsets[1];
        offsets[1] = offsets[0];
        offsets[0] = resolved;
        return 3;
    }

    offsets[2] = offsets[1];
    offsets[1] = offsets[0];
    offsets[0] = desired;
    desired + 3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_slot_zero_leaves_history_untouched() {
        let mut offsets = INITIAL_OFFSETS;
        let resolved = resolve(1, 5, &mut offsets);
        assert_eq!(resolved, 1);
        assert_eq!(offsets, INITIAL_OFFSETS);
    }

    #[test]
    fn literal_offset_rotates_in_at_front() {
        let mut offsets = INITIAL_OFFSETS;
        let resolved = resolve(100, 5, &mut offsets);
        assert_eq!(resolved, 97);
        assert_eq!(offsets, [97, 1, 4]);
    }

    #[test]
    fn zero_literals_length_biases_the_index_to_off2() {
        let mut offsets = INITIAL_OFFSETS;
        // wire_value=1, ll0=1 -> repCode=2 -> off2 (=4), off1<->off2 swap.
        let resolved = resolve(1, 0, &mut offsets);
        assert_eq!(resolved, 4);
        assert_eq!(offsets, [4, 1, 8]);
    }

    #[test]
    fn rep_code_three_with_nonzero_literals_selects_off3() {
        let mut offsets = INITIAL_OFFSETS;
        // wire_value=3, ll!=0 -> repCode=3 -> off3 (=8), full rotation.
        let resolved = resolve(3, 5, &mut offsets);
        assert_eq!(resolved, 8);
        assert_eq!(offsets, [8, 1, 4]);
    }

    #[test]
    fn rep_code_four_only_reachable_with_zero_literals_uses_off1_minus_one() {
        let mut offsets = INITIAL_OFFSETS;
        // wire_value=3, ll0=1 -> repCode=4 -> off1-1 = 0, clamped to 1.
        let resolved = resolve(3, 0, &mut offsets);
        assert_eq!(resolved, 1);
        assert_eq!(offsets, [1, 1, 4]);
    }

    #[test]
    fn wire_value_four_is_always_literal_regardless_of_literals_length() {
        let mut offsets = INITIAL_OFFSETS;
        let resolved = resolve(4, 0, &mut offsets);
        assert_eq!(resolved, 1);
        assert_eq!(offsets, [1, 1, 4]);
    }

    #[test]
    fn encode_then_resolve_round_trips() {
        let mut enc_offsets = INITIAL_OFFSETS;
        let mut dec_offsets = INITIAL_OFFSETS;

        for &(desired, ll) in &[
            (1u32, 5u32),
            (4, 0),
            (97, 3),
            (4, 0),
            (8, 0),
            (8, 5),
            (1, 0),
        ] {
            let wire = encode_offset(desired, ll, &mut enc_offsets);
            let resolved = resolve(wire, ll, &mut dec_offsets);
            assert_eq!(resolved, desired);
            assert_eq!(enc_offsets, dec_offsets);
        }
    }
}
