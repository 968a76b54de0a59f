//! Expansion of compressed entries.
//!
//! The scheme is a byte-oriented LZ variant with one sentinel ("escape")
//! byte per entry. Any other byte is a literal. The escape byte is followed
//! by two operand bytes `lo` and `hi`:
//!
//! - `lo == 0 && hi == 0` emits the escape byte itself as a literal.
//! - otherwise the upper six bits of `hi` are a copy count and the low ten
//!   bits of `hi:lo` are a distance; `count` bytes are copied starting
//!   `distance + 1` bytes behind the current output position.
//!
//! Copies may overlap their own output, so they run one byte at a time.

use thiserror::Error;

/// Maximum back-reference distance representable in ten bits.
pub const MAX_DISTANCE: usize = 0x3FF;

/// Maximum copy count representable in six bits.
pub const MAX_COUNT: usize = 0x3F;

/// Reasons a compressed payload cannot be expanded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecompressError {
    /// Input ran out before the declared output size was reached.
    #[error("compressed input exhausted after {consumed} bytes with {produced} of {expected} bytes produced")]
    InputExhausted {
        consumed: usize,
        produced: usize,
        expected: usize,
    },

    /// A back-reference points before the start of the output.
    #[error("back-reference at input offset {input_offset} reaches {distance} bytes behind output position {position}")]
    InvalidBackReference {
        input_offset: usize,
        position: usize,
        distance: usize,
    },
}

/// Expand `input` into exactly `output_size` bytes.
///
/// Expansion stops as soon as `output_size` bytes exist, even in the middle
/// of a back-reference; any remaining input is ignored.
pub fn expand(input: &[u8], escape: u8, output_size: usize) -> Result<Vec<u8>, DecompressError> {
    // A three-byte token yields at most MAX_COUNT bytes.
    let max_output = input.len().saturating_mul(MAX_COUNT / 3);
    let mut output = Vec::with_capacity(output_size.min(max_output));
    let mut pos = 0;

    let exhausted = |consumed: usize, produced: usize| DecompressError::InputExhausted {
        consumed,
        produced,
        expected: output_size,
    };

    while output.len() < output_size {
        let byte = *input.get(pos).ok_or_else(|| exhausted(pos, output.len()))?;
        let token_offset = pos;
        pos += 1;

        if byte != escape {
            output.push(byte);
            continue;
        }

        let (lo, hi) = match input.get(pos..pos + 2) {
            Some(&[lo, hi]) => (lo, hi),
            _ => return Err(exhausted(input.len(), output.len())),
        };
        pos += 2;

        // Must be checked before the back-reference path: it would otherwise
        // decode as a zero-length copy.
        if lo == 0 && hi == 0 {
            output.push(escape);
            continue;
        }

        let count = usize::from(hi >> 2);
        let distance = ((usize::from(hi) << 8) | usize::from(lo)) & MAX_DISTANCE;

        let mut src = output
            .len()
            .checked_sub(distance + 1)
            .ok_or(DecompressError::InvalidBackReference {
                input_offset: token_offset,
                position: output.len(),
                distance,
            })?;

        for _ in 0..count {
            if output.len() == output_size {
                break;
            }
            let b = output[src];
            output.push(b);
            src += 1;
        }
    }

    Ok(output)
}
