//! The instruction set of the data-segment codec.
//!
//! Every instruction starts with a tag byte:
//!
//! | tag         | meaning                                                    |
//! |-------------|------------------------------------------------------------|
//! | `1nnn nnnn` | `n+1` literal bytes follow                                 |
//! | `01nn nnnn` | skip `n+1` bytes of output (already zero)                  |
//! | `001n nnnn` | next byte is repeated `n+2` times                          |
//! | `0001 nnnn` | `n+1` bytes of `0xFF`                                      |
//! | `0000 0001` | `FF FF a b`, with `a b` following                          |
//! | `0000 0010` | `00 00 FF FF a b`, with `a b` following                    |
//! | `0000 0011` | `A9 F0 00 00 a b 00 c`, with `a b c` following             |
//! | `0000 0100` | `A9 F0 00 a b c 00 d`, with `a b c d` following            |
//! | `0000 0000` | end of pass                                                |


use from_to_repr::from_to_other;

use crate::error::Error;


pub const MAX_LITERAL: usize = 128;
pub const MAX_SKIP_ZEROS: usize = 64;
pub const MIN_FILL: usize = 2;
pub const MAX_FILL: usize = 33;
pub const MAX_FILL_FF: usize = 16;

const TRAP_PREFIX: [u8; 2] = [0xA9, 0xF0];


#[derive(Clone, Copy, Debug)]
#[from_to_other(base_type = u8, derive_compare = "as_int")]
pub enum PatternKind {
    FfWord = 1,
    ZeroFfWord = 2,
    TrapShort = 3,
    TrapLong = 4,
    Other(u8),
}
impl PatternKind {
    pub fn payload_len(&self) -> Option<usize> {
        match self {
            Self::FfWord => Some(2),
            Self::ZeroFfWord => Some(2),
            Self::TrapShort => Some(3),
            Self::TrapLong => Some(4),
            Self::Other(_) => None,
        }
    }
}


/// A fixed byte sequence with a few variable bytes, common in 68k data segments.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Pattern {
    FfWord([u8; 2]),
    ZeroFfWord([u8; 2]),
    TrapShort([u8; 3]),
    TrapLong([u8; 4]),
}
impl Pattern {
    pub fn kind(&self) -> PatternKind {
        match self {
            Self::FfWord(_) => PatternKind::FfWord,
            Self::ZeroFfWord(_) => PatternKind::ZeroFfWord,
            Self::TrapShort(_) => PatternKind::TrapShort,
            Self::TrapLong(_) => PatternKind::TrapLong,
        }
    }

    pub fn payload(&self) -> &[u8] {
        match self {
            Self::FfWord(p) => p,
            Self::ZeroFfWord(p) => p,
            Self::TrapShort(p) => p,
            Self::TrapLong(p) => p,
        }
    }

    fn from_payload(kind: PatternKind, payload: &[u8]) -> Option<Self> {
        match kind {
            PatternKind::FfWord => Some(Self::FfWord(payload.try_into().ok()?)),
            PatternKind::ZeroFfWord => Some(Self::ZeroFfWord(payload.try_into().ok()?)),
            PatternKind::TrapShort => Some(Self::TrapShort(payload.try_into().ok()?)),
            PatternKind::TrapLong => Some(Self::TrapLong(payload.try_into().ok()?)),
            PatternKind::Other(_) => None,
        }
    }

    pub fn expand(&self) -> Vec<u8> {
        match *self {
            Self::FfWord([a, b]) => vec![0xFF, 0xFF, a, b],
            Self::ZeroFfWord([a, b]) => vec![0x00, 0x00, 0xFF, 0xFF, a, b],
            Self::TrapShort([a, b, c]) => vec![TRAP_PREFIX[0], TRAP_PREFIX[1], 0x00, 0x00, a, b, 0x00, c],
            Self::TrapLong([a, b, c, d]) => vec![TRAP_PREFIX[0], TRAP_PREFIX[1], 0x00, a, b, c, 0x00, d],
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            Self::FfWord(_) => 4,
            Self::ZeroFfWord(_) => 6,
            Self::TrapShort(_) | Self::TrapLong(_) => 8,
        }
    }

    /// Finds the pattern that encodes the start of `input` most tightly, if any.
    pub fn matching(input: &[u8]) -> Option<Self> {
        if input.len() >= 8 && input[0..2] == TRAP_PREFIX && input[2] == 0x00 && input[6] == 0x00 {
            if input[3] == 0x00 {
                return Some(Self::TrapShort([input[4], input[5], input[7]]));
            }
            return Some(Self::TrapLong([input[3], input[4], input[5], input[7]]));
        }
        if input.len() >= 6 && input[0..4] == [0x00, 0x00, 0xFF, 0xFF] {
            return Some(Self::ZeroFfWord([input[4], input[5]]));
        }
        // a third 0xFF is better served by an 0xFF run
        if input.len() >= 4 && input[0..2] == [0xFF, 0xFF] && input[2] != 0xFF {
            return Some(Self::FfWord([input[2], input[3]]));
        }
        None
    }
}


#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Instruction {
    End,
    Literal(Vec<u8>),
    SkipZeros(usize),
    Fill { value: u8, count: usize },
    FillFf(usize),
    Pattern(Pattern),
}
impl Instruction {
    /// Decodes the instruction at `*position`, advancing `*position` past it.
    pub fn decode(input: &[u8], position: &mut usize) -> Result<Self, Error> {
        let tag_position = *position;
        let tag = *input.get(tag_position)
            .ok_or(Error::Truncated { position: tag_position })?;
        *position += 1;

        if tag & 0x80 != 0 {
            let count = usize::from(tag & 0x7F) + 1;
            let bytes = take(input, position, count)?;
            Ok(Self::Literal(bytes.to_vec()))
        } else if tag & 0x40 != 0 {
            Ok(Self::SkipZeros(usize::from(tag & 0x3F) + 1))
        } else if tag & 0x20 != 0 {
            let value = take(input, position, 1)?[0];
            Ok(Self::Fill { value, count: usize::from(tag & 0x1F) + MIN_FILL })
        } else if tag & 0x10 != 0 {
            Ok(Self::FillFf(usize::from(tag & 0x0F) + 1))
        } else if tag == 0x00 {
            Ok(Self::End)
        } else {
            let kind = PatternKind::from_base_type(tag);
            let payload_len = kind.payload_len()
                .ok_or(Error::InvalidTag { tag, position: tag_position })?;
            let payload = take(input, position, payload_len)?;
            Pattern::from_payload(kind, payload)
                .map(Self::Pattern)
                .ok_or(Error::InvalidTag { tag, position: tag_position })
        }
    }

    /// Appends the encoded instruction. Counts must be within the limits of their opcode.
    pub fn encode(&self, out: &mut Vec<u8>) {
        match self {
            Self::End => out.push(0x00),
            Self::Literal(bytes) => {
                debug_assert!((1..=MAX_LITERAL).contains(&bytes.len()));
                out.push(0x80 | ((bytes.len() - 1) as u8 & 0x7F));
                out.extend_from_slice(bytes);
            },
            Self::SkipZeros(count) => {
                debug_assert!((1..=MAX_SKIP_ZEROS).contains(count));
                out.push(0x40 | ((count - 1) as u8 & 0x3F));
            },
            Self::Fill { value, count } => {
                debug_assert!((MIN_FILL..=MAX_FILL).contains(count));
                out.push(0x20 | ((count - MIN_FILL) as u8 & 0x1F));
                out.push(*value);
            },
            Self::FillFf(count) => {
                debug_assert!((1..=MAX_FILL_FF).contains(count));
                out.push(0x10 | ((count - 1) as u8 & 0x0F));
            },
            Self::Pattern(pattern) => {
                out.push(pattern.kind().to_base_type());
                out.extend_from_slice(pattern.payload());
            },
        }
    }

    /// The number of output bytes the instruction accounts for.
    pub fn output_len(&self) -> usize {
        match self {
            Self::End => 0,
            Self::Literal(bytes) => bytes.len(),
            Self::SkipZeros(count) => *count,
            Self::Fill { count, .. } => *count,
            Self::FillFf(count) => *count,
            Self::Pattern(pattern) => pattern.output_len(),
        }
    }

    /// Applies the instruction to `output` at `*cursor`, advancing `*cursor`.
    pub fn execute(&self, output: &mut [u8], cursor: &mut usize) -> Result<(), Error> {
        let length = self.output_len();
        let end = cursor.checked_add(length)
            .filter(|&end| end <= output.len())
            .ok_or(Error::OutputOverrun { position: *cursor, length, output_size: output.len() })?;
        let target = &mut output[*cursor..end];

        match self {
            Self::End => {},
            Self::Literal(bytes) => target.copy_from_slice(bytes),
            Self::SkipZeros(_) => {},
            Self::Fill { value, .. } => target.fill(*value),
            Self::FillFf(_) => target.fill(0xFF),
            Self::Pattern(pattern) => target.copy_from_slice(&pattern.expand()),
        }
        *cursor = end;
        Ok(())
    }
}

fn take<'a>(input: &'a [u8], position: &mut usize, count: usize) -> Result<&'a [u8], Error> {
    let end = *position + count;
    if end > input.len() {
        return Err(Error::Truncated { position: input.len() });
    }
    let slice = &input[*position..end];
    *position = end;
    Ok(slice)
}
