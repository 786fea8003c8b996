use tracing::debug;

use crate::PASS_COUNT;
use crate::error::Error;
use crate::instruction::Instruction;


/// Decompresses three passes into a zero-filled buffer of `output_size` bytes.
pub fn decompress(compressed: &[u8], output_size: usize) -> Result<Vec<u8>, Error> {
    let (output, _consumed) = decompress_passes(compressed, output_size)?;
    Ok(output)
}

/// Like [`decompress`], but also returns how many bytes of `compressed` were consumed.
pub(crate) fn decompress_passes(compressed: &[u8], output_size: usize) -> Result<(Vec<u8>, usize), Error> {
    let mut output = vec![0u8; output_size];
    let mut position = 0;

    for pass in 0..PASS_COUNT {
        if compressed.len() < position + 4 {
            return Err(Error::Truncated { position: compressed.len() });
        }
        let start = u32::from_be_bytes(compressed[position..position + 4].try_into().unwrap());
        position += 4;

        let mut cursor = usize::try_from(start)
            .map_err(|_| Error::OutputOverrun { position: usize::MAX, length: 0, output_size })?;
        if cursor > output_size {
            return Err(Error::OutputOverrun { position: cursor, length: 0, output_size });
        }
        debug!("pass {} starts writing at {}", pass, cursor);

        loop {
            let instruction = Instruction::decode(compressed, &mut position)?;
            if instruction == Instruction::End {
                break;
            }
            instruction.execute(&mut output, &mut cursor)?;
        }

        // padding byte after the terminator
        if position >= compressed.len() {
            return Err(Error::Truncated { position: compressed.len() });
        }
        position += 1;
    }

    Ok((output, position))
}


#[cfg(test)]
mod tests {
    use super::{decompress, decompress_passes};
    use crate::error::Error;

    #[test]
    fn test_passes_write_at_their_offsets() {
        let compressed = [
            0x00, 0x00, 0x00, 0x00, 0x81, 0x11, 0x22, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x06, 0x21, 0x33, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x0A, 0x00, 0x00,
        ];
        let (output, consumed) = decompress_passes(&compressed, 10).unwrap();
        assert_eq!(output, [0x11, 0x22, 0x00, 0x00, 0x00, 0x00, 0x33, 0x33, 0x33, 0x00]);
        assert_eq!(consumed, compressed.len());
    }

    #[test]
    fn test_overrun_is_reported() {
        let compressed = [
            0x00, 0x00, 0x00, 0x02, 0x1F, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];
        assert_eq!(
            decompress(&compressed, 8),
            Err(Error::OutputOverrun { position: 2, length: 16, output_size: 8 }),
        );
    }

    #[test]
    fn test_start_past_end() {
        let compressed = [0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        assert!(matches!(decompress(&compressed, 16), Err(Error::OutputOverrun { .. })));
    }

    #[test]
    fn test_missing_passes() {
        let compressed = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        assert!(matches!(decompress(&compressed, 4), Err(Error::Truncated { .. })));
    }
}
