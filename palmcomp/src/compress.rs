use std::ops::Range;

use tracing::debug;

use crate::{CompressionLevel, PASS_COUNT};
use crate::error::Error;
use crate::instruction::{
    Instruction, MAX_FILL, MAX_FILL_FF, MAX_LITERAL, MAX_SKIP_ZEROS, Pattern,
};


/// Zero runs shorter than this are not worth a pass of their own.
const MIN_SPLIT_RUN: usize = 8;


/// Compresses `image` into three passes.
///
/// The result does not include the framing of the `data` resource; see
/// [`encode_data_resource`](crate::encode_data_resource) for that.
pub fn compress(image: &[u8], level: CompressionLevel) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    for range in pass_ranges(image, level) {
        let start = u32::try_from(range.start)
            .map_err(|_| Error::TooLarge { size: image.len() })?;
        debug!("pass over {:?} at level {}", range, level);

        out.extend_from_slice(&start.to_be_bytes());
        compress_pass(&image[range], level, &mut out);
    }
    Ok(out)
}

/// Splits the image around its two longest zero runs, which the zero-filled output already
/// contains.
fn pass_ranges(image: &[u8], level: CompressionLevel) -> [Range<usize>; PASS_COUNT] {
    let end = image.len();
    let whole = [0..end, end..end, end..end];
    if !level.splits_on_zeros() {
        return whole;
    }

    let mut runs = zero_runs(image);
    // longest first; earlier wins among equals
    runs.sort_by(|a, b| b.len().cmp(&a.len()).then(a.start.cmp(&b.start)));
    runs.truncate(2);
    runs.sort_by_key(|r| r.start);

    match runs.as_slice() {
        [first, second] => [0..first.start, first.end..second.start, second.end..end],
        [only] => [0..only.start, only.end..end, end..end],
        _ => whole,
    }
}

fn zero_runs(image: &[u8]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut position = 0;
    while position < image.len() {
        if image[position] != 0x00 {
            position += 1;
            continue;
        }
        let run_length = run_length(&image[position..]);
        if run_length >= MIN_SPLIT_RUN {
            runs.push(position..position + run_length);
        }
        position += run_length;
    }
    runs
}

fn run_length(data: &[u8]) -> usize {
    match data.first() {
        Some(&first) => data.iter().take_while(|&&b| b == first).count(),
        None => 0,
    }
}

fn compress_pass(data: &[u8], level: CompressionLevel, out: &mut Vec<u8>) {
    let mut literals = Vec::with_capacity(MAX_LITERAL);
    let mut position = 0;
    while position < data.len() {
        let rest = &data[position..];
        if let Some(instruction) = run_instruction(rest, level) {
            flush_literals(&mut literals, out);
            position += instruction.output_len();
            instruction.encode(out);
        } else {
            literals.push(rest[0]);
            position += 1;
            if literals.len() == MAX_LITERAL {
                flush_literals(&mut literals, out);
            }
        }
    }
    flush_literals(&mut literals, out);

    Instruction::End.encode(out);
    // the loader skips one byte after the terminator
    out.push(0x00);
}

/// Picks the non-literal instruction for the start of `rest`, preferring the most specific.
fn run_instruction(rest: &[u8], level: CompressionLevel) -> Option<Instruction> {
    if !level.uses_runs() {
        return None;
    }
    if level.uses_patterns() {
        if let Some(pattern) = Pattern::matching(rest) {
            return Some(Instruction::Pattern(pattern));
        }
    }

    let run = run_length(rest);
    match rest[0] {
        0x00 if run >= 2 => Some(Instruction::SkipZeros(run.min(MAX_SKIP_ZEROS))),
        0xFF if run >= 2 => Some(Instruction::FillFf(run.min(MAX_FILL_FF))),
        value if run >= 3 => Some(Instruction::Fill { value, count: run.min(MAX_FILL) }),
        _ => None,
    }
}

fn flush_literals(literals: &mut Vec<u8>, out: &mut Vec<u8>) {
    if literals.is_empty() {
        return;
    }
    Instruction::Literal(std::mem::take(literals)).encode(out);
}


#[cfg(test)]
mod tests {
    use super::{compress, pass_ranges};
    use crate::CompressionLevel;
    use crate::decompress::decompress;
    use tracing_test::traced_test;

    fn sample_image() -> Vec<u8> {
        let mut image = Vec::new();
        image.extend_from_slice(b"initialized globals");
        image.extend_from_slice(&[0x00; 40]);
        image.extend_from_slice(&[0xFF, 0xFF, 0x12, 0x34]);
        image.extend_from_slice(&[0xA9, 0xF0, 0x00, 0x00, 0x01, 0x02, 0x00, 0x03]);
        image.extend_from_slice(&[0x7E; 70]);
        image.extend_from_slice(&[0xFF; 20]);
        image.extend_from_slice(&[0x00; 100]);
        image.extend((1..=255u8).cycle().take(300));
        image.extend_from_slice(&[0x00; 12]);
        image
    }

    #[test]
    #[traced_test]
    fn test_every_level_restores_input() {
        let image = sample_image();
        for level in 0..=7 {
            let compressed = compress(&image, CompressionLevel::new(level)).unwrap();
            let restored = decompress(&compressed, image.len()).unwrap();
            assert_eq!(restored, image, "level {}", level);
        }
    }

    #[test]
    fn test_higher_levels_are_smaller() {
        let image = sample_image();
        let literal = compress(&image, CompressionLevel::LITERAL).unwrap().len();
        let runs = compress(&image, CompressionLevel::RUNS).unwrap().len();
        let patterns = compress(&image, CompressionLevel::PATTERNS).unwrap().len();
        assert!(runs < literal);
        assert!(patterns < runs);
    }

    #[test]
    fn test_literal_level_layout() {
        let compressed = compress(&[0x00, 0x00, 0x00], CompressionLevel::LITERAL).unwrap();
        assert_eq!(compressed, [
            0x00, 0x00, 0x00, 0x00, 0x82, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x03, 0x00, 0x00,
            0x00, 0x00, 0x00, 0x03, 0x00, 0x00,
        ]);
    }

    #[test]
    fn test_long_runs_are_chunked() {
        let image = [0x00; 130];
        let compressed = compress(&image, CompressionLevel::RUNS).unwrap();
        // 64 + 64 as skips, the final 2 as a shorter skip
        assert_eq!(&compressed[4..9], &[0x7F, 0x7F, 0x41, 0x00, 0x00]);
    }

    #[test]
    fn test_split_ranges() {
        let image = sample_image();
        let ranges = pass_ranges(&image, CompressionLevel::SPLIT);
        assert_eq!(ranges[0], 0..19);
        assert_eq!(ranges[1], 59..161);
        assert_eq!(ranges[2], 261..image.len());
        assert!(image[19..59].iter().all(|&b| b == 0));
        assert!(image[161..261].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_empty_image() {
        for level in [CompressionLevel::LITERAL, CompressionLevel::MAX] {
            let compressed = compress(&[], level).unwrap();
            assert_eq!(compressed.len(), 3 * 6);
            assert_eq!(decompress(&compressed, 0).unwrap(), Vec::<u8>::new());
        }
    }
}
