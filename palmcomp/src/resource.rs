//! The `data` resource: a pointer to the reserved trailer, the compressed passes, the trailer.


use tracing::debug;

use crate::CompressionLevel;
use crate::compress::compress;
use crate::decompress::decompress_passes;
use crate::error::Error;


/// Zero bytes at the end of every `data` resource, reserved for future loaders.
pub const RESERVED_TRAILER_SIZE: usize = 18;

const TRAILER_POINTER_SIZE: usize = 4;


pub fn encode_data_resource(image: &[u8], level: CompressionLevel) -> Result<Vec<u8>, Error> {
    let passes = compress(image, level)?;
    let trailer_offset = u32::try_from(TRAILER_POINTER_SIZE + passes.len())
        .map_err(|_| Error::TooLarge { size: image.len() })?;

    let mut resource = Vec::with_capacity(TRAILER_POINTER_SIZE + passes.len() + RESERVED_TRAILER_SIZE);
    resource.extend_from_slice(&trailer_offset.to_be_bytes());
    resource.extend_from_slice(&passes);
    resource.extend_from_slice(&[0u8; RESERVED_TRAILER_SIZE]);
    debug!(
        "{} bytes of data compressed at level {} into a {}-byte resource",
        image.len(), level, resource.len(),
    );
    Ok(resource)
}

/// Restores an `image_size`-byte data image from a `data` resource.
pub fn decode_data_resource(resource: &[u8], image_size: usize) -> Result<Vec<u8>, Error> {
    if resource.len() < TRAILER_POINTER_SIZE {
        return Err(Error::InvalidFraming { reason: "missing trailer pointer" });
    }
    let trailer_offset = u32::from_be_bytes(resource[0..TRAILER_POINTER_SIZE].try_into().unwrap());
    let trailer_offset = usize::try_from(trailer_offset).unwrap_or(usize::MAX);
    if trailer_offset < TRAILER_POINTER_SIZE || trailer_offset.saturating_add(RESERVED_TRAILER_SIZE) > resource.len() {
        return Err(Error::InvalidFraming { reason: "trailer pointer out of range" });
    }

    let (image, consumed) = decompress_passes(&resource[TRAILER_POINTER_SIZE..trailer_offset], image_size)?;
    if TRAILER_POINTER_SIZE + consumed != trailer_offset {
        return Err(Error::InvalidFraming { reason: "passes do not end at the trailer" });
    }
    Ok(image)
}
