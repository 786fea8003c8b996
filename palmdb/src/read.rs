//! Parsing complete in-memory database images.


use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::datablock::Datablock;
use crate::database::{Database, RecordDatabase, ResourceDatabase};
use crate::directory::{directory_size, DirectoryKind, ENTRY_COUNT_SIZE};
use crate::error::FormatError;
use crate::header::{HEADER_SIZE, Header};


impl<D: DirectoryKind> Database<D> {
    /// Parses a database image.
    ///
    /// Directory entries must be stored with ascending offsets; the data of each entry extends
    /// up to the offset of the entry following it in the directory (or to the end of the image
    /// for the last one). The blocks preceding the first entry are apportioned to SortInfo,
    /// AppInfo and the gap, in that order from the back.
    pub fn parse(image: &Datablock) -> Result<Self, FormatError> {
        let bytes = image.contents();
        let raw_header = Header::read(bytes)?;

        if raw_header.next_directory != 0 {
            return Err(FormatError::UnsupportedMultiDirectory { next_directory: raw_header.next_directory });
        }
        if raw_header.header.is_resource() != D::IS_RESOURCE {
            return Err(FormatError::WrongDatabaseKind { expected_resource: D::IS_RESOURCE });
        }

        let count_end = HEADER_SIZE + ENTRY_COUNT_SIZE;
        if bytes.len() < count_end {
            return Err(FormatError::Truncated { needed: count_end, available: bytes.len() });
        }
        let entry_count: usize = u16::from_be_bytes(bytes[HEADER_SIZE..count_end].try_into().unwrap()).into();

        let directory_end = HEADER_SIZE + directory_size::<D>(entry_count);
        if bytes.len() < directory_end {
            return Err(FormatError::Truncated { needed: directory_end, available: bytes.len() });
        }
        debug!("{} directory entries; directory ends at {}", entry_count, directory_end);

        let raw_entries: Vec<_> = bytes[count_end..directory_end]
            .chunks_exact(D::ENTRY_SIZE)
            .map(D::decode_entry)
            .collect();

        // an entry only knows where it starts; it ends where its successor starts
        let mut upper_bound = bytes.len();
        let mut blocks = Vec::with_capacity(entry_count);
        for raw_entry in raw_entries.into_iter().rev() {
            let offset = usize::try_from(raw_entry.offset).unwrap_or(usize::MAX);
            if offset < directory_end || offset > upper_bound {
                return Err(FormatError::Corrupt {
                    offset: raw_entry.offset.into(),
                    lower_bound: directory_end,
                    upper_bound,
                });
            }
            let data = image.slice(offset, upper_bound - offset);
            blocks.push((raw_entry.key, D::make_value(raw_entry.meta, data)));
            upper_bound = offset;
        }

        let mut entries = BTreeMap::new();
        for (key, value) in blocks.into_iter().rev() {
            let key_string = key.to_string();
            if entries.insert(key, value).is_some() {
                return Err(FormatError::DuplicateKey { key: key_string });
            }
        }

        // split what precedes the first entry
        let mut prefix_end = upper_bound;
        let sort_info = take_side_block(image, "SortInfo", raw_header.sort_info_offset, directory_end, &mut prefix_end);
        let app_info = take_side_block(image, "AppInfo", raw_header.app_info_offset, directory_end, &mut prefix_end);
        let gap = image.slice(directory_end, prefix_end - directory_end);

        Ok(Self {
            header: raw_header.header,
            app_info,
            sort_info,
            gap,
            entries,
        })
    }

    pub fn parse_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        Self::parse(&Datablock::from(bytes))
    }
}

fn take_side_block(
    image: &Datablock,
    block_name: &str,
    offset: u32,
    directory_end: usize,
    prefix_end: &mut usize,
) -> Option<Datablock> {
    if offset == 0 {
        return None;
    }
    let start = usize::try_from(offset).unwrap_or(usize::MAX);
    if start < directory_end || start > *prefix_end {
        warn!(
            "{} offset {} outside {}..={}; ignoring it",
            block_name, offset, directory_end, *prefix_end,
        );
        return None;
    }
    let block = image.slice(start, *prefix_end - start);
    *prefix_end = start;
    Some(block)
}


/// A database of either kind, as determined by the header's resource attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AnyDatabase {
    Resource(ResourceDatabase),
    Record(RecordDatabase),
}
impl AnyDatabase {
    pub fn parse(image: &Datablock) -> Result<Self, FormatError> {
        let raw_header = Header::read(image.contents())?;
        if raw_header.header.is_resource() {
            Ok(Self::Resource(ResourceDatabase::parse(image)?))
        } else {
            Ok(Self::Record(RecordDatabase::parse(image)?))
        }
    }

    pub fn header(&self) -> &Header {
        match self {
            Self::Resource(db) => &db.header,
            Self::Record(db) => &db.header,
        }
    }
}


#[cfg(test)]
mod tests {
    use super::AnyDatabase;
    use crate::datablock::Datablock;
    use crate::database::{RecordDatabase, ResourceDatabase};
    use crate::directory::ResourceKey;
    use crate::error::FormatError;
    use crate::header::{DatabaseAttributes, HEADER_SIZE, Header};
    use crate::tag::{DatabaseName, Tag};
    use tracing_test::traced_test;

    /// Builds a resource database image with the given directory offsets and total length.
    fn image_with_offsets(offsets: &[u32], total_length: usize) -> Vec<u8> {
        let mut header = Header::new(DatabaseName::from("Broken"), Tag::new(*b"appl"), Tag::new(*b"TTst"));
        header.attributes = DatabaseAttributes::RESOURCE;
        let mut image = header.to_bytes(0, 0).to_vec();
        image.extend_from_slice(&u16::try_from(offsets.len()).unwrap().to_be_bytes());
        for (i, offset) in offsets.iter().enumerate() {
            image.extend_from_slice(b"tSTR");
            image.extend_from_slice(&u16::try_from(i).unwrap().to_be_bytes());
            image.extend_from_slice(&offset.to_be_bytes());
        }
        image.resize(total_length, 0xEE);
        image
    }

    #[test]
    fn test_entries_split_at_offsets() {
        // directory ends at 76 + 2 + 3 * 10 = 108
        let image = image_with_offsets(&[108, 112, 118], 128);
        let db = ResourceDatabase::parse_bytes(&image).unwrap();
        let sizes: Vec<usize> = db.iter().map(|(_, v)| v.len()).collect();
        assert_eq!(sizes, [4, 6, 10]);
        assert_eq!(db.gap.len(), 0);
        assert_eq!(db.app_info, None);
    }

    #[test]
    fn test_gap_is_preserved() {
        let directory_end = HEADER_SIZE + 2 + 2 * 10;
        let first = u32::try_from(directory_end + 6).unwrap();
        let image = image_with_offsets(&[first, first + 4], directory_end + 12);
        let db = ResourceDatabase::parse_bytes(&image).unwrap();
        assert_eq!(db.gap.len(), 6);
        assert_eq!(db.len(), 2);
    }

    #[test]
    fn test_decreasing_offsets_are_corrupt() {
        let directory_end = HEADER_SIZE + 2 + 2 * 10;
        let first = u32::try_from(directory_end + 8).unwrap();
        let image = image_with_offsets(&[first, first - 4], directory_end + 16);
        match ResourceDatabase::parse_bytes(&image) {
            Err(FormatError::Corrupt { .. }) => {},
            other => panic!("expected corrupt-directory error, got {:?}", other),
        }
    }

    #[test]
    fn test_offset_past_end_is_corrupt() {
        let directory_end = HEADER_SIZE + 2 + 10;
        let image = image_with_offsets(&[500], directory_end + 4);
        assert!(matches!(ResourceDatabase::parse_bytes(&image), Err(FormatError::Corrupt { .. })));
    }

    #[test]
    fn test_offset_inside_directory_is_corrupt() {
        let image = image_with_offsets(&[u32::try_from(HEADER_SIZE).unwrap()], 200);
        assert!(matches!(ResourceDatabase::parse_bytes(&image), Err(FormatError::Corrupt { .. })));
    }

    #[test]
    fn test_next_directory_rejected() {
        let directory_end = HEADER_SIZE + 2;
        let mut image = image_with_offsets(&[], directory_end);
        image[0x48..0x4C].copy_from_slice(&0x0000_0100u32.to_be_bytes());
        match ResourceDatabase::parse_bytes(&image) {
            Err(FormatError::UnsupportedMultiDirectory { next_directory: 0x100 }) => {},
            other => panic!("expected multi-directory rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_kind_mismatch() {
        let image = image_with_offsets(&[], HEADER_SIZE + 2);
        assert!(matches!(
            RecordDatabase::parse_bytes(&image),
            Err(FormatError::WrongDatabaseKind { expected_resource: false }),
        ));
        assert!(matches!(
            AnyDatabase::parse(&Datablock::from(image)),
            Ok(AnyDatabase::Resource(_)),
        ));
    }

    #[test]
    fn test_truncated_directory() {
        let mut image = image_with_offsets(&[200, 210], 220);
        image.truncate(HEADER_SIZE + 2 + 5);
        assert!(matches!(ResourceDatabase::parse_bytes(&image), Err(FormatError::Truncated { .. })));
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let directory_end = HEADER_SIZE + 2 + 2 * 10;
        let first = u32::try_from(directory_end).unwrap();
        let mut image = image_with_offsets(&[first, first + 2], directory_end + 4);
        // make the second entry's id equal to the first one's
        let second_id = HEADER_SIZE + 2 + 10 + 4;
        image[second_id..second_id + 2].copy_from_slice(&[0, 0]);
        assert!(matches!(ResourceDatabase::parse_bytes(&image), Err(FormatError::DuplicateKey { .. })));
    }

    #[test]
    #[traced_test]
    fn test_side_blocks() {
        let directory_end = HEADER_SIZE + 2 + 10;
        let app_info = directory_end + 2;
        let sort_info = app_info + 8;
        let data = sort_info + 4;

        let mut image = image_with_offsets(&[u32::try_from(data).unwrap()], data + 3);
        image[0x34..0x38].copy_from_slice(&u32::try_from(app_info).unwrap().to_be_bytes());
        image[0x38..0x3C].copy_from_slice(&u32::try_from(sort_info).unwrap().to_be_bytes());

        let db = ResourceDatabase::parse_bytes(&image).unwrap();
        assert_eq!(db.gap.len(), 2);
        assert_eq!(db.app_info.as_ref().map(|b| b.len()), Some(8));
        assert_eq!(db.sort_info.as_ref().map(|b| b.len()), Some(4));
        assert_eq!(db.get(&ResourceKey::new(Tag::new(*b"tSTR"), 0)).map(|b| b.len()), Some(3));
    }

    #[test]
    #[traced_test]
    fn test_out_of_range_side_block_ignored() {
        let directory_end = HEADER_SIZE + 2 + 10;
        let data = directory_end + 4;
        let mut image = image_with_offsets(&[u32::try_from(data).unwrap()], data + 3);
        // points into the data rather than before it
        image[0x34..0x38].copy_from_slice(&u32::try_from(data + 1).unwrap().to_be_bytes());

        let db = ResourceDatabase::parse_bytes(&image).unwrap();
        assert_eq!(db.app_info, None);
        assert_eq!(db.gap.len(), 4);
        assert!(logs_contain("AppInfo offset"));
    }
}
