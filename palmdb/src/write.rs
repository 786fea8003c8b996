//! Serializing databases.


use std::io::Write;

use tracing::debug;

use crate::database::Database;
use crate::directory::{directory_size, DirectoryKind};
use crate::error::FormatError;
use crate::header::{DatabaseAttributes, HEADER_SIZE};


fn to_offset(position: usize) -> Result<u32, FormatError> {
    u32::try_from(position)
        .map_err(|_| FormatError::TooLarge)
}


impl<D: DirectoryKind> Database<D> {
    /// Lays out the database and encodes it.
    ///
    /// The layout is: header, directory, gap, AppInfo, SortInfo, then the entries in key order.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let entry_count = u16::try_from(self.entries.len())
            .map_err(|_| FormatError::TooLarge)?;
        let directory_end = HEADER_SIZE + directory_size::<D>(self.entries.len());

        let mut position = directory_end + self.gap.len();
        let app_info_offset = match &self.app_info {
            Some(block) => {
                let offset = to_offset(position)?;
                position += block.len();
                offset
            },
            None => 0,
        };
        let sort_info_offset = match &self.sort_info {
            Some(block) => {
                let offset = to_offset(position)?;
                position += block.len();
                offset
            },
            None => 0,
        };

        let mut directory = Vec::with_capacity(directory_size::<D>(self.entries.len()));
        directory.extend_from_slice(&entry_count.to_be_bytes());
        for (key, value) in &self.entries {
            D::encode_entry(key, value, to_offset(position)?, &mut directory);
            position += D::data(value).len();
        }
        // the end of the last entry must be expressible too
        to_offset(position)?;

        let mut header = self.header.clone();
        header.attributes.set(DatabaseAttributes::RESOURCE, D::IS_RESOURCE);

        let mut image = Vec::with_capacity(position);
        image.extend_from_slice(&header.to_bytes(app_info_offset, sort_info_offset));
        image.extend_from_slice(&directory);
        image.extend_from_slice(self.gap.contents());
        if let Some(block) = &self.app_info {
            image.extend_from_slice(block.contents());
        }
        if let Some(block) = &self.sort_info {
            image.extend_from_slice(block.contents());
        }
        for value in self.entries.values() {
            image.extend_from_slice(D::data(value).contents());
        }
        debug!("serialized {} entries into {} bytes", entry_count, image.len());
        Ok(image)
    }

    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), FormatError> {
        let image = self.serialize()?;
        writer.write_all(&image)?;
        Ok(())
    }
}
