//! The fixed-layout header at the start of every PRC and PDB file.
//!
//! All multi-byte fields are big-endian.


use bitflags::bitflags;

use crate::error::FormatError;
use crate::tag::{DatabaseName, NAME_SIZE, Tag};
use crate::time::PalmTime;


/// Size of the header up to (not including) the directory's entry count.
pub const HEADER_SIZE: usize = 76;


bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct DatabaseAttributes : u16 {
        const RESOURCE = 0x0001;
        const READ_ONLY = 0x0002;
        const APP_INFO_DIRTY = 0x0004;
        const BACKUP = 0x0008;
        const OK_TO_INSTALL_NEWER = 0x0010;
        const RESET_AFTER_INSTALL = 0x0020;
        const COPY_PREVENTION = 0x0040;
        const STREAM = 0x0080;
        const HIDDEN = 0x0100;
        const LAUNCHABLE_DATA = 0x0200;
        const RECYCLABLE = 0x0400;
        const BUNDLE = 0x0800;
        const OPEN = 0x8000;
    }
}
impl DatabaseAttributes {
    /// Looks up an attribute by the name used on command lines and in project files.
    ///
    /// The resource bit is not nameable; it always follows the kind of database being written.
    pub fn from_setting_name(name: &str) -> Option<Self> {
        let normalized = name.to_ascii_lowercase().replace('_', "-");
        let flag = match normalized.as_str() {
            "readonly"|"read-only" => Self::READ_ONLY,
            "appinfo-dirty" => Self::APP_INFO_DIRTY,
            "backup" => Self::BACKUP,
            "ok-to-install-newer" => Self::OK_TO_INSTALL_NEWER,
            "reset-after-install" => Self::RESET_AFTER_INSTALL,
            "copy-prevention" => Self::COPY_PREVENTION,
            "stream" => Self::STREAM,
            "hidden" => Self::HIDDEN,
            "launchable-data" => Self::LAUNCHABLE_DATA,
            "recyclable" => Self::RECYCLABLE,
            "bundle" => Self::BUNDLE,
            _ => return None,
        };
        Some(flag)
    }
}


#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Header {
    pub name: DatabaseName, // [u8; 32], NUL-padded
    pub attributes: DatabaseAttributes, // u16
    pub version: u16,
    pub created: PalmTime, // u32
    pub modified: PalmTime, // u32
    pub backed_up: PalmTime, // u32
    pub modification_number: u32,
    // app_info_offset: u32,
    // sort_info_offset: u32,
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: Tag,
    pub creator: Tag,
    pub unique_id_seed: u32,
    // next_directory: u32, always 0
}
impl Header {
    /// A header for a freshly created database, stamped with the current time.
    pub fn new(name: DatabaseName, kind: Tag, creator: Tag) -> Self {
        let now = PalmTime::now();
        Self {
            name,
            attributes: DatabaseAttributes::empty(),
            version: 1,
            created: now,
            modified: now,
            backed_up: PalmTime::NEVER,
            modification_number: 0,
            kind,
            creator,
            unique_id_seed: 0,
        }
    }

    pub fn is_resource(&self) -> bool {
        self.attributes.contains(DatabaseAttributes::RESOURCE)
    }

    /// Decodes the header fields. Cross-field consistency is left to the database reader.
    pub fn read(bytes: &[u8]) -> Result<RawHeader, FormatError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FormatError::Truncated { needed: HEADER_SIZE, available: bytes.len() });
        }

        let name = DatabaseName::from_bytes(&bytes[0..NAME_SIZE]);
        let attributes = DatabaseAttributes::from_bits_retain(u16::from_be_bytes(bytes[0x20..0x22].try_into().unwrap()));
        let version = u16::from_be_bytes(bytes[0x22..0x24].try_into().unwrap());
        let created = PalmTime::from_raw(u32::from_be_bytes(bytes[0x24..0x28].try_into().unwrap()));
        let modified = PalmTime::from_raw(u32::from_be_bytes(bytes[0x28..0x2C].try_into().unwrap()));
        let backed_up = PalmTime::from_raw(u32::from_be_bytes(bytes[0x2C..0x30].try_into().unwrap()));
        let modification_number = u32::from_be_bytes(bytes[0x30..0x34].try_into().unwrap());
        let app_info_offset = u32::from_be_bytes(bytes[0x34..0x38].try_into().unwrap());
        let sort_info_offset = u32::from_be_bytes(bytes[0x38..0x3C].try_into().unwrap());
        let kind = Tag::new(bytes[0x3C..0x40].try_into().unwrap());
        let creator = Tag::new(bytes[0x40..0x44].try_into().unwrap());
        let unique_id_seed = u32::from_be_bytes(bytes[0x44..0x48].try_into().unwrap());
        let next_directory = u32::from_be_bytes(bytes[0x48..0x4C].try_into().unwrap());

        Ok(RawHeader {
            header: Self {
                name,
                attributes,
                version,
                created,
                modified,
                backed_up,
                modification_number,
                kind,
                creator,
                unique_id_seed,
            },
            app_info_offset,
            sort_info_offset,
            next_directory,
        })
    }

    /// Encodes the header with the given block offsets (0 for an absent block).
    pub fn to_bytes(&self, app_info_offset: u32, sort_info_offset: u32) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..NAME_SIZE].copy_from_slice(&self.name.to_padded());
        buf[0x20..0x22].copy_from_slice(&self.attributes.bits().to_be_bytes());
        buf[0x22..0x24].copy_from_slice(&self.version.to_be_bytes());
        buf[0x24..0x28].copy_from_slice(&self.created.as_raw().to_be_bytes());
        buf[0x28..0x2C].copy_from_slice(&self.modified.as_raw().to_be_bytes());
        buf[0x2C..0x30].copy_from_slice(&self.backed_up.as_raw().to_be_bytes());
        buf[0x30..0x34].copy_from_slice(&self.modification_number.to_be_bytes());
        buf[0x34..0x38].copy_from_slice(&app_info_offset.to_be_bytes());
        buf[0x38..0x3C].copy_from_slice(&sort_info_offset.to_be_bytes());
        buf[0x3C..0x40].copy_from_slice(self.kind.as_bytes());
        buf[0x40..0x44].copy_from_slice(self.creator.as_bytes());
        buf[0x44..0x48].copy_from_slice(&self.unique_id_seed.to_be_bytes());
        // next_directory stays 0
        buf
    }
}

/// A header as found on disk, including the offsets the reader needs to locate blocks.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct RawHeader {
    pub header: Header,
    pub app_info_offset: u32,
    pub sort_info_offset: u32,
    pub next_directory: u32,
}
