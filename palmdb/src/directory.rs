//! The directory following the header.
//!
//! A directory is a 16-bit entry count followed by fixed-size entries. Resource databases use
//! 10-byte entries (type, id, offset); record databases use 8-byte entries (offset, attributes,
//! 24-bit unique id). Each entry's offset is an absolute file offset; the entry's length is only
//! known from the offset of the following entry.


use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

use crate::datablock::Datablock;
use crate::part_int::{U24, U4};
use crate::tag::{Tag, TagError};


pub const ENTRY_COUNT_SIZE: usize = 2;


/// One of the two directory layouts.
pub trait DirectoryKind {
    type Key: Clone + fmt::Debug + fmt::Display + Ord;
    type Value: Clone + fmt::Debug + PartialEq;
    type Meta;

    const ENTRY_SIZE: usize;
    const IS_RESOURCE: bool;

    /// Decodes one entry; `raw` is exactly `ENTRY_SIZE` bytes long.
    fn decode_entry(raw: &[u8]) -> RawEntry<Self::Key, Self::Meta>;
    fn encode_entry(key: &Self::Key, value: &Self::Value, offset: u32, out: &mut Vec<u8>);
    fn make_value(meta: Self::Meta, data: Datablock) -> Self::Value;
    fn data(value: &Self::Value) -> &Datablock;
}

/// Size of a directory with `entry_count` entries, including the count itself.
pub fn directory_size<D: DirectoryKind>(entry_count: usize) -> usize {
    ENTRY_COUNT_SIZE + entry_count * D::ENTRY_SIZE
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RawEntry<K, M> {
    pub key: K,
    pub meta: M,
    pub offset: u32,
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct ResourceKey {
    #[cfg_attr(feature = "serde", serde(rename = "type"))]
    pub kind: Tag,
    pub id: u16,
}
impl ResourceKey {
    pub const fn new(kind: Tag, id: u16) -> Self {
        Self { kind, id }
    }
}
impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} #{}", self.kind, self.id)
    }
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceKeyError {
    MissingSeparator,
    Tag(TagError),
    Id(String),
}
impl fmt::Display for ResourceKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingSeparator
                => write!(f, "expected TYPE:ID"),
            Self::Tag(e)
                => write!(f, "invalid resource type: {}", e),
            Self::Id(id)
                => write!(f, "invalid resource id {:?}", id),
        }
    }
}
impl std::error::Error for ResourceKeyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::MissingSeparator => None,
            Self::Tag(e) => Some(e),
            Self::Id(_) => None,
        }
    }
}
impl FromStr for ResourceKey {
    type Err = ResourceKeyError;

    /// Parses `code:1`; the id may also be given in hexadecimal as `code:0x3e8`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind_str, id_str) = s.rsplit_once(':')
            .ok_or(ResourceKeyError::MissingSeparator)?;
        let kind: Tag = kind_str.parse()
            .map_err(ResourceKeyError::Tag)?;
        let id = if let Some(hex) = id_str.strip_prefix("0x").or_else(|| id_str.strip_prefix("0X")) {
            u16::from_str_radix(hex, 16)
        } else {
            id_str.parse()
        };
        let id = id.map_err(|_| ResourceKeyError::Id(id_str.to_owned()))?;
        Ok(Self { kind, id })
    }
}


/// Resource databases (PRC).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Resources;
impl DirectoryKind for Resources {
    type Key = ResourceKey;
    type Value = Datablock;
    type Meta = ();

    const ENTRY_SIZE: usize = 10;
    const IS_RESOURCE: bool = true;

    fn decode_entry(raw: &[u8]) -> RawEntry<Self::Key, Self::Meta> {
        let kind = Tag::new(raw[0..4].try_into().unwrap());
        let id = u16::from_be_bytes(raw[4..6].try_into().unwrap());
        let offset = u32::from_be_bytes(raw[6..10].try_into().unwrap());
        RawEntry {
            key: ResourceKey { kind, id },
            meta: (),
            offset,
        }
    }

    fn encode_entry(key: &Self::Key, _value: &Self::Value, offset: u32, out: &mut Vec<u8>) {
        out.extend_from_slice(key.kind.as_bytes());
        out.extend_from_slice(&key.id.to_be_bytes());
        out.extend_from_slice(&offset.to_be_bytes());
    }

    fn make_value(_meta: Self::Meta, data: Datablock) -> Self::Value {
        data
    }

    fn data(value: &Self::Value) -> &Datablock {
        value
    }
}


/// The 24-bit unique id of a record.
pub type RecordId = U24;

bitflags! {
    #[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
    #[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
    pub struct RecordAttributes : u8 {
        const DELETE = 0x80;
        const DIRTY = 0x40;
        const BUSY = 0x20;
        const SECRET = 0x10;
    }
}

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Record {
    pub attributes: RecordAttributes, // upper 4 bits of attribute byte
    pub category: U4, // lower 4 bits of attribute byte
    pub data: Datablock,
}
impl Record {
    pub fn new(data: Datablock) -> Self {
        Self {
            attributes: RecordAttributes::empty(),
            category: U4::default(),
            data,
        }
    }

    pub fn attribute_byte(&self) -> u8 {
        self.attributes.bits() | self.category.as_base_type()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct RecordMeta {
    pub attributes: RecordAttributes,
    pub category: U4,
}

/// Record databases (PDB).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Records;
impl DirectoryKind for Records {
    type Key = RecordId;
    type Value = Record;
    type Meta = RecordMeta;

    const ENTRY_SIZE: usize = 8;
    const IS_RESOURCE: bool = false;

    fn decode_entry(raw: &[u8]) -> RawEntry<Self::Key, Self::Meta> {
        let offset = u32::from_be_bytes(raw[0..4].try_into().unwrap());

        // attribute byte on top, unique id below
        let combined = u32::from_be_bytes(raw[4..8].try_into().unwrap());
        let id = RecordId::from_base_type_masked(combined);
        let attribute_byte = (combined >> 24) as u8;

        RawEntry {
            key: id,
            meta: RecordMeta {
                attributes: RecordAttributes::from_bits_retain(attribute_byte & 0xF0),
                category: U4::from_base_type_masked(attribute_byte),
            },
            offset,
        }
    }

    fn encode_entry(key: &Self::Key, value: &Self::Value, offset: u32, out: &mut Vec<u8>) {
        let combined = (u32::from(value.attribute_byte()) << 24) | key.as_base_type();
        out.extend_from_slice(&offset.to_be_bytes());
        out.extend_from_slice(&combined.to_be_bytes());
    }

    fn make_value(meta: Self::Meta, data: Datablock) -> Self::Value {
        Record {
            attributes: meta.attributes,
            category: meta.category,
            data,
        }
    }

    fn data(value: &Self::Value) -> &Datablock {
        &value.data
    }
}


#[cfg(test)]
mod tests {
    use super::{
        directory_size, DirectoryKind, Record, RecordAttributes, RecordId, Records, ResourceKey,
        Resources,
    };
    use crate::datablock::Datablock;
    use crate::part_int::U4;

    #[test]
    fn test_directory_sizes() {
        assert_eq!(directory_size::<Resources>(0), 2);
        assert_eq!(directory_size::<Resources>(3), 32);
        assert_eq!(directory_size::<Records>(3), 26);
    }

    #[test]
    fn test_resource_entry() {
        let key: ResourceKey = "tFRM:0x3e8".parse().unwrap();
        assert_eq!(key.id, 1000);

        let mut out = Vec::new();
        Resources::encode_entry(&key, &Datablock::empty(), 0x0000_0102, &mut out);
        assert_eq!(out, b"tFRM\x03\xE8\x00\x00\x01\x02");

        let raw = Resources::decode_entry(&out);
        assert_eq!(raw.key, key);
        assert_eq!(raw.offset, 0x0102);
    }

    #[test]
    fn test_record_entry_packing() {
        let raw = Records::decode_entry(b"\x00\x00\x00\x60\xC3\x12\x34\x56");
        assert_eq!(raw.offset, 0x60);
        assert_eq!(raw.key, RecordId::from_base_type(0x0012_3456).unwrap());
        assert_eq!(raw.meta.attributes, RecordAttributes::DELETE | RecordAttributes::DIRTY);
        assert_eq!(raw.meta.category, U4::from_base_type(3).unwrap());

        let record = Records::make_value(raw.meta, Datablock::empty());
        let mut out = Vec::new();
        Records::encode_entry(&raw.key, &record, 0x60, &mut out);
        assert_eq!(out, b"\x00\x00\x00\x60\xC3\x12\x34\x56");
    }

    #[test]
    fn test_record_defaults() {
        let record = Record::new(Datablock::from(vec![1]));
        assert_eq!(record.attribute_byte(), 0);
    }

    #[test]
    fn test_bad_resource_keys() {
        assert!("code".parse::<ResourceKey>().is_err());
        assert!("cod:1".parse::<ResourceKey>().is_err());
        assert!("code:70000".parse::<ResourceKey>().is_err());
    }
}
