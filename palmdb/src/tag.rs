//! Four-byte type/creator tags and database names.
//!
//! Neither is a C string: tags are always exactly four bytes and names may fill all 32 bytes of
//! their field without a terminating NUL.


use std::fmt;
use std::str::FromStr;


pub const NAME_SIZE: usize = 32;


fn write_escaped(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for &b in bytes {
        match b {
            0x00 => write!(f, "\\0")?,
            0x09 => write!(f, "\\t")?,
            0x0A => write!(f, "\\n")?,
            0x0D => write!(f, "\\r")?,
            0x5C => write!(f, "\\\\")?,
            0x20..=0x7E => write!(f, "{}", char::from(b))?,
            other => write!(f, "\\x{:02X}", other)?,
        }
    }
    Ok(())
}


#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct TagError {
    length: usize,
}
impl fmt::Display for TagError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a tag must be exactly 4 bytes long, not {}", self.length)
    }
}
impl std::error::Error for TagError {
}


/// A four-byte type or creator code such as `appl` or `code`.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Tag([u8; 4]);
impl Tag {
    pub const fn new(bytes: [u8; 4]) -> Self { Self(bytes) }
    pub const fn as_bytes(&self) -> &[u8; 4] { &self.0 }
}
impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.0)
    }
}
impl fmt::Debug for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tag(\"{}\")", self)
    }
}
impl FromStr for Tag {
    type Err = TagError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::try_from(s.as_bytes())
    }
}
impl From<[u8; 4]> for Tag {
    fn from(value: [u8; 4]) -> Self {
        Self(value)
    }
}
impl From<Tag> for [u8; 4] {
    fn from(value: Tag) -> Self {
        value.0
    }
}
impl TryFrom<&[u8]> for Tag {
    type Error = TagError;
    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; 4] = value.try_into()
            .map_err(|_| TagError { length: value.len() })?;
        Ok(Self(bytes))
    }
}
#[cfg(feature = "serde")]
impl serde::Serialize for Tag {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}
#[cfg(feature = "serde")]
impl<'d> serde::Deserialize<'d> for Tag {
    fn deserialize<D: serde::Deserializer<'d>>(deserializer: D) -> Result<Self, D::Error> {
        use serde::de::Error as _;

        let stringy = String::deserialize(deserializer)?;
        stringy.parse()
            .map_err(|e: TagError| D::Error::custom(e.to_string()))
    }
}


/// The name of a database, stored NUL-padded in a 32-byte field.
#[derive(Clone, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct DatabaseName(Vec<u8>);
impl DatabaseName {
    /// Takes the bytes up to the first NUL, at most [`NAME_SIZE`] of them.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let limited = &bytes[..bytes.len().min(NAME_SIZE)];
        let length = limited.iter()
            .position(|&b| b == 0x00)
            .unwrap_or(limited.len());
        Self(limited[..length].to_vec())
    }

    pub fn as_bytes(&self) -> &[u8] { &self.0 }

    pub fn to_padded(&self) -> [u8; NAME_SIZE] {
        let mut ret = [0u8; NAME_SIZE];
        ret[..self.0.len()].copy_from_slice(&self.0);
        ret
    }

    /// Whether the name leaves room for a terminating NUL, which the device expects.
    pub fn is_terminated(&self) -> bool {
        self.0.len() < NAME_SIZE
    }
}
impl fmt::Display for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_escaped(f, &self.0)
    }
}
impl fmt::Debug for DatabaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DatabaseName(\"{}\")", self)
    }
}
impl From<&str> for DatabaseName {
    fn from(value: &str) -> Self {
        Self::from_bytes(value.as_bytes())
    }
}
#[cfg(feature = "serde")]
impl serde::Serialize for DatabaseName {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_string().serialize(serializer)
    }
}
