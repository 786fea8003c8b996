//! Project definition files.
//!
//! A project file is a JSON object whose top-level fields apply to every output; the `targets`
//! object holds further fields that apply only to the output with the given file name:
//!
//! ```json
//! {
//!     "creator": "Hack",
//!     "kind": "application",
//!     "targets": {
//!         "hello.prc": { "name": "Hello", "stack_size": 8192 }
//!     }
//! }
//! ```


use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use palmcomp::CompressionLevel;
use palmdb::{DatabaseAttributes, DatabaseName, ResourceKey, Tag};
use serde::Deserialize;
use tracing::debug;

use crate::binres::DatabaseKind;
use crate::settings::{BuildSettings, ConfigConflict, Priority};


#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(default)]
pub struct ProjectFields {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind_tag: Option<Tag>,
    pub creator: Option<Tag>,
    pub version: Option<u16>,
    pub modification_number: Option<u32>,
    pub attributes: Option<Vec<String>>,
    pub kind: Option<DatabaseKind>,
    pub stack_size: Option<u32>,
    pub heap_size: Option<u32>,
    pub emit_data: Option<bool>,
    pub main_code: Option<ResourceKey>,
    pub extra_code_sections: Option<Vec<String>>,
    pub compression: Option<u8>,
    pub force_relocations: Option<bool>,
}
impl ProjectFields {
    fn apply(&self, settings: &mut BuildSettings, priority: Priority) -> Result<(), ConfigError> {
        if let Some(name) = &self.name {
            settings.name.try_set(Some(DatabaseName::from(name.as_str())), priority)?;
        }
        if let Some(kind_tag) = self.kind_tag {
            settings.kind_tag.try_set(Some(kind_tag), priority)?;
        }
        if let Some(creator) = self.creator {
            settings.creator.try_set(creator, priority)?;
        }
        if let Some(version) = self.version {
            settings.version.try_set(version, priority)?;
        }
        if let Some(modification_number) = self.modification_number {
            settings.modification_number.try_set(modification_number, priority)?;
        }
        if let Some(names) = &self.attributes {
            settings.attributes.try_set(parse_attributes(names)?, priority)?;
        }
        if let Some(kind) = self.kind {
            settings.database_kind.try_set(kind, priority)?;
        }
        if let Some(stack_size) = self.stack_size {
            settings.stack_size.try_set(stack_size, priority)?;
        }
        if let Some(heap_size) = self.heap_size {
            settings.heap_size.try_set(heap_size, priority)?;
        }
        if let Some(emit_data) = self.emit_data {
            settings.emit_data.try_set(Some(emit_data), priority)?;
        }
        if let Some(main_code) = self.main_code {
            settings.main_code.try_set(Some(main_code), priority)?;
        }
        if let Some(sections) = &self.extra_code_sections {
            settings.extra_code_sections.try_set(sections.clone(), priority)?;
        }
        if let Some(level) = self.compression {
            if level > CompressionLevel::MAX.as_u8() {
                return Err(ConfigError::InvalidCompression(level));
            }
            settings.compression.try_set(CompressionLevel::new(level), priority)?;
        }
        if let Some(force_relocations) = self.force_relocations {
            settings.force_relocations.try_set(force_relocations, priority)?;
        }
        Ok(())
    }
}


#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub struct Project {
    #[serde(flatten)]
    pub generic: ProjectFields,

    /// Keyed by output file name.
    #[serde(default)]
    pub targets: BTreeMap<String, ProjectFields>,
}
impl Project {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Applies the generic fields, then those specific to `output_name`.
    pub fn apply(&self, settings: &mut BuildSettings, output_name: &str) -> Result<(), ConfigError> {
        self.generic.apply(settings, Priority::ProjectGeneric)?;
        if let Some(specific) = self.targets.get(output_name) {
            debug!("applying project settings for {}", output_name);
            specific.apply(settings, Priority::ProjectSpecific)?;
        }
        Ok(())
    }
}


/// Combines attribute names into one set of flags.
pub fn parse_attributes<S: AsRef<str>>(names: &[S]) -> Result<DatabaseAttributes, ConfigError> {
    let mut attributes = DatabaseAttributes::empty();
    for name in names {
        let flag = DatabaseAttributes::from_setting_name(name.as_ref())
            .ok_or_else(|| ConfigError::UnknownAttribute(name.as_ref().to_owned()))?;
        attributes |= flag;
    }
    Ok(attributes)
}


#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Json(serde_json::Error),
    UnknownAttribute(String),
    InvalidCompression(u8),
    Conflict(ConfigConflict),
}
impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)
                => write!(f, "I/O error: {}", e),
            Self::Json(e)
                => write!(f, "invalid project file: {}", e),
            Self::UnknownAttribute(name)
                => write!(f, "unknown database attribute {:?}", name),
            Self::InvalidCompression(level)
                => write!(f, "compression level {} is not between 0 and {}", level, CompressionLevel::MAX),
            Self::Conflict(e)
                => write!(f, "{}", e),
        }
    }
}
impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            Self::UnknownAttribute(_) => None,
            Self::InvalidCompression(_) => None,
            Self::Conflict(e) => Some(e),
        }
    }
}
impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self { Self::Io(value) }
}
impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self { Self::Json(value) }
}
impl From<ConfigConflict> for ConfigError {
    fn from(value: ConfigConflict) -> Self { Self::Conflict(value) }
}
