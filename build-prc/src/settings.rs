//! Settings that several sources may set, each with its own priority.
//!
//! A setting remembers the priority of the source that set it last. A source of equal or higher
//! priority may replace the value; a source of lower priority that tries to change it is in
//! conflict with the incumbent.


use std::fmt;
use std::path::Path;

use palmcomp::CompressionLevel;
use palmdb::{DatabaseAttributes, DatabaseName, Header, ResourceKey, Tag};

use crate::binres::{DatabaseKind, PackOptions, DEFAULT_HEAP_SIZE, DEFAULT_STACK_SIZE};


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Priority {
    Default,
    ProjectGeneric,
    ProjectSpecific,
    Legacy,
    CommandLine,
}
impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "built-in default"),
            Self::ProjectGeneric => write!(f, "project file"),
            Self::ProjectSpecific => write!(f, "project file target section"),
            Self::Legacy => write!(f, "positional arguments"),
            Self::CommandLine => write!(f, "command-line option"),
        }
    }
}


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ConfigConflict {
    pub setting: &'static str,
    pub incumbent: Priority,
    pub attempted: Priority,
}
impl fmt::Display for ConfigConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f, "{} set by {} conflicts with the value already set by {}",
            self.setting, self.attempted, self.incumbent,
        )
    }
}
impl std::error::Error for ConfigConflict {
}


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum SettingState {
    Unset,
    SetAt(Priority),
}


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Setting<T> {
    name: &'static str,
    value: T,
    state: SettingState,
}
impl<T: PartialEq> Setting<T> {
    pub fn new(name: &'static str, default: T) -> Self {
        Self {
            name,
            value: default,
            state: SettingState::Unset,
        }
    }

    pub fn get(&self) -> &T { &self.value }
    pub fn state(&self) -> SettingState { self.state }

    pub fn try_set(&mut self, value: T, priority: Priority) -> Result<(), ConfigConflict> {
        match self.state {
            SettingState::SetAt(incumbent) if priority < incumbent => {
                if value == self.value {
                    // agreeing with a stronger source is not a conflict
                    return Ok(());
                }
                Err(ConfigConflict {
                    setting: self.name,
                    incumbent,
                    attempted: priority,
                })
            },
            _ => {
                self.value = value;
                self.state = SettingState::SetAt(priority);
                Ok(())
            },
        }
    }
}


/// Everything the `pack` command can be told.
///
/// Settings holding `None` take their value from the database kind or the output file name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BuildSettings {
    pub name: Setting<Option<DatabaseName>>,
    pub kind_tag: Setting<Option<Tag>>,
    pub creator: Setting<Tag>,
    pub version: Setting<u16>,
    pub modification_number: Setting<u32>,
    pub attributes: Setting<DatabaseAttributes>,
    pub database_kind: Setting<DatabaseKind>,
    pub stack_size: Setting<u32>,
    pub heap_size: Setting<u32>,
    pub emit_data: Setting<Option<bool>>,
    pub main_code: Setting<Option<ResourceKey>>,
    pub extra_code_sections: Setting<Vec<String>>,
    pub compression: Setting<CompressionLevel>,
    pub force_relocations: Setting<bool>,
}
impl BuildSettings {
    pub fn new() -> Self {
        Self {
            name: Setting::new("name", None),
            kind_tag: Setting::new("type", None),
            creator: Setting::new("creator", Tag::new(*b"????")),
            version: Setting::new("version", 1),
            modification_number: Setting::new("modification number", 0),
            attributes: Setting::new("attributes", DatabaseAttributes::empty()),
            database_kind: Setting::new("database kind", DatabaseKind::Application),
            stack_size: Setting::new("stack size", DEFAULT_STACK_SIZE),
            heap_size: Setting::new("heap size", DEFAULT_HEAP_SIZE),
            emit_data: Setting::new("data emission", None),
            main_code: Setting::new("main code resource", None),
            extra_code_sections: Setting::new("extra code sections", Vec::new()),
            compression: Setting::new("compression", CompressionLevel::PATTERNS),
            force_relocations: Setting::new("relocation forcing", false),
        }
    }

    /// The header of the database written to `output`.
    ///
    /// Without an explicit name, the output file's name minus its extension is used.
    pub fn header(&self, output: &Path) -> Header {
        let name = match self.name.get() {
            Some(name) => name.clone(),
            None => {
                let stem = output.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default();
                DatabaseName::from(stem.as_str())
            },
        };
        let kind = self.kind_tag.get()
            .unwrap_or_else(|| self.database_kind.get().default_type());

        let mut header = Header::new(name, kind, *self.creator.get());
        header.version = *self.version.get();
        header.modification_number = *self.modification_number.get();
        header.attributes = *self.attributes.get();
        header
    }

    pub fn pack_options(&self) -> PackOptions {
        let kind = *self.database_kind.get();
        let mut options = PackOptions::for_kind(kind);
        if let Some(main_code) = self.main_code.get() {
            options.main_code = *main_code;
        }
        if let Some(emit_data) = self.emit_data.get() {
            options.emit_data = *emit_data;
        }
        options.stack_size = *self.stack_size.get();
        options.heap_size = *self.heap_size.get();
        options.extra_code_sections = self.extra_code_sections.get().clone();
        options.compression = *self.compression.get();
        options.force_relocations = *self.force_relocations.get();
        options
    }
}
impl Default for BuildSettings {
    fn default() -> Self {
        Self::new()
    }
}
