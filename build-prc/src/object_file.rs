//! What the packer needs to know about a linked executable.


use std::fmt;


/// The two processor families that run the handheld OS.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Architecture {
    /// Big-endian 68000 family.
    M68k,

    /// Little-endian ARM.
    Arm,
}
impl Architecture {
    pub fn is_little_endian(&self) -> bool {
        match self {
            Self::M68k => false,
            Self::Arm => true,
        }
    }

    pub fn read_u32(&self, bytes: [u8; 4]) -> u32 {
        if self.is_little_endian() {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        }
    }

    pub fn u16_bytes(&self, value: u16) -> [u8; 2] {
        if self.is_little_endian() {
            value.to_le_bytes()
        } else {
            value.to_be_bytes()
        }
    }
}
impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::M68k => write!(f, "m68k"),
            Self::Arm => write!(f, "ARM"),
        }
    }
}


#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Section {
    pub name: String,
    pub address: u64,
    pub size: u64,

    /// Empty for sections that occupy no file space, such as `.bss`.
    pub data: Vec<u8>,

    pub executable: bool,
}

#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Symbol {
    pub name: String,
    pub value: u64,

    /// Index into the section list; `None` for absolute and undefined symbols.
    pub section: Option<usize>,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum RelocationType {
    Absolute32,

    /// Anything else, by its format-specific number.
    Other(u32),
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum RelocationTarget {
    Section(usize),
    Symbol(usize),
    Absolute,
}

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Relocation {
    pub kind: RelocationType,

    /// The section containing the relocated value.
    pub section: usize,

    /// Offset of the relocated value from the start of `section`.
    pub offset: u64,

    pub target: RelocationTarget,
}
impl Relocation {
    /// The section the relocated value points into, if known.
    pub fn target_section(&self, symbols: &[Symbol]) -> Option<usize> {
        match self.target {
            RelocationTarget::Section(index) => Some(index),
            RelocationTarget::Symbol(index) => symbols.get(index).and_then(|s| s.section),
            RelocationTarget::Absolute => None,
        }
    }
}


#[derive(Debug)]
pub enum ObjectError {
    NotAnObject(String),
    NotLinked,
    UnsupportedArchitecture(u16),
    Malformed(String),
}
impl fmt::Display for ObjectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject(reason)
                => write!(f, "not an object file: {}", reason),
            Self::NotLinked
                => write!(f, "object file is not a linked executable"),
            Self::UnsupportedArchitecture(machine)
                => write!(f, "unsupported target architecture (machine {})", machine),
            Self::Malformed(reason)
                => write!(f, "malformed object file: {}", reason),
        }
    }
}
impl std::error::Error for ObjectError {
}


/// A linked executable from which resources are packed.
///
/// Sections are referred to by their index in [`read_sections`](Self::read_sections).
pub trait ObjectReader : fmt::Debug {
    fn architecture(&self) -> Architecture;
    fn entry_point(&self) -> u64;
    fn read_sections(&self) -> Result<Vec<Section>, ObjectError>;
    fn read_symbols(&self) -> Result<Vec<Symbol>, ObjectError>;

    /// Relocations in all sections, in the order the file lists them.
    fn read_relocations(&self) -> Result<Vec<Relocation>, ObjectError>;
}


/// An executable assembled in memory.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct ObjectImage {
    pub architecture: Architecture,
    pub entry_point: u64,
    pub sections: Vec<Section>,
    pub symbols: Vec<Symbol>,
    pub relocations: Vec<Relocation>,
}
impl ObjectImage {
    pub fn new(architecture: Architecture) -> Self {
        Self {
            architecture,
            entry_point: 0,
            sections: Vec::new(),
            symbols: Vec::new(),
            relocations: Vec::new(),
        }
    }

    /// Appends a section and returns its index.
    pub fn add_section(&mut self, name: &str, address: u64, data: Vec<u8>, executable: bool) -> usize {
        self.sections.push(Section {
            name: name.to_owned(),
            address,
            size: data.len().try_into().unwrap_or(u64::MAX),
            data,
            executable,
        });
        self.sections.len() - 1
    }

    /// Appends a section without file contents, like `.bss`.
    pub fn add_zero_section(&mut self, name: &str, address: u64, size: u64) -> usize {
        self.sections.push(Section {
            name: name.to_owned(),
            address,
            size,
            data: Vec::new(),
            executable: false,
        });
        self.sections.len() - 1
    }
}
impl ObjectReader for ObjectImage {
    fn architecture(&self) -> Architecture { self.architecture }
    fn entry_point(&self) -> u64 { self.entry_point }
    fn read_sections(&self) -> Result<Vec<Section>, ObjectError> { Ok(self.sections.clone()) }
    fn read_symbols(&self) -> Result<Vec<Symbol>, ObjectError> { Ok(self.symbols.clone()) }
    fn read_relocations(&self) -> Result<Vec<Relocation>, ObjectError> { Ok(self.relocations.clone()) }
}
