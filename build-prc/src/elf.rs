//! Linked ELF executables, read through the `object` crate.


use std::collections::HashMap;

use from_to_repr::from_to_other;
use object::{
    BinaryFormat, Object, ObjectKind, ObjectSection, ObjectSymbol, RelocationFlags, RelocationKind,
    SectionFlags, SectionIndex, SectionKind, SymbolIndex,
};
use tracing::debug;

use crate::object_file::{
    Architecture, ObjectError, ObjectReader, Relocation, RelocationTarget, RelocationType, Section,
    Symbol,
};


#[derive(Clone, Copy, Debug)]
#[from_to_other(base_type = u16, derive_compare = "as_int")]
enum ElfMachine {
    M68k = 4,
    Arm = 40,
    Other(u16),
}


#[derive(Debug)]
pub struct ElfObject<'data> {
    file: object::File<'data>,
    architecture: Architecture,
}
impl<'data> ElfObject<'data> {
    pub fn parse(data: &'data [u8]) -> Result<Self, ObjectError> {
        let file = object::File::parse(data)
            .map_err(|e| ObjectError::NotAnObject(e.to_string()))?;
        if file.format() != BinaryFormat::Elf {
            return Err(ObjectError::NotAnObject(format!("{:?} files are not supported", file.format())));
        }
        if file.kind() != ObjectKind::Executable {
            return Err(ObjectError::NotLinked);
        }

        // e_machine; parsing succeeded, so the header is complete
        let machine_bytes: [u8; 2] = data[18..20].try_into().unwrap();
        let machine = if file.is_little_endian() {
            u16::from_le_bytes(machine_bytes)
        } else {
            u16::from_be_bytes(machine_bytes)
        };
        let architecture = match ElfMachine::from_base_type(machine) {
            ElfMachine::M68k => Architecture::M68k,
            ElfMachine::Arm => Architecture::Arm,
            other => return Err(ObjectError::UnsupportedArchitecture(other.to_base_type())),
        };
        debug!("{} executable with entry point {:#X}", architecture, file.entry());

        Ok(Self {
            file,
            architecture,
        })
    }

    /// Maps the file's section indexes to ours; unnamed sections (the null section) are left out.
    fn section_indices(&self) -> Result<HashMap<SectionIndex, usize>, ObjectError> {
        let mut indices = HashMap::new();
        for section in self.file.sections() {
            let name = section.name()
                .map_err(|e| ObjectError::Malformed(e.to_string()))?;
            if name.is_empty() {
                continue;
            }
            let next_index = indices.len();
            indices.insert(section.index(), next_index);
        }
        Ok(indices)
    }

    fn symbol_table(&self) -> Result<(Vec<Symbol>, HashMap<SymbolIndex, usize>), ObjectError> {
        let section_indices = self.section_indices()?;
        let mut symbols = Vec::new();
        let mut indices = HashMap::new();
        for symbol in self.file.symbols() {
            let name = symbol.name().unwrap_or("");
            let section = symbol.section_index()
                .and_then(|i| section_indices.get(&i).copied());
            indices.insert(symbol.index(), symbols.len());
            symbols.push(Symbol {
                name: name.to_owned(),
                value: symbol.address(),
                section,
            });
        }
        Ok((symbols, indices))
    }
}
impl<'data> ObjectReader for ElfObject<'data> {
    fn architecture(&self) -> Architecture { self.architecture }
    fn entry_point(&self) -> u64 { self.file.entry() }

    fn read_sections(&self) -> Result<Vec<Section>, ObjectError> {
        let mut sections = Vec::new();
        for section in self.file.sections() {
            let name = section.name()
                .map_err(|e| ObjectError::Malformed(e.to_string()))?;
            if name.is_empty() {
                continue;
            }
            let data = if section.kind() == SectionKind::UninitializedData {
                Vec::new()
            } else {
                section.data()
                    .map_err(|e| ObjectError::Malformed(format!("section {}: {}", name, e)))?
                    .to_vec()
            };
            let executable = match section.flags() {
                SectionFlags::Elf { sh_flags } => sh_flags & u64::from(object::elf::SHF_EXECINSTR) != 0,
                _ => false,
            };
            sections.push(Section {
                name: name.to_owned(),
                address: section.address(),
                size: section.size(),
                data,
                executable,
            });
        }
        Ok(sections)
    }

    fn read_symbols(&self) -> Result<Vec<Symbol>, ObjectError> {
        let (symbols, _indices) = self.symbol_table()?;
        Ok(symbols)
    }

    fn read_relocations(&self) -> Result<Vec<Relocation>, ObjectError> {
        let section_indices = self.section_indices()?;
        let (_symbols, symbol_indices) = self.symbol_table()?;

        let mut relocations = Vec::new();
        for section in self.file.sections() {
            let Some(&our_section) = section_indices.get(&section.index()) else { continue };
            for (address, relocation) in section.relocations() {
                let kind = match (relocation.kind(), relocation.size()) {
                    (RelocationKind::Absolute, 32) => RelocationType::Absolute32,
                    _ => match relocation.flags() {
                        RelocationFlags::Elf { r_type } => RelocationType::Other(r_type),
                        _ => RelocationType::Other(0),
                    },
                };
                let target = match relocation.target() {
                    object::RelocationTarget::Symbol(index) => symbol_indices.get(&index)
                        .map(|&i| RelocationTarget::Symbol(i))
                        .unwrap_or(RelocationTarget::Absolute),
                    object::RelocationTarget::Section(index) => section_indices.get(&index)
                        .map(|&i| RelocationTarget::Section(i))
                        .unwrap_or(RelocationTarget::Absolute),
                    _ => RelocationTarget::Absolute,
                };
                relocations.push(Relocation {
                    kind,
                    section: our_section,
                    // executables carry addresses, not section offsets
                    offset: address.wrapping_sub(section.address()),
                    target,
                });
            }
        }
        Ok(relocations)
    }
}
