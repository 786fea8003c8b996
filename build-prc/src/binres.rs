//! Turning a linked executable into resources.
//!
//! The `.text` section becomes the main code resource. Initialized data (`.data`) and
//! zero-initialized data (`.bss`) are laid out as one image, which is compressed into `data #0`.
//! Absolute relocations within that image are threaded into per-section chains whose heads are
//! stored in `rloc #0`; the startup code walks each chain and adds the runtime address of the
//! section the chain belongs to.


use std::fmt;

use palmcomp::CompressionLevel;
use palmdb::{Datablock, Header, ResourceDatabase, ResourceKey, Tag};
use serde::Deserialize;
use tracing::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::object_file::{
    Architecture, ObjectError, ObjectReader, Relocation, RelocationType, Section, Symbol,
};


pub const CODE: Tag = Tag::new(*b"code");
pub const DATA: Tag = Tag::new(*b"data");
pub const PREF: Tag = Tag::new(*b"pref");
pub const RLOC: Tag = Tag::new(*b"rloc");
pub const TRAP: Tag = Tag::new(*b"TRAP");

pub const DEFAULT_STACK_SIZE: u32 = 4096;
pub const DEFAULT_HEAP_SIZE: u32 = 4096;

/// Ids of the `TRAP` resources generated from `.trap`.
const FIRST_TRAP_ID: u16 = 1000;

/// Launch priority recorded in `pref #0`.
const PREF_PRIORITY: u16 = 30;

/// The legacy jump table stub of applications, reproduced verbatim.
const CODE_ZERO: [u8; 24] = [
    0x00, 0x00, 0x00, 0x28, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x08, 0x00, 0x00, 0x00, 0x20,
    0x00, 0x00, 0x3F, 0x3C, 0x00, 0x01, 0xA9, 0xF0,
];

const EMPTY_CHAIN: u16 = 0xFFFF;
const DATA_CHAIN: u16 = 0;
const TEXT_CHAIN: u16 = 1;


#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    #[default] Application,
    Library,
    Generic,
}
impl DatabaseKind {
    pub fn default_type(&self) -> Tag {
        match self {
            Self::Application => Tag::new(*b"appl"),
            Self::Library => Tag::new(*b"libr"),
            Self::Generic => Tag::new(*b"????"),
        }
    }

    pub fn default_main_code(&self) -> ResourceKey {
        match self {
            Self::Application => ResourceKey::new(CODE, 1),
            Self::Library => ResourceKey::new(Tag::new(*b"libr"), 0),
            Self::Generic => ResourceKey::new(CODE, 1),
        }
    }

    pub fn emits_data_by_default(&self) -> bool {
        match self {
            Self::Application => true,
            Self::Library => false,
            Self::Generic => true,
        }
    }
}
impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Application => write!(f, "application"),
            Self::Library => write!(f, "library"),
            Self::Generic => write!(f, "generic"),
        }
    }
}


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PackOptions {
    pub kind: DatabaseKind,
    pub main_code: ResourceKey,
    pub emit_data: bool,
    pub stack_size: u32,
    pub heap_size: u32,

    /// Further sections to emit as code resources, in order.
    pub extra_code_sections: Vec<String>,

    pub compression: CompressionLevel,
    pub force_relocations: bool,
}
impl PackOptions {
    pub fn for_kind(kind: DatabaseKind) -> Self {
        Self {
            kind,
            main_code: kind.default_main_code(),
            emit_data: kind.emits_data_by_default(),
            stack_size: DEFAULT_STACK_SIZE,
            heap_size: DEFAULT_HEAP_SIZE,
            extra_code_sections: Vec::new(),
            compression: CompressionLevel::PATTERNS,
            force_relocations: false,
        }
    }
}
impl Default for PackOptions {
    fn default() -> Self {
        Self::for_kind(DatabaseKind::default())
    }
}


#[derive(Debug)]
pub enum PackError {
    Object(ObjectError),
    MissingSection(&'static str),
    EntryOutsideText { entry_point: u64, text_address: u64, text_size: u64 },
    EntryMisaligned { offset: u64, architecture: Architecture },
    EntryOutOfRange { offset: u64, architecture: Architecture },
    BadDisposition { length: usize },
    Compression(palmcomp::Error),
    TooLarge { section: String },
}
impl fmt::Display for PackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Object(e)
                => write!(f, "{}", e),
            Self::MissingSection(name)
                => write!(f, "executable has no {} section", name),
            Self::EntryOutsideText { entry_point, text_address, text_size }
                => write!(f, "entry point {:#X} lies outside .text ({:#X}, {} bytes)", entry_point, text_address, text_size),
            Self::EntryMisaligned { offset, architecture }
                => write!(f, "entry point offset {:#X} is misaligned for {}", offset, architecture),
            Self::EntryOutOfRange { offset, architecture }
                => write!(f, "entry point offset {:#X} is out of {} branch range", offset, architecture),
            Self::BadDisposition { length }
                => write!(f, ".disposn section must hold a type and an id, not {} bytes", length),
            Self::Compression(e)
                => write!(f, "data compression failed: {}", e),
            Self::TooLarge { section }
                => write!(f, "section {} is too large", section),
        }
    }
}
impl std::error::Error for PackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Object(e) => Some(e),
            Self::MissingSection(_) => None,
            Self::EntryOutsideText { .. } => None,
            Self::EntryMisaligned { .. } => None,
            Self::EntryOutOfRange { .. } => None,
            Self::BadDisposition { .. } => None,
            Self::Compression(e) => Some(e),
            Self::TooLarge { .. } => None,
        }
    }
}
impl From<ObjectError> for PackError {
    fn from(value: ObjectError) -> Self { Self::Object(value) }
}
impl From<palmcomp::Error> for PackError {
    fn from(value: palmcomp::Error) -> Self { Self::Compression(value) }
}


/// Where a section's contents end up: which relocation chain, and at what offset within the
/// resource belonging to that chain.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
struct ChainInfo {
    chain: u16,
    base: u64,
}

/// The executable as seen by relocation threading.
#[derive(Debug)]
struct Layout<'a> {
    architecture: Architecture,
    sections: &'a [Section],
    symbols: &'a [Symbol],

    /// Indexed like `sections`.
    chains: &'a [Option<ChainInfo>],
}


fn to_usize(value: u64, section: &Section) -> Result<usize, PackError> {
    usize::try_from(value)
        .map_err(|_| PackError::TooLarge { section: section.name.clone() })
}

fn find_section<'a>(sections: &'a [Section], name: &str) -> Option<(usize, &'a Section)> {
    sections.iter()
        .enumerate()
        .find(|(_, s)| s.name == name)
}


/// Builds the branch that is prepended to `.text` when the entry point is not at its start.
pub fn entry_branch(architecture: Architecture, offset: u64) -> Result<Vec<u8>, PackError> {
    match architecture {
        Architecture::M68k => {
            if offset % 2 != 0 {
                return Err(PackError::EntryMisaligned { offset, architecture });
            }
            if offset <= 126 {
                // BRA.S: the displacement is relative to the end of the 2-byte instruction,
                // which is where .text starts
                Ok(vec![0x60, offset as u8])
            } else if offset <= 32766 {
                // BRA.W: relative to the displacement word, 2 bytes before .text
                let displacement = (offset + 2) as u16;
                let mut branch = vec![0x60, 0x00];
                branch.extend_from_slice(&displacement.to_be_bytes());
                Ok(branch)
            } else {
                Err(PackError::EntryOutOfRange { offset, architecture })
            }
        },
        Architecture::Arm => {
            if offset % 4 != 0 {
                return Err(PackError::EntryMisaligned { offset, architecture });
            }
            if offset > 33_554_432 {
                return Err(PackError::EntryOutOfRange { offset, architecture });
            }
            // B: relative to the instruction's address plus 8; .text starts at plus 4
            let word_offset = ((offset - 4) >> 2) as u32;
            let instruction = 0xEA00_0000 | (word_offset & 0x00FF_FFFF);
            Ok(instruction.to_le_bytes().to_vec())
        },
    }
}


/// Packs a linked executable into resources.
///
/// The returned database only carries resources; its header is left for the caller to fill.
/// Problems that only affect individual items are recorded in `diagnostics` under `origin`.
pub fn pack(
    object: &dyn ObjectReader,
    options: &PackOptions,
    diagnostics: &mut Diagnostics,
    origin: &str,
) -> Result<ResourceDatabase, PackError> {
    let architecture = object.architecture();
    let sections = object.read_sections()?;
    let symbols = object.read_symbols()?;
    let relocations = object.read_relocations()?;

    let mut database = ResourceDatabase::new(Header::default());

    let (text_index, text) = find_section(&sections, ".text")
        .ok_or(PackError::MissingSection(".text"))?;
    let data_section = find_section(&sections, ".data");
    let bss_section = find_section(&sections, ".bss");
    let has_data = data_section.map(|(_, s)| s.size > 0).unwrap_or(false)
        || bss_section.map(|(_, s)| s.size > 0).unwrap_or(false);

    // standalone code resources name themselves
    let disposition = find_section(&sections, ".disposn");
    let mut main_code = options.main_code;
    let standalone = if let Some((_, section)) = disposition {
        if section.data.len() < 6 {
            return Err(PackError::BadDisposition { length: section.data.len() });
        }
        let kind = Tag::new(section.data[0..4].try_into().unwrap());
        let id = u16::from_be_bytes(section.data[4..6].try_into().unwrap());
        main_code = ResourceKey::new(kind, id);
        info!("{}: standalone code resource {}", origin, main_code);
        true
    } else {
        false
    };

    // main code, with a branch to the entry point if needed
    let entry_point = object.entry_point();
    if entry_point < text.address || entry_point - text.address > text.size {
        return Err(PackError::EntryOutsideText {
            entry_point,
            text_address: text.address,
            text_size: text.size,
        });
    }
    let entry_offset = entry_point - text.address;
    let mut code = if entry_offset == 0 {
        Vec::new()
    } else {
        entry_branch(architecture, entry_offset)?
    };
    let text_base = u64::try_from(code.len()).unwrap_or(u64::MAX);
    code.extend_from_slice(&text.data);
    debug!("{}: {} bytes of code; entry point at {:#X}", origin, code.len(), entry_offset);
    database.insert(main_code, Datablock::from(code));

    if standalone {
        if let Some((_, trap_section)) = find_section(&sections, ".trap") {
            for (i, trap) in trap_section.data.chunks_exact(2).enumerate() {
                let Some(id) = u16::try_from(i).ok().and_then(|i| FIRST_TRAP_ID.checked_add(i)) else {
                    diagnostics.warn(origin, "too many trap numbers in .trap; ignoring the rest");
                    break;
                };
                database.insert(ResourceKey::new(TRAP, id), Datablock::from(trap));
            }
        }
    } else if options.kind == DatabaseKind::Application {
        database.insert(ResourceKey::new(CODE, 0), Datablock::from(CODE_ZERO));

        let mut pref = Vec::with_capacity(10);
        pref.extend_from_slice(&PREF_PRIORITY.to_be_bytes());
        pref.extend_from_slice(&options.stack_size.to_be_bytes());
        pref.extend_from_slice(&options.heap_size.to_be_bytes());
        database.insert(ResourceKey::new(PREF, 0), Datablock::from(pref));
    }

    // chain table: which resource each section lands in
    let mut chains: Vec<Option<ChainInfo>> = vec![None; sections.len()];
    chains[text_index] = Some(ChainInfo { chain: TEXT_CHAIN, base: text_base });

    let data_address = data_section
        .or(bss_section)
        .map(|(_, s)| s.address)
        .unwrap_or(0);
    if let Some((index, _)) = data_section {
        chains[index] = Some(ChainInfo { chain: DATA_CHAIN, base: 0 });
    }
    let mut bss_base = 0;
    if let Some((index, bss)) = bss_section {
        bss_base = bss.address.saturating_sub(data_address);
        chains[index] = Some(ChainInfo { chain: DATA_CHAIN, base: bss_base });
    }

    let mut chain_count = TEXT_CHAIN + 1;
    let mut extra_code = Vec::new();
    if !standalone {
        for name in &options.extra_code_sections {
            let Some((index, section)) = find_section(&sections, name) else {
                diagnostics.warn(origin, format!("code section {} not found", name));
                continue;
            };
            chains[index] = Some(ChainInfo { chain: chain_count, base: 0 });
            chain_count += 1;
            extra_code.push(section);
        }
    }

    // further code resources take the next free ids of the main code's type
    let mut next_id = main_code.id;
    for section in extra_code {
        let key = loop {
            next_id = next_id.wrapping_add(1);
            let key = ResourceKey::new(main_code.kind, next_id);
            if !database.contains_key(&key) {
                break key;
            }
        };
        debug!("{}: section {} becomes {}", origin, section.name, key);
        database.insert(key, Datablock::from(section.data.as_slice()));
    }

    if standalone || !options.emit_data {
        if has_data {
            diagnostics.warn(origin, "global data present but packaging configured to discard it");
        }
    } else {
        let data_size = data_section.map(|(_, s)| s.size).unwrap_or(0);
        let bss_end = bss_section.map(|(_, s)| bss_base + s.size).unwrap_or(0);
        let image_size = data_size.max(bss_end);

        let data_bytes = data_section.map(|(_, s)| s.data.as_slice()).unwrap_or(&[]);
        let image_size_usize = match data_section.or(bss_section) {
            Some((_, section)) => to_usize(image_size, section)?,
            None => 0,
        };
        // the slice zero-pads the image out to the end of .bss
        let mut image = Datablock::from(data_bytes).slice(0, image_size_usize);

        let layout = Layout {
            architecture,
            sections: &sections,
            symbols: &symbols,
            chains: &chains,
        };
        let mut chain_heads = vec![EMPTY_CHAIN; usize::from(chain_count)];
        let threaded = thread_relocations(&layout, &relocations, &mut image, &mut chain_heads, diagnostics, origin);

        if threaded > 0 || options.force_relocations {
            let mut rloc = Vec::with_capacity(chain_heads.len() * 2);
            for head in &chain_heads {
                rloc.extend_from_slice(&architecture.u16_bytes(*head));
            }
            database.insert(ResourceKey::new(RLOC, 0), Datablock::from(rloc));
        }

        let data_resource = palmcomp::encode_data_resource(image.contents(), options.compression)?;
        database.insert(ResourceKey::new(DATA, 0), Datablock::from(data_resource));
    }

    // executable sections nobody asked for
    for (index, section) in sections.iter().enumerate() {
        if section.executable && chains[index].is_none() {
            diagnostics.warn(origin, format!("spurious code section {}", section.name));
        }
    }

    Ok(database)
}

/// Threads the absolute relocations of the data image into their target's chains.
///
/// Each relocation site receives the previous head of its chain in its first two bytes and the
/// value's offset within the target resource in its last two. Returns the number of relocations
/// threaded.
fn thread_relocations(
    layout: &Layout<'_>,
    relocations: &[Relocation],
    image: &mut Datablock,
    chain_heads: &mut [u16],
    diagnostics: &mut Diagnostics,
    origin: &str,
) -> usize {
    let Layout { architecture, sections, symbols, chains } = *layout;
    let image_len = u64::try_from(image.len()).unwrap_or(u64::MAX);
    let mut threaded = 0;

    for relocation in relocations {
        let source = &sections[relocation.section];
        if relocation.kind != RelocationType::Absolute32 {
            diagnostics.warn(origin, format!(
                "unknown relocation type {:?} in {} at {:#X}; skipping",
                relocation.kind, source.name, relocation.offset,
            ));
            continue;
        }

        let Some(source_info) = chains[relocation.section].filter(|c| c.chain == DATA_CHAIN) else {
            diagnostics.warn(origin, format!(
                "relocation in unexpected section {} at {:#X}; skipping",
                source.name, relocation.offset,
            ));
            continue;
        };

        let site = source_info.base.saturating_add(relocation.offset);
        if site.saturating_add(4) > image_len || site >= u64::from(EMPTY_CHAIN) {
            diagnostics.warn(origin, format!(
                "relocation at {:#X} in {} is out of range; skipping",
                relocation.offset, source.name,
            ));
            continue;
        }

        let target_info = relocation.target_section(symbols)
            .and_then(|index| chains.get(index).copied().flatten().map(|info| (index, info)));
        let Some((target_index, target_info)) = target_info else {
            diagnostics.warn(origin, format!(
                "relocation at {:#X} in {} refers to an unknown section; skipping",
                relocation.offset, source.name,
            ));
            continue;
        };

        // both checked above to fit
        let site = site as usize;
        let site_bytes = &mut image.writable_contents()[site..site+4];
        let original = architecture.read_u32(site_bytes[0..4].try_into().unwrap());
        let delta = i128::from(original)
            - i128::from(sections[target_index].address)
            + i128::from(target_info.base);
        let Ok(delta) = u16::try_from(delta) else {
            diagnostics.warn(origin, format!(
                "relocated value {:#X} at {:#X} in {} does not fit its chain; skipping",
                original, relocation.offset, source.name,
            ));
            continue;
        };

        let head = &mut chain_heads[usize::from(target_info.chain)];
        site_bytes[0..2].copy_from_slice(&architecture.u16_bytes(*head));
        site_bytes[2..4].copy_from_slice(&architecture.u16_bytes(delta));
        *head = site as u16;
        threaded += 1;
    }

    debug!("{}: threaded {} relocations", origin, threaded);
    threaded
}


#[cfg(test)]
mod tests {
    use super::{
        entry_branch, pack, DatabaseKind, PackError, PackOptions, CODE, CODE_ZERO, DATA, PREF,
        RLOC, TRAP,
    };
    use crate::diagnostics::Diagnostics;
    use crate::object_file::{
        Architecture, ObjectImage, Relocation, RelocationTarget, RelocationType, Symbol,
    };
    use palmcomp::CompressionLevel;
    use palmdb::{ResourceKey, Tag};
    use tracing_test::traced_test;

    const TEXT_ADDRESS: u64 = 0x1000;
    const DATA_ADDRESS: u64 = 0x8000;

    fn application(text_size: usize, entry_offset: u64) -> ObjectImage {
        let mut object = ObjectImage::new(Architecture::M68k);
        object.add_section(".text", TEXT_ADDRESS, vec![0x4E; text_size], true);
        object.entry_point = TEXT_ADDRESS + entry_offset;
        object
    }

    fn absolute(section: usize, offset: u64, target: usize) -> Relocation {
        Relocation {
            kind: RelocationType::Absolute32,
            section,
            offset,
            target: RelocationTarget::Section(target),
        }
    }

    #[test]
    fn test_entry_point_patch() {
        let object = application(100, 50);
        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &PackOptions::default(), &mut diagnostics, "app").unwrap();

        let code = db.get(&ResourceKey::new(CODE, 1)).unwrap();
        assert_eq!(code.len(), 102);
        // BRA.S to offset 2 + 50
        assert_eq!(&code.contents()[0..2], &[0x60, 50]);
        assert_eq!(diagnostics.exit_status(), 0);
    }

    #[test]
    fn test_entry_branches() {
        assert_eq!(entry_branch(Architecture::M68k, 126).unwrap(), [0x60, 0x7E]);
        assert_eq!(entry_branch(Architecture::M68k, 128).unwrap(), [0x60, 0x00, 0x00, 0x82]);
        assert!(matches!(entry_branch(Architecture::M68k, 32768), Err(PackError::EntryOutOfRange { .. })));
        assert!(matches!(entry_branch(Architecture::M68k, 51), Err(PackError::EntryMisaligned { .. })));

        assert_eq!(entry_branch(Architecture::Arm, 4).unwrap(), [0x00, 0x00, 0x00, 0xEA]);
        assert_eq!(entry_branch(Architecture::Arm, 0x104).unwrap(), [0x40, 0x00, 0x00, 0xEA]);
        assert!(matches!(entry_branch(Architecture::Arm, 33_554_436), Err(PackError::EntryOutOfRange { .. })));
    }

    #[test]
    fn test_entry_outside_text() {
        let object = application(16, 40);
        let mut diagnostics = Diagnostics::new();
        assert!(matches!(
            pack(&object, &PackOptions::default(), &mut diagnostics, "app"),
            Err(PackError::EntryOutsideText { .. }),
        ));
    }

    #[test]
    fn test_application_resources() {
        let mut object = application(8, 0);
        object.add_section(".data", DATA_ADDRESS, vec![1, 2, 3, 4], false);
        let mut options = PackOptions::default();
        options.stack_size = 0x2000;

        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &options, &mut diagnostics, "app").unwrap();

        let keys: Vec<String> = db.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["code #0", "code #1", "data #0", "pref #0"]);
        assert_eq!(db.get(&ResourceKey::new(CODE, 0)).unwrap().contents(), &CODE_ZERO);
        assert_eq!(
            db.get(&ResourceKey::new(PREF, 0)).unwrap().contents(),
            &[0x00, 0x1E, 0x00, 0x00, 0x20, 0x00, 0x00, 0x00, 0x10, 0x00],
        );

        let data = db.get(&ResourceKey::new(DATA, 0)).unwrap();
        let image = palmcomp::decode_data_resource(data.contents(), 4).unwrap();
        assert_eq!(image, [1, 2, 3, 4]);
    }

    #[test]
    #[traced_test]
    fn test_relocation_chain_threading() {
        let mut object = application(64, 0);
        let mut data = vec![0u8; 16];
        data[4..8].copy_from_slice(&(TEXT_ADDRESS as u32 + 0x10).to_be_bytes());
        data[12..16].copy_from_slice(&(TEXT_ADDRESS as u32 + 0x20).to_be_bytes());
        let data_index = object.add_section(".data", DATA_ADDRESS, data, false);
        object.relocations.push(absolute(data_index, 4, 0));
        object.relocations.push(absolute(data_index, 12, 0));

        let mut options = PackOptions::default();
        options.compression = CompressionLevel::LITERAL;
        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &options, &mut diagnostics, "app").unwrap();
        assert_eq!(diagnostics.warning_count(), 0);

        // data chain empty, text chain starts at the last relocation
        let rloc = db.get(&ResourceKey::new(RLOC, 0)).unwrap();
        assert_eq!(rloc.contents(), &[0xFF, 0xFF, 0x00, 0x0C]);

        let data = db.get(&ResourceKey::new(DATA, 0)).unwrap();
        let image = palmcomp::decode_data_resource(data.contents(), 16).unwrap();
        assert_eq!(&image[12..16], &[0x00, 0x04, 0x00, 0x20]);
        assert_eq!(&image[4..8], &[0xFF, 0xFF, 0x00, 0x10]);
    }

    #[test]
    #[traced_test]
    fn test_relocation_into_bss() {
        let mut object = application(4, 0);
        let mut data = vec![0u8; 8];
        data[0..4].copy_from_slice(&(DATA_ADDRESS as u32 + 0x14).to_be_bytes());
        let data_index = object.add_section(".data", DATA_ADDRESS, data, false);
        let bss_index = object.add_zero_section(".bss", DATA_ADDRESS + 0x10, 0x10);
        object.symbols.push(Symbol { name: "counter".to_owned(), value: DATA_ADDRESS + 0x14, section: Some(bss_index) });
        object.relocations.push(Relocation {
            kind: RelocationType::Absolute32,
            section: data_index,
            offset: 0,
            target: RelocationTarget::Symbol(0),
        });

        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &PackOptions::default(), &mut diagnostics, "app").unwrap();

        assert_eq!(db.get(&ResourceKey::new(RLOC, 0)).unwrap().contents(), &[0x00, 0x00, 0xFF, 0xFF]);
        let data = db.get(&ResourceKey::new(DATA, 0)).unwrap();
        let image = palmcomp::decode_data_resource(data.contents(), 0x20).unwrap();
        // bss starts at 0x10 within the image
        assert_eq!(&image[0..4], &[0xFF, 0xFF, 0x00, 0x14]);
    }

    #[test]
    #[traced_test]
    fn test_bad_relocations_are_skipped() {
        let mut object = application(4, 0);
        let data_index = object.add_section(".data", DATA_ADDRESS, vec![0u8; 8], false);
        object.relocations.push(Relocation { kind: RelocationType::Other(5), ..absolute(data_index, 0, 0) });
        object.relocations.push(absolute(0, 0, data_index));
        object.relocations.push(absolute(data_index, 6, 0));
        object.relocations.push(Relocation { target: RelocationTarget::Absolute, ..absolute(data_index, 0, 0) });

        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &PackOptions::default(), &mut diagnostics, "app").unwrap();

        assert_eq!(diagnostics.warning_count(), 4);
        assert!(!db.contains_key(&ResourceKey::new(RLOC, 0)));
        assert!(logs_contain("unknown relocation type"));
        assert!(logs_contain("unexpected section .text"));
        assert!(logs_contain("out of range"));
        assert!(logs_contain("unknown section"));
    }

    #[test]
    fn test_forced_relocations() {
        let object = application(4, 0);
        let mut options = PackOptions::default();
        options.force_relocations = true;
        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &options, &mut diagnostics, "app").unwrap();
        assert_eq!(db.get(&ResourceKey::new(RLOC, 0)).unwrap().contents(), &[0xFF, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    #[traced_test]
    fn test_library_discards_data() {
        let mut object = application(4, 0);
        object.add_section(".data", DATA_ADDRESS, vec![1, 2], false);
        let options = PackOptions::for_kind(DatabaseKind::Library);

        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &options, &mut diagnostics, "lib").unwrap();

        let keys: Vec<String> = db.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["libr #0"]);
        assert_eq!(diagnostics.warning_count(), 1);
        assert!(logs_contain("global data present but packaging configured to discard it"));
    }

    #[test]
    #[traced_test]
    fn test_extra_code_sections() {
        let mut object = application(4, 0);
        object.add_section(".text.ui", 0x2000, vec![0xAA; 6], true);
        object.add_section(".text.db", 0x3000, vec![0xBB; 2], true);
        object.add_section(".text.stray", 0x4000, vec![0xCC; 2], true);
        let mut options = PackOptions::for_kind(DatabaseKind::Generic);
        options.extra_code_sections = vec![".text.ui".to_owned(), ".text.missing".to_owned(), ".text.db".to_owned()];
        options.emit_data = false;

        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &options, &mut diagnostics, "gen").unwrap();

        assert_eq!(db.get(&ResourceKey::new(CODE, 2)).unwrap().contents(), &[0xAA; 6]);
        assert_eq!(db.get(&ResourceKey::new(CODE, 3)).unwrap().contents(), &[0xBB; 2]);
        assert_eq!(db.len(), 3);
        assert_eq!(diagnostics.warning_count(), 2);
        assert!(logs_contain("code section .text.missing not found"));
        assert!(logs_contain("spurious code section .text.stray"));
    }

    #[test]
    fn test_standalone_code_resource() {
        let mut object = application(4, 0);
        let mut disposition = b"DAcc".to_vec();
        disposition.extend_from_slice(&0x2710u16.to_be_bytes());
        object.add_section(".disposn", 0, disposition, false);
        object.add_section(".trap", 0, vec![0xA0, 0x01, 0xA0, 0x02], false);

        let mut diagnostics = Diagnostics::new();
        let db = pack(&object, &PackOptions::default(), &mut diagnostics, "hack").unwrap();

        let keys: Vec<String> = db.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["DAcc #10000", "TRAP #1000", "TRAP #1001"]);
        assert_eq!(db.get(&ResourceKey::new(TRAP, 1001)).unwrap().contents(), &[0xA0, 0x02]);
        assert_eq!(db.get(&ResourceKey::new(Tag::new(*b"DAcc"), 10000)).unwrap().len(), 4);
    }
}
