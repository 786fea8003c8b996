//! Merging resources from several input files into one database.


use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use palmdb::{AnyDatabase, Datablock, FormatError, Header, ResourceDatabase, ResourceKey, Tag};
use tracing::{debug, info};

use crate::binres::{pack, PackError, PackOptions};
use crate::diagnostics::Diagnostics;
use crate::elf::ElfObject;
use crate::object_file::ObjectError;


const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];


#[derive(Debug)]
pub enum InputError {
    Io(std::io::Error),
    Format(FormatError),
    Object(ObjectError),
    Pack(PackError),
    RecordDatabase,
}
impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)
                => write!(f, "I/O error: {}", e),
            Self::Format(e)
                => write!(f, "{}", e),
            Self::Object(e)
                => write!(f, "{}", e),
            Self::Pack(e)
                => write!(f, "{}", e),
            Self::RecordDatabase
                => write!(f, "record databases carry no resources"),
        }
    }
}
impl std::error::Error for InputError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Format(e) => Some(e),
            Self::Object(e) => Some(e),
            Self::Pack(e) => Some(e),
            Self::RecordDatabase => None,
        }
    }
}
impl From<std::io::Error> for InputError {
    fn from(value: std::io::Error) -> Self { Self::Io(value) }
}
impl From<FormatError> for InputError {
    fn from(value: FormatError) -> Self { Self::Format(value) }
}
impl From<ObjectError> for InputError {
    fn from(value: ObjectError) -> Self { Self::Object(value) }
}
impl From<PackError> for InputError {
    fn from(value: PackError) -> Self { Self::Pack(value) }
}


/// Recognizes raw resource files named like `tFRM03e8.bin` or `Tbmp1000.grc`.
pub fn parse_raw_resource_name(file_name: &str) -> Option<ResourceKey> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if !extension.eq_ignore_ascii_case("bin") && !extension.eq_ignore_ascii_case("grc") {
        return None;
    }
    let stem = stem.as_bytes();
    if stem.len() != 8 || !stem[4..8].iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let kind = Tag::new(stem[0..4].try_into().unwrap());
    // hex digits are ASCII
    let id_str = std::str::from_utf8(&stem[4..8]).ok()?;
    let id = u16::from_str_radix(id_str, 16).ok()?;
    Some(ResourceKey::new(kind, id))
}


/// Collects resources; the first file to supply a key keeps it.
#[derive(Debug)]
pub struct Assembler {
    database: ResourceDatabase,
    origins: BTreeMap<ResourceKey, String>,
}
impl Assembler {
    pub fn new() -> Self {
        Self {
            database: ResourceDatabase::new(Header::default()),
            origins: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize { self.database.len() }
    pub fn is_empty(&self) -> bool { self.database.is_empty() }

    /// Adds a resource unless one with the same key is already present. Returns whether it was
    /// added.
    pub fn add_resource(
        &mut self,
        key: ResourceKey,
        data: Datablock,
        origin: &str,
        diagnostics: &mut Diagnostics,
    ) -> bool {
        if let Some(first_origin) = self.origins.get(&key) {
            diagnostics.warn(origin, format!("resource {} already obtained from {}; ignoring this one", key, first_origin));
            return false;
        }
        self.database.insert(key, data);
        self.origins.insert(key, origin.to_owned());
        true
    }

    /// Adds every resource of `database`.
    pub fn add_database(&mut self, database: ResourceDatabase, origin: &str, diagnostics: &mut Diagnostics) {
        for (key, data) in database.into_entries() {
            self.add_resource(key, data, origin, diagnostics);
        }
    }

    /// Reads one input file and adds its resources.
    ///
    /// Raw resource files are recognized by name, linked executables by their magic number;
    /// anything else must be a resource database.
    pub fn add_file(
        &mut self,
        path: &Path,
        options: &PackOptions,
        diagnostics: &mut Diagnostics,
    ) -> Result<(), InputError> {
        let origin = path.display().to_string();
        let bytes = std::fs::read(path)?;

        let raw_key = path.file_name()
            .and_then(|n| n.to_str())
            .and_then(parse_raw_resource_name);
        if let Some(key) = raw_key {
            debug!("{}: raw resource {} ({} bytes)", origin, key, bytes.len());
            self.add_resource(key, Datablock::from(bytes), &origin, diagnostics);
            return Ok(());
        }

        if bytes.starts_with(&ELF_MAGIC) {
            let object = ElfObject::parse(&bytes)?;
            let packed = pack(&object, options, diagnostics, &origin)?;
            info!("{}: packed into {} resources", origin, packed.len());
            self.add_database(packed, &origin, diagnostics);
            return Ok(());
        }

        match AnyDatabase::parse(&Datablock::from(bytes))? {
            AnyDatabase::Resource(database) => {
                debug!("{}: resource database with {} resources", origin, database.len());
                self.add_database(database, &origin, diagnostics);
                Ok(())
            },
            AnyDatabase::Record(_) => Err(InputError::RecordDatabase),
        }
    }

    /// The collected resources under the given header.
    pub fn finish(self, header: Header) -> ResourceDatabase {
        let mut database = ResourceDatabase::new(header);
        for (key, data) in self.database.into_entries() {
            database.insert(key, data);
        }
        database
    }
}
impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}


#[cfg(test)]
mod tests {
    use super::{parse_raw_resource_name, Assembler, InputError};
    use crate::binres::PackOptions;
    use crate::diagnostics::Diagnostics;
    use palmdb::{
        Datablock, DatabaseName, Header, Record, RecordDatabase, RecordId, ResourceDatabase,
        ResourceKey, Tag,
    };
    use tracing_test::traced_test;

    fn key(kind: &[u8; 4], id: u16) -> ResourceKey {
        ResourceKey::new(Tag::new(*kind), id)
    }

    #[test]
    fn test_raw_names() {
        assert_eq!(parse_raw_resource_name("tFRM03e8.bin"), Some(key(b"tFRM", 1000)));
        assert_eq!(parse_raw_resource_name("Tbmp1000.GRC"), Some(key(b"Tbmp", 0x1000)));
        assert_eq!(parse_raw_resource_name("tFRM03e8.prc"), None);
        assert_eq!(parse_raw_resource_name("tFRM3e8.bin"), None);
        assert_eq!(parse_raw_resource_name("tFRM03g8.bin"), None);
        assert_eq!(parse_raw_resource_name("hello"), None);
    }

    #[test]
    #[traced_test]
    fn test_first_supplier_wins() {
        let mut first = ResourceDatabase::new(Header::default());
        first.insert(key(b"data", 0), Datablock::from([1u8, 2, 3]));
        first.insert(key(b"code", 1), Datablock::from([0x4E, 0x75]));
        let mut second = ResourceDatabase::new(Header::default());
        second.insert(key(b"data", 0), Datablock::from([9u8, 9]));
        second.insert(key(b"tSTR", 1000), Datablock::from(*b"hi\0"));

        let mut diagnostics = Diagnostics::new();
        let mut assembler = Assembler::new();
        assembler.add_database(first, "one.prc", &mut diagnostics);
        assembler.add_database(second, "two.prc", &mut diagnostics);
        assert_eq!(assembler.len(), 3);
        assert_eq!(diagnostics.warning_count(), 1);
        assert!(!diagnostics.has_errors());
        assert!(logs_contain("data #0 already obtained from one.prc"));

        let header = Header::new(DatabaseName::from("Merged"), Tag::new(*b"appl"), Tag::new(*b"Mrgd"));
        let database = assembler.finish(header);
        assert!(database.header.is_resource());
        assert_eq!(database.get(&key(b"data", 0)).unwrap().contents(), &[1, 2, 3]);
        assert_eq!(database.get(&key(b"tSTR", 1000)).unwrap().contents(), b"hi\0");
    }

    #[test]
    #[traced_test]
    fn test_files() {
        let dir = tempfile::tempdir().unwrap();

        let raw_path = dir.path().join("data0000.bin");
        std::fs::write(&raw_path, [0xAA, 0xBB]).unwrap();

        let mut prc = ResourceDatabase::new(Header::default());
        prc.insert(key(b"data", 0), Datablock::from([0xCCu8]));
        prc.insert(key(b"MBAR", 1000), Datablock::from([0xDDu8]));
        let prc_path = dir.path().join("menus.prc");
        std::fs::write(&prc_path, prc.serialize().unwrap()).unwrap();

        let mut pdb = RecordDatabase::new(Header::default());
        pdb.insert(RecordId::from_base_type(1).unwrap(), Record::new(Datablock::from([0u8])));
        let pdb_path = dir.path().join("records.pdb");
        std::fs::write(&pdb_path, pdb.serialize().unwrap()).unwrap();

        let options = PackOptions::default();
        let mut diagnostics = Diagnostics::new();
        let mut assembler = Assembler::new();
        assembler.add_file(&raw_path, &options, &mut diagnostics).unwrap();
        assembler.add_file(&prc_path, &options, &mut diagnostics).unwrap();
        assert!(matches!(
            assembler.add_file(&pdb_path, &options, &mut diagnostics),
            Err(InputError::RecordDatabase),
        ));
        assert!(matches!(
            assembler.add_file(&dir.path().join("missing.prc"), &options, &mut diagnostics),
            Err(InputError::Io(_)),
        ));

        assert_eq!(diagnostics.warning_count(), 1);
        let database = assembler.finish(Header::default());
        assert_eq!(database.len(), 2);
        assert_eq!(database.get(&key(b"data", 0)).unwrap().contents(), &[0xAA, 0xBB]);
        assert_eq!(database.get(&key(b"MBAR", 1000)).unwrap().contents(), &[0xDD]);
    }
}
