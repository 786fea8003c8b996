use std::collections::BTreeMap;
use std::collections::btree_map;

use crate::datablock::Datablock;
use crate::directory::{DirectoryKind, Records, Resources};
use crate::header::{DatabaseAttributes, Header};


/// The padding traditionally found between the directory and the first block.
const CONVENTIONAL_GAP: [u8; 2] = [0x00, 0x00];


/// A complete database: header, optional side blocks and the directory's entries in key order.
#[derive(Clone, Debug, PartialEq)]
pub struct Database<D: DirectoryKind> {
    pub header: Header,
    pub app_info: Option<Datablock>,
    pub sort_info: Option<Datablock>,

    /// Whatever lies between the directory and the first block; kept for round-tripping.
    pub gap: Datablock,

    pub(crate) entries: BTreeMap<D::Key, D::Value>,
}

pub type ResourceDatabase = Database<Resources>;
pub type RecordDatabase = Database<Records>;

impl<D: DirectoryKind> Database<D> {
    pub fn new(mut header: Header) -> Self {
        header.attributes.set(DatabaseAttributes::RESOURCE, D::IS_RESOURCE);
        Self {
            header,
            app_info: None,
            sort_info: None,
            gap: Datablock::from(CONVENTIONAL_GAP),
            entries: BTreeMap::new(),
        }
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn get(&self, key: &D::Key) -> Option<&D::Value> {
        self.entries.get(key)
    }

    pub fn get_mut(&mut self, key: &D::Key) -> Option<&mut D::Value> {
        self.entries.get_mut(key)
    }

    pub fn contains_key(&self, key: &D::Key) -> bool {
        self.entries.contains_key(key)
    }

    /// Inserts or replaces an entry, returning the value it replaced.
    pub fn insert(&mut self, key: D::Key, value: D::Value) -> Option<D::Value> {
        self.entries.insert(key, value)
    }

    /// Inserts an entry only if its key is not yet taken; returns whether it was inserted.
    pub fn insert_new(&mut self, key: D::Key, value: D::Value) -> bool {
        match self.entries.entry(key) {
            btree_map::Entry::Vacant(vacant) => {
                vacant.insert(value);
                true
            },
            btree_map::Entry::Occupied(_) => false,
        }
    }

    pub fn remove(&mut self, key: &D::Key) -> Option<D::Value> {
        self.entries.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &D::Key> {
        self.entries.keys()
    }

    /// Entries in key order, which is also the order in which they are written.
    pub fn iter(&self) -> impl Iterator<Item = (&D::Key, &D::Value)> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> impl Iterator<Item = (D::Key, D::Value)> {
        self.entries.into_iter()
    }
}


#[cfg(test)]
mod tests {
    use super::ResourceDatabase;
    use crate::datablock::Datablock;
    use crate::directory::ResourceKey;
    use crate::header::{DatabaseAttributes, Header};
    use crate::tag::Tag;

    #[test]
    fn test_new_database_sets_resource_bit() {
        let db = ResourceDatabase::new(Header::default());
        assert!(db.header.attributes.contains(DatabaseAttributes::RESOURCE));
        assert_eq!(db.gap.len(), 2);
    }

    #[test]
    fn test_insert_new_keeps_first() {
        let mut db = ResourceDatabase::new(Header::default());
        let key = ResourceKey::new(Tag::new(*b"data"), 0);
        assert!(db.insert_new(key, Datablock::from(vec![1])));
        assert!(!db.insert_new(key, Datablock::from(vec![2])));
        assert_eq!(db.get(&key), Some(&Datablock::from(vec![1])));
    }

    #[test]
    fn test_key_order() {
        let mut db = ResourceDatabase::new(Header::default());
        db.insert(ResourceKey::new(Tag::new(*b"data"), 0), Datablock::empty());
        db.insert(ResourceKey::new(Tag::new(*b"code"), 1), Datablock::empty());
        db.insert(ResourceKey::new(Tag::new(*b"code"), 0), Datablock::empty());

        let keys: Vec<String> = db.keys().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["code #0", "code #1", "data #0"]);
    }
}
