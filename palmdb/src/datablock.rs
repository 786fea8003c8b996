//! Shared byte buffers.
//!
//! A [`Datablock`] is a view (offset and length) onto a reference-counted backing array. Cloning
//! and in-bounds slicing are cheap because the backing array is shared; the first write through
//! [`Datablock::writable_contents`] on a shared block gives that block its own private copy.


use std::fmt;
use std::rc::Rc;


#[derive(Clone)]
pub struct Datablock {
    storage: Rc<Vec<u8>>,
    offset: usize,
    length: usize,
}
impl Datablock {
    /// Allocates a zero-filled block.
    pub fn new(size: usize) -> Self {
        Self {
            storage: Rc::new(vec![0u8; size]),
            offset: 0,
            length: size,
        }
    }

    pub fn empty() -> Self {
        Self::new(0)
    }

    pub fn len(&self) -> usize { self.length }
    pub fn is_empty(&self) -> bool { self.length == 0 }

    pub fn contents(&self) -> &[u8] {
        &self.storage[self.offset..self.offset + self.length]
    }

    /// Returns the contents for writing, detaching from any other block sharing the storage.
    pub fn writable_contents(&mut self) -> &mut [u8] {
        if Rc::strong_count(&self.storage) > 1 || Rc::weak_count(&self.storage) > 0 {
            let private = self.contents().to_vec();
            self.storage = Rc::new(private);
            self.offset = 0;
        }

        // the storage is unique at this point, so this never clones
        let storage = Rc::make_mut(&mut self.storage);
        &mut storage[self.offset..self.offset + self.length]
    }

    /// Returns a block covering `length` bytes starting at `offset`.
    ///
    /// If the range lies within this block, the result shares its storage. Otherwise, the result
    /// is a fresh copy of whatever part of the range exists, padded with zeroes to `length`.
    pub fn slice(&self, offset: usize, length: usize) -> Self {
        let in_bounds = offset
            .checked_add(length)
            .is_some_and(|end| end <= self.length);
        if in_bounds {
            return Self {
                storage: Rc::clone(&self.storage),
                offset: self.offset + offset,
                length,
            };
        }

        let mut padded = vec![0u8; length];
        let existing = self.contents();
        if offset < existing.len() {
            let available = (existing.len() - offset).min(length);
            padded[..available].copy_from_slice(&existing[offset..offset + available]);
        }
        padded.into()
    }

    pub fn shares_storage_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.storage, &other.storage)
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.contents().to_vec()
    }
}
impl Default for Datablock {
    fn default() -> Self {
        Self::empty()
    }
}
impl From<Vec<u8>> for Datablock {
    fn from(value: Vec<u8>) -> Self {
        let length = value.len();
        Self {
            storage: Rc::new(value),
            offset: 0,
            length,
        }
    }
}
impl From<&[u8]> for Datablock {
    fn from(value: &[u8]) -> Self {
        value.to_vec().into()
    }
}
impl<const N: usize> From<[u8; N]> for Datablock {
    fn from(value: [u8; N]) -> Self {
        value.to_vec().into()
    }
}
impl AsRef<[u8]> for Datablock {
    fn as_ref(&self) -> &[u8] {
        self.contents()
    }
}
impl PartialEq for Datablock {
    fn eq(&self, other: &Self) -> bool {
        self.contents() == other.contents()
    }
}
impl Eq for Datablock {
}
impl fmt::Debug for Datablock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW_BYTES: usize = 16;

        write!(f, "Datablock({} bytes:", self.length)?;
        for b in self.contents().iter().take(PREVIEW_BYTES) {
            write!(f, " {:02X}", b)?;
        }
        if self.length > PREVIEW_BYTES {
            write!(f, " ...")?;
        }
        write!(f, ")")
    }
}
