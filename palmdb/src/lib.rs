pub mod database;
pub mod datablock;
pub mod directory;
pub mod error;
pub mod header;
pub mod part_int;
mod read;
pub mod tag;
pub mod time;
mod write;


pub use crate::database::{Database, RecordDatabase, ResourceDatabase};
pub use crate::datablock::Datablock;
pub use crate::directory::{Record, RecordAttributes, RecordId, ResourceKey};
pub use crate::error::FormatError;
pub use crate::header::{DatabaseAttributes, Header};
pub use crate::read::AnyDatabase;
pub use crate::tag::{DatabaseName, Tag};
pub use crate::time::PalmTime;
