mod entry;
mod manifest;

pub use entry::{unix_now, Entry, EntryKind, EntryState, Metadata};
pub use manifest::Manifest;
