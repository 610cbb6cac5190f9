pub mod parser;

pub use parser::{ArchSlice, MachOFile};
