pub mod address;
pub mod memory;
pub mod traits;

pub use address::Address;
pub use memory::{MemoryDataLink, MemoryNetwork};
pub use traits::{DataLink, DataLinkError};
