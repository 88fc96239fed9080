pub mod memory;
pub mod traits;
pub mod udp;

pub use memory::{MemoryNetwork, MemoryTransport};
pub use traits::*;
pub use udp::*;
