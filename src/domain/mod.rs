pub mod device;
pub mod event;
pub mod node;

pub use device::*;
pub use event::*;
pub use node::*;
