pub mod error;
mod frame;
pub mod manager;

pub(crate) mod buffer_list;

pub use error::BufferError;
pub use frame::Buffer;
pub use manager::{BufferHandle, BufferManager};
