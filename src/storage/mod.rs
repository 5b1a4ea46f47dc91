pub mod buffer;
pub mod file;
pub mod page;

pub use buffer::{Buffer, BufferError, BufferHandle, BufferManager};
pub use file::{FileManager, FileManagerError};
pub use page::{Page, PageError};
