mod read;
mod write;

pub use read::ReadBuffer;
pub use write::WriteBuffer;
