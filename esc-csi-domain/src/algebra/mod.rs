mod bytes;
mod format;
mod string;

pub use bytes::*;
pub use format::*;
pub use string::*;
