pub mod configuration;
pub mod error;
pub mod mount;
pub mod value;

pub use configuration::*;
pub use error::*;
pub use mount::*;
pub use value::*;
