pub mod attributes;
pub mod spec;

pub use attributes::*;
pub use spec::*;
