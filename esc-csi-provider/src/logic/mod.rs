pub mod credentials;
pub mod mount;
