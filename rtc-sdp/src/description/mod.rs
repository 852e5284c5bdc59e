
pub mod common;
pub mod media;
pub mod session;
