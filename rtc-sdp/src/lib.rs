#![warn(rust_2018_idioms)]

pub mod description;

pub use description::common::{Address, Attribute, Bandwidth, ConnectionInformation};
pub use description::media::{MediaDescription, MediaName, RangedPort};
pub use description::session::{Origin, SessionDescription, TimeDescription};
