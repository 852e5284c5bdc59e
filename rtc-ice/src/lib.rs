#![warn(rust_2018_idioms)]

pub mod agent;
pub mod attributes;
pub mod candidate;
pub mod credentials;
pub mod gatherer;
pub mod network_type;
pub mod state;
