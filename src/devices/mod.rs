//! Device implementations

pub mod iwr1443;
