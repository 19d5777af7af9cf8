//! Configuration module for the PER engine

pub mod constants;

pub use constants::reserved;
