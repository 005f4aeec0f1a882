//! Core config, error, and wire types for Avatar Voice.

pub mod config;
pub mod error;
pub mod protocol;
