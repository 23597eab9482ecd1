//! Core types, config, errors, and prompt building for GiftGen.

pub mod config;
pub mod error;
pub mod prompt;
pub mod types;
