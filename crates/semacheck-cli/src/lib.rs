//! semacheck CLI library
//!
//! This library exposes internal modules for testing purposes.

pub mod commands;
pub mod config;
pub mod exit;
pub mod render;
