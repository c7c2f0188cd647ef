// src/cli/handlers/mod.rs

// One module per CLI command.

pub mod commons;
pub mod package;
pub mod resume;
pub mod start;
pub mod template;
