// src/core/mod.rs

pub mod acquire;
pub mod chart;
pub mod package;
pub mod paths;
pub mod renderer;
pub mod report;
pub mod runner;
pub mod settings;
pub mod values;
