//! # System Interaction Layer
//!
//! The boundary between charty's logic and the operating system.
//!
//! ## Modules
//!
//! - **`executor`**: runs shell command lines in a directory, capturing their combined
//!   output while optionally mirroring it to the console.
//! - **`fs`**: recursive tree copy used for `static/` files and template export.

pub mod executor;
pub mod fs;
