//! Output generation for the digest files.
//!
//! # Submodules
//!
//! - [`digest`]: writes the markdown and HTML renditions under date-keyed names
//!
//! Later runs read the markdown files back through [`crate::history`].

pub mod digest;

pub use digest::{cover_path, html_path, markdown_path, write_digest};
