//! Utility functions for page naming and timestamp display.

pub mod date;
pub mod naming;

pub use date::{display_offset, format_timestamp};
pub use naming::{is_valid_page_key, sanitize_page_name, validate_page_name};
