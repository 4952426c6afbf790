//! Utility functions for Fiber Core
//!
//! This module provides common utility functions used across the codebase.

mod markdown;

pub use markdown::{render_markdown, strip_markup};
