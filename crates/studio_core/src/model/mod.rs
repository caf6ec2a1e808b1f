//! Domain model for site content and blog posts.
//!
//! # Responsibility
//! - Define the shapes shared by both storage backends.
//! - Keep validation and normalization rules in one place so callers cannot
//!   tell the backends apart by return shape.

pub mod blog_post;
pub mod content;
pub mod url;
