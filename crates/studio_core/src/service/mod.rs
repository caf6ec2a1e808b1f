//! Use-case services over the storage backends.
//!
//! # Responsibility
//! - Gate writes on the admin session and request cache invalidation.
//! - Build page-level read models from stored content.
//! - Validate and store admin image uploads.

pub mod content_repository;
pub mod invalidation;
pub mod page_data;
pub mod session;
pub mod site_content;
pub mod upload;
