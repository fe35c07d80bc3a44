//! # Webhook Routes
//!
//! - [`validate`]: `POST /validate`, admission reviews.
//! - [`convert`]: `POST /convert`, conversion reviews.

pub mod convert;
pub mod validate;
