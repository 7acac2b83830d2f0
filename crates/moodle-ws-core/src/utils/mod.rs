//! Shared helpers.

pub mod form;
pub mod http;
pub mod mimetype;
