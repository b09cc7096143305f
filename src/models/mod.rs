//! Data models for the Cinescout backend.
//!
//! Catalog models mirror the TMDB wire format; everything the backend serves itself is camelCase.

mod movie;
mod trending;

pub use movie::*;
pub use trending::*;

#[cfg(test)]
pub(crate) use movie::test_movie;
