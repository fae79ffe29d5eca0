//! Portfolio content API with on-the-fly response translation.
//!
//! Content is authored once in the source language. A GET under the API
//! prefix carrying `?lang=xx` has its JSON body translated field by field
//! before it leaves the server: identifiers, URLs and file names are kept,
//! prose is sent through the translation engine, results are cached, and
//! any failure degrades to the original text.

pub mod config;
pub mod content;
pub mod error;
pub mod i18n;
pub mod middleware;
pub mod retry;
pub mod routes;
pub mod security;
pub mod state;
pub mod translation;
