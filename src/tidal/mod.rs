//! TIDAL API client module

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod parser;

pub use auth::{AuthGate, TidalSession};
pub use client::{CatalogApi, Params, TidalClient};
pub use error::{FetchError, LoginError};
pub use models::*;
pub use parser::ResponseParser;
