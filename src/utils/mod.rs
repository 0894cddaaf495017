//! Utility functions

mod cache_name;
pub mod cover_art;

pub use cache_name::cover_file_name;
