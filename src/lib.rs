//! Image gallery that stores uploads in an object store and annotates them
//! with an AI-generated title and description.

pub mod config;
pub mod describe;
pub mod error;
pub mod gallery;
pub mod pages;
pub mod server;
pub mod storage;

pub use config::Config;
pub use gallery::GalleryService;
pub use server::{create_router, AppState};
