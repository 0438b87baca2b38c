pub mod config;
pub mod context;
pub mod gallery_id;
pub mod logging;
pub mod retry;
