pub mod commands;
pub mod config;
pub mod utils;

// Re-export commonly used types
pub use config::{LsConfig, NvsmiConfig};
pub use utils::format::OutputFormat;
