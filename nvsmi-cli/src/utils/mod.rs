pub mod format;
pub mod gpu_selector;
