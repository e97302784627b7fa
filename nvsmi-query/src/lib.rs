//! Typed access to `nvidia-smi` query output.
//!
//! The GPU and compute-process listings are parsed positionally into
//! [`Gpu`] and [`GpuProcess`] records. GPUs can be filtered by availability
//! thresholds and sorted, and processes are tied back to GPU indices through
//! their UUID.
//!
//! # Example
//!
//! ```no_run
//! use nvsmi_query::{GpuFilter, GpuQuery, Nvsmi, SortKey};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let nvsmi = Nvsmi::locate()?;
//!
//!     let query = GpuQuery {
//!         filter: GpuFilter {
//!             mem_free_min: 4096.0,
//!             ..Default::default()
//!         },
//!         sort: SortKey::MemUtil,
//!         limit: Some(2),
//!     };
//!     for gpu in nvsmi.available_gpus(&query)? {
//!         println!("{}", gpu);
//!     }
//!
//!     for proc in nvsmi.processes()? {
//!         println!("{}", proc);
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod correlate;
pub mod error;
pub mod parser;
pub mod query;
pub mod record;
pub mod source;

// Re-export main components for easy access
pub use client::Nvsmi;
pub use correlate::{enrich_processes, CorrelationMap};
pub use error::{QueryError, Result};
pub use parser::{parse_gpu_line, parse_gpus, parse_process_line, parse_processes, to_f64_or_nan};
pub use query::{filter_available, sort_and_limit, GpuFilter, GpuQuery, SortKey};
pub use record::{Gpu, GpuFields, GpuProcess, UNKNOWN_GPU_INDEX};
pub use source::{NvidiaSmi, TelemetrySource, NVIDIA_SMI};

/// Version of the nvsmi-query library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
