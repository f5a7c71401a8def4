//! bmmc: Bilibili manga metadata crawler. A batch task runner drives listing, detail, and
//! bonus requests; results are saved as JSON, CSV or XLSX.

pub mod cli;
pub mod config;
pub mod crawler;
pub mod export;
pub mod logging;
pub mod model;
pub mod runner;

// Re-exports for CLI and consumers.
pub use crawler::{CrawlerError, MangaClient, MangaClientBuilder};
pub use export::{ExportError, OutputFormat};
pub use model::{ClassifyFilter, Comic, Dictionaries, PageType};
pub use runner::{
    run_keyed, run_sequence, task, ExecutionError, RunConfig, RunStats, Task, TaskRunner,
};
