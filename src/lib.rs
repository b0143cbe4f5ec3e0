//! Pezzottify Fetcher Library
//!
//! Search resolution and download orchestration over a single automation
//! session. The modules are exposed for the `fetcher` binary and for
//! integration tests.

pub mod automation;
pub mod cli_style;
pub mod config;
pub mod download;
pub mod error;
pub mod metrics;
pub mod search;
pub mod service;

// Re-export commonly used types for convenience
pub use automation::{AutomationDriver, FastLookup};
pub use config::{AppConfig, CliConfig, FileConfig};
pub use download::{DownloadRequest, DownloadSetting, JobStatus, JobView};
pub use error::FetchError;
pub use search::{SearchType, SongRef};
pub use service::FetchService;
