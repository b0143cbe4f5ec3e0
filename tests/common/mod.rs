//! Common test infrastructure
//!
//! Fake collaborators for the automation session and the fast lookup, plus
//! helpers to build a [`FetchService`] over them. Tests should only import
//! from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{bohemian_candidates, TestHarness, BOHEMIAN_QUERY};
//!
//! #[tokio::test]
//! async fn test_search() {
//!     let harness = TestHarness::builder()
//!         .fast_results(bohemian_candidates(5))
//!         .build();
//!     let tracks = harness.service.search(BOHEMIAN_QUERY, Default::default()).await.unwrap();
//!     assert_eq!(tracks.len(), 5);
//! }
//! ```

mod constants;
mod fakes;
mod fixtures;

pub use constants::*;
pub use fakes::{FakeDriver, FakeFastLookup};
pub use fixtures::{
    bohemian_candidates, test_config, wait_for_job, wait_for_terminal, TestHarness,
    TestHarnessBuilder,
};
