//! grid: authenticated-session cache and scenario helpers for GRiD end-to-end suites.
//!
//! Logging into GRiD is slow and may need a human at a certificate prompt, so
//! a run logs in once per [`CacheKey`] and every worker restores the persisted
//! [`StorageState`](grid_protocol::StorageState) instead.
//!
//! ```ignore
//! use grid::{RunConfig, SessionCacheProvider};
//!
//! let provider = SessionCacheProvider::new(RunConfig::from_env()?, launcher);
//! let artifact = provider.acquire_for_worker(worker_index).await?;
//! let session = provider.open_session(&artifact).await?;
//! ```
//!
//! The browser engine sits behind [`BrowserLauncher`] and [`BrowserSession`].
//! [`testing`] has in-process doubles for both.

pub mod browser;
pub mod config;
pub mod error;
pub mod intercept;
pub mod key;
pub mod locator;
pub mod login;
pub mod provider;
pub mod sorting;
pub mod store;
pub mod testing;
pub mod totp;

pub use browser::{BrowserError, BrowserLauncher, BrowserResult, BrowserSession};
pub use config::{AuthMode, RunConfig};
pub use error::{Error, LoginStage, Result};
pub use intercept::{BodyInterceptor, CapturedRequest, RouteMatcher, expect_fields};
pub use key::{CacheKey, KeyBinding, WorkerId};
pub use locator::{Locator, TextMatch, data_layer_checkbox, saved_aoi_checkbox};
pub use login::{Credentials, LoginPlan};
pub use provider::{Provenance, SessionArtifact, SessionCacheProvider};
pub use sorting::{SortDirection, SortKind, is_sorted};
pub use store::{ArtifactLocation, FsArtifactStore, MemoryArtifactStore, SessionArtifactStore};
pub use totp::{Totp, compute_totp};
