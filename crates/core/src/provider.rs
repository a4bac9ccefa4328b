//! Worker-scoped authenticated-session cache.
//!
//! [`SessionCacheProvider`] hands every worker a persisted login for its
//! [`CacheKey`]. The first request for a key either restores the stored
//! artifact or logs in once through a throwaway browsing session; concurrent
//! requests for the same key wait on that single population and share its
//! outcome for the rest of the run.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use grid_protocol::StorageState;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::browser::{BrowserLauncher, BrowserSession};
use crate::config::RunConfig;
use crate::error::{Error, LoginStage, Result};
use crate::key::{CacheKey, WorkerId};
use crate::login::{Credentials, LoginFlow, LoginPlan};
use crate::store::{ArtifactLocation, FsArtifactStore, SessionArtifactStore};

/// How an artifact came to be available in this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provenance {
	/// Loaded from the store; no login happened.
	Restored,
	/// Produced by a login performed in this run.
	LoggedIn,
}

/// Handle to a persisted authenticated session.
///
/// Cheap to clone. Every handle for one key in one run shares the same state.
#[derive(Debug, Clone)]
pub struct SessionArtifact {
	key: CacheKey,
	location: ArtifactLocation,
	state: Arc<StorageState>,
	provenance: Provenance,
}

impl SessionArtifact {
	pub fn key(&self) -> &CacheKey {
		&self.key
	}

	pub fn location(&self) -> &ArtifactLocation {
		&self.location
	}

	/// Artifact file path, for engines that take a storage-state file.
	pub fn path(&self) -> Option<&Path> {
		self.location.path()
	}

	pub fn storage_state(&self) -> &StorageState {
		&self.state
	}

	pub fn provenance(&self) -> Provenance {
		self.provenance
	}

	/// True when both handles point at the same loaded state.
	pub fn same_as(&self, other: &SessionArtifact) -> bool {
		self.key == other.key && Arc::ptr_eq(&self.state, &other.state)
	}
}

type Slot = Arc<OnceCell<Result<SessionArtifact>>>;

/// Key-scoped single-flight cache of authenticated sessions.
pub struct SessionCacheProvider {
	config: Arc<RunConfig>,
	plan: LoginPlan,
	launcher: Arc<dyn BrowserLauncher>,
	store: Arc<dyn SessionArtifactStore>,
	slots: DashMap<CacheKey, Slot>,
}

impl SessionCacheProvider {
	/// Creates a provider that persists artifacts under `config.auth_dir`.
	pub fn new(config: RunConfig, launcher: Arc<dyn BrowserLauncher>) -> Self {
		let store = Arc::new(FsArtifactStore::new(config.auth_dir.clone()));
		Self {
			config: Arc::new(config),
			plan: LoginPlan::default(),
			launcher,
			store,
			slots: DashMap::new(),
		}
	}

	pub fn with_store(mut self, store: Arc<dyn SessionArtifactStore>) -> Self {
		self.store = store;
		self
	}

	pub fn with_plan(mut self, plan: LoginPlan) -> Self {
		self.plan = plan;
		self
	}

	pub fn config(&self) -> &RunConfig {
		&self.config
	}

	pub fn store(&self) -> &Arc<dyn SessionArtifactStore> {
		&self.store
	}

	/// Cache key `worker` uses under the configured key binding.
	pub fn bind_session(&self, worker: WorkerId) -> Result<CacheKey> {
		self.config.key_binding.key_for(worker, &self.config.grid)
	}

	/// Returns the artifact for `key`, logging in at most once per run.
	///
	/// Callers racing on an unpopulated key all receive the first caller's
	/// outcome, including its error.
	pub async fn acquire_session(&self, key: &CacheKey) -> Result<SessionArtifact> {
		let slot = self.slots.entry(key.clone()).or_default().clone();
		if !slot.initialized() {
			debug!(target = "grid.session", key = %key, "session not yet populated in this run");
		}
		slot.get_or_init(|| self.populate(key)).await.clone()
	}

	/// [`bind_session`](Self::bind_session) followed by [`acquire_session`](Self::acquire_session).
	pub async fn acquire_for_worker(&self, worker: WorkerId) -> Result<SessionArtifact> {
		let key = self.bind_session(worker)?;
		debug!(target = "grid.session", worker, key = %key, "worker bound to cache key");
		self.acquire_session(&key).await
	}

	/// Deletes the stored artifact for `key` and forgets the in-run result.
	///
	/// A population already in flight is not cancelled and may still write
	/// its artifact. Returns whether a stored artifact existed.
	pub fn invalidate(&self, key: &CacheKey) -> Result<bool> {
		self.slots.remove(key);
		let removed = self.store.remove(key)?;
		info!(target = "grid.session", key = %key, removed, "session invalidated");
		Ok(removed)
	}

	/// Opens a browsing session restored from `artifact`.
	pub async fn open_session(&self, artifact: &SessionArtifact) -> Result<Box<dyn BrowserSession>> {
		self.launcher
			.new_session(Some(artifact.storage_state()))
			.await
			.map_err(|e| Error::Browser {
				key: artifact.key.clone(),
				stage: LoginStage::OpenSession,
				message: e.to_string(),
			})
	}

	async fn populate(&self, key: &CacheKey) -> Result<SessionArtifact> {
		if let Some(state) = self.store.load(key)? {
			let location = self.store.location(key);
			info!(target = "grid.session", key = %key, location = %location, "restored stored session");
			return Ok(SessionArtifact {
				key: key.clone(),
				location,
				state: Arc::new(state),
				provenance: Provenance::Restored,
			});
		}

		let credentials = Credentials::from_config(&self.config, key)?;
		info!(target = "grid.session", key = %key, mode = ?self.config.mode, "no stored session; logging in");
		let started = Instant::now();

		let session = self.launcher.new_session(None).await.map_err(|e| Error::Browser {
			key: key.clone(),
			stage: LoginStage::OpenSession,
			message: e.to_string(),
		})?;
		let outcome = self.login(key, &*session, &credentials).await;
		if let Err(e) = session.close().await {
			warn!(target = "grid.session", key = %key, error = %e, "failed to close login session");
		}
		let state = match outcome {
			Ok(state) => state,
			Err(e) => {
				warn!(target = "grid.session", key = %key, stage = ?e.stage(), error = %e, "login failed");
				return Err(e);
			}
		};

		let location = self.store.save(key, &state)?;
		info!(
			target = "grid.session",
			key = %key,
			location = %location,
			cookies = state.cookies.len(),
			elapsed_ms = started.elapsed().as_millis() as u64,
			"logged in and stored session"
		);
		Ok(SessionArtifact {
			key: key.clone(),
			location,
			state: Arc::new(state),
			provenance: Provenance::LoggedIn,
		})
	}

	async fn login(&self, key: &CacheKey, session: &dyn BrowserSession, credentials: &Credentials) -> Result<StorageState> {
		LoginFlow {
			plan: &self.plan,
			config: &self.config,
			key,
		}
		.run(session, credentials)
		.await?;

		session.storage_state().await.map_err(|e| Error::Browser {
			key: key.clone(),
			stage: LoginStage::Persist,
			message: e.to_string(),
		})
	}
}

impl std::fmt::Debug for SessionCacheProvider {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionCacheProvider")
			.field("grid", &self.config.grid)
			.field("mode", &self.config.mode)
			.field("keys", &self.slots.len())
			.finish()
	}
}
