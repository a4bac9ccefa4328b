//! Durable key-to-artifact storage.
//!
//! [`FsArtifactStore`] keeps one `<key>-cookies.json` file per cache key and
//! publishes writes with a rename so readers see a complete file or none.
//! [`MemoryArtifactStore`] backs provider tests without touching disk.

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use grid_protocol::StorageState;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::key::CacheKey;

/// Where an artifact lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLocation {
	File(PathBuf),
	Memory,
}

impl ArtifactLocation {
	/// Filesystem path, for handing to engines that restore from a file.
	pub fn path(&self) -> Option<&Path> {
		match self {
			ArtifactLocation::File(path) => Some(path),
			ArtifactLocation::Memory => None,
		}
	}
}

impl fmt::Display for ArtifactLocation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ArtifactLocation::File(path) => write!(f, "{}", path.display()),
			ArtifactLocation::Memory => f.write_str("<memory>"),
		}
	}
}

/// Key-to-blob storage for session artifacts.
pub trait SessionArtifactStore: Send + Sync {
	/// Where the artifact for `key` is (or would be) stored.
	fn location(&self, key: &CacheKey) -> ArtifactLocation;

	/// Loads the artifact for `key`.
	///
	/// Returns `Ok(None)` when nothing is stored and
	/// [`Error::StaleOrCorruptArtifact`] when something is stored but unreadable.
	fn load(&self, key: &CacheKey) -> Result<Option<StorageState>>;

	/// Stores `state` under `key`, replacing any previous artifact whole.
	fn save(&self, key: &CacheKey, state: &StorageState) -> Result<ArtifactLocation>;

	/// Deletes the artifact for `key`. Returns whether one existed.
	fn remove(&self, key: &CacheKey) -> Result<bool>;
}

/// One JSON file per key under a fixed directory.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
	dir: PathBuf,
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

impl FsArtifactStore {
	pub fn new(dir: impl Into<PathBuf>) -> Self {
		Self { dir: dir.into() }
	}

	pub fn dir(&self) -> &Path {
		&self.dir
	}

	pub fn path_for(&self, key: &CacheKey) -> PathBuf {
		self.dir.join(key.artifact_file_name())
	}

	/// Lists keys that have an artifact file on disk.
	pub fn keys(&self) -> Result<Vec<CacheKey>> {
		let entries = match fs::read_dir(&self.dir) {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(e.into()),
		};

		let mut keys = Vec::new();
		for entry in entries {
			let name = entry?.file_name();
			let Some(stem) = name.to_str().and_then(|n| n.strip_suffix("-cookies.json")) else {
				continue;
			};
			if let Ok(key) = CacheKey::new(stem) {
				keys.push(key);
			}
		}
		keys.sort();
		Ok(keys)
	}
}

impl SessionArtifactStore for FsArtifactStore {
	fn location(&self, key: &CacheKey) -> ArtifactLocation {
		ArtifactLocation::File(self.path_for(key))
	}

	fn load(&self, key: &CacheKey) -> Result<Option<StorageState>> {
		let path = self.path_for(key);
		let content = match fs::read_to_string(&path) {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => {
				return Err(Error::StaleOrCorruptArtifact {
					key: key.clone(),
					path,
					reason: e.to_string(),
				});
			}
		};

		StorageState::from_json(&content)
			.map(Some)
			.map_err(|e| Error::StaleOrCorruptArtifact {
				key: key.clone(),
				path,
				reason: e.to_string(),
			})
	}

	fn save(&self, key: &CacheKey, state: &StorageState) -> Result<ArtifactLocation> {
		fs::create_dir_all(&self.dir)?;
		let path = self.path_for(key);
		let tmp = self.dir.join(format!(
			".{}.{}-{}.tmp",
			key.artifact_file_name(),
			std::process::id(),
			TMP_COUNTER.fetch_add(1, Ordering::Relaxed)
		));

		let json = state.to_json_pretty()?;
		if let Err(e) = write_replace(&tmp, &path, json.as_bytes()) {
			let _ = fs::remove_file(&tmp);
			return Err(e.into());
		}

		debug!(target = "grid.store", %key, path = %path.display(), cookies = state.cookies.len(), "artifact written");
		Ok(ArtifactLocation::File(path))
	}

	fn remove(&self, key: &CacheKey) -> Result<bool> {
		match fs::remove_file(self.path_for(key)) {
			Ok(()) => Ok(true),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
			Err(e) => Err(e.into()),
		}
	}
}

/// Writes `bytes` to `tmp` with owner-only permissions, then renames it over `path`.
fn write_replace(tmp: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
	fs::write(tmp, bytes)?;
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		fs::set_permissions(tmp, fs::Permissions::from_mode(0o600))?;
	}
	fs::rename(tmp, path)
}

/// Process-local store holding artifacts as serialized JSON.
#[derive(Debug, Default)]
pub struct MemoryArtifactStore {
	blobs: Mutex<HashMap<CacheKey, String>>,
	writes: AtomicU64,
}

impl MemoryArtifactStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Seeds raw content for `key`, bypassing serialization.
	pub fn insert_raw(&self, key: &CacheKey, content: impl Into<String>) {
		self.blobs.lock().insert(key.clone(), content.into());
	}

	/// Number of successful [`save`](SessionArtifactStore::save) calls.
	pub fn writes(&self) -> u64 {
		self.writes.load(Ordering::SeqCst)
	}

	pub fn contains(&self, key: &CacheKey) -> bool {
		self.blobs.lock().contains_key(key)
	}
}

impl SessionArtifactStore for MemoryArtifactStore {
	fn location(&self, _key: &CacheKey) -> ArtifactLocation {
		ArtifactLocation::Memory
	}

	fn load(&self, key: &CacheKey) -> Result<Option<StorageState>> {
		let Some(content) = self.blobs.lock().get(key).cloned() else {
			return Ok(None);
		};
		StorageState::from_json(&content)
			.map(Some)
			.map_err(|e| Error::StaleOrCorruptArtifact {
				key: key.clone(),
				path: PathBuf::from(format!("memory:{key}")),
				reason: e.to_string(),
			})
	}

	fn save(&self, key: &CacheKey, state: &StorageState) -> Result<ArtifactLocation> {
		let content = serde_json::to_string(state)?;
		self.blobs.lock().insert(key.clone(), content);
		self.writes.fetch_add(1, Ordering::SeqCst);
		Ok(ArtifactLocation::Memory)
	}

	fn remove(&self, key: &CacheKey) -> Result<bool> {
		Ok(self.blobs.lock().remove(key).is_some())
	}
}

#[cfg(test)]
mod tests {
	use grid_protocol::Cookie;
	use tempfile::TempDir;

	use super::*;

	fn key(name: &str) -> CacheKey {
		CacheKey::new(name).unwrap()
	}

	fn state() -> StorageState {
		StorageState::with_cookies(vec![Cookie::new("sessionid", "s3cr3t", "grid.nga.mil")])
	}

	#[test]
	fn fs_missing_artifact_is_none() {
		let tmp = TempDir::new().unwrap();
		let store = FsArtifactStore::new(tmp.path().join(".auth"));
		assert!(store.load(&key("main")).unwrap().is_none());
		assert!(!store.remove(&key("main")).unwrap());
		assert!(store.keys().unwrap().is_empty());
	}

	#[test]
	fn fs_save_then_load() {
		let tmp = TempDir::new().unwrap();
		let store = FsArtifactStore::new(tmp.path().join(".auth"));

		let location = store.save(&key("main"), &state()).unwrap();
		assert_eq!(location.path(), Some(tmp.path().join(".auth/main-cookies.json").as_path()));
		assert_eq!(store.load(&key("main")).unwrap(), Some(state()));
		assert_eq!(store.keys().unwrap(), vec![key("main")]);

		let leftovers: Vec<_> = fs::read_dir(store.dir())
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
			.collect();
		assert!(leftovers.is_empty());
	}

	#[cfg(unix)]
	#[test]
	fn fs_artifact_is_owner_only() {
		use std::os::unix::fs::PermissionsExt;

		let tmp = TempDir::new().unwrap();
		let store = FsArtifactStore::new(tmp.path());
		store.save(&key("main"), &state()).unwrap();
		let mode = fs::metadata(store.path_for(&key("main"))).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}

	#[test]
	fn fs_corrupt_artifact_is_reported() {
		let tmp = TempDir::new().unwrap();
		let store = FsArtifactStore::new(tmp.path());
		fs::write(store.path_for(&key("main")), "{\"cookies\": [").unwrap();

		match store.load(&key("main")) {
			Err(Error::StaleOrCorruptArtifact { path, .. }) => assert_eq!(path, store.path_for(&key("main"))),
			other => panic!("expected StaleOrCorruptArtifact, got {other:?}"),
		}
	}

	#[test]
	fn fs_failed_save_leaves_no_temp_file() {
		let tmp = TempDir::new().unwrap();
		let store = FsArtifactStore::new(tmp.path());
		let target = store.path_for(&key("main"));
		fs::create_dir_all(target.join("occupied")).unwrap();

		assert!(matches!(store.save(&key("main"), &state()), Err(Error::Io(_))));
		let leftovers: Vec<_> = fs::read_dir(store.dir())
			.unwrap()
			.filter_map(|e| e.ok())
			.filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
			.collect();
		assert!(leftovers.is_empty());
	}

	#[test]
	fn fs_remove_deletes_file() {
		let tmp = TempDir::new().unwrap();
		let store = FsArtifactStore::new(tmp.path());
		store.save(&key("main"), &state()).unwrap();
		assert!(store.remove(&key("main")).unwrap());
		assert!(!store.path_for(&key("main")).exists());
	}

	#[test]
	fn memory_store_counts_writes_and_detects_corruption() {
		let store = MemoryArtifactStore::new();
		store.save(&key("a"), &state()).unwrap();
		assert_eq!(store.writes(), 1);
		assert_eq!(store.load(&key("a")).unwrap(), Some(state()));

		store.insert_raw(&key("b"), "not json");
		assert!(matches!(store.load(&key("b")), Err(Error::StaleOrCorruptArtifact { .. })));
		assert!(store.remove(&key("b")).unwrap());
		assert!(!store.contains(&key("b")));
	}
}
