//! `session` commands over the filesystem artifact store.
//!
//! * `key` - cache key and artifact path for a worker
//! * `list` - stored artifacts
//! * `show` - cookie summary of one artifact
//! * `clear` - delete one or all artifacts

use std::time::{SystemTime, UNIX_EPOCH};

use grid::{CacheKey, FsArtifactStore, RunConfig, SessionArtifactStore};
use grid_protocol::StorageState;
use serde_json::{Value, json};
use tracing::info;

use crate::cli::SessionCommand;
use crate::error::Result;

pub fn run(config: &RunConfig, command: &SessionCommand) -> Result<Value> {
	match command {
		SessionCommand::Key { worker } => key(config, *worker),
		SessionCommand::List => list(config),
		SessionCommand::Show { key } => show(config, key.as_deref()),
		SessionCommand::Clear { key, all } => clear(config, key.as_deref(), *all),
	}
}

fn store(config: &RunConfig) -> FsArtifactStore {
	FsArtifactStore::new(config.auth_dir.clone())
}

/// The explicit key, or the one bound to worker 0.
fn resolve_key(config: &RunConfig, key: Option<&str>) -> Result<CacheKey> {
	match key {
		Some(key) => Ok(CacheKey::new(key)?),
		None => Ok(config.key_binding.key_for(0, &config.grid)?),
	}
}

pub fn key(config: &RunConfig, worker: usize) -> Result<Value> {
	let key = config.key_binding.key_for(worker, &config.grid)?;
	let path = store(config).path_for(&key);
	Ok(json!({
		"worker": worker,
		"grid": config.grid,
		"key": key,
		"path": path,
		"exists": path.is_file(),
	}))
}

pub fn list(config: &RunConfig) -> Result<Value> {
	let store = store(config);
	let artifacts: Vec<Value> = store
		.keys()?
		.into_iter()
		.map(|key| {
			let path = store.path_for(&key);
			json!({ "key": key, "path": path })
		})
		.collect();
	Ok(json!({
		"authDir": store.dir(),
		"count": artifacts.len(),
		"artifacts": artifacts,
	}))
}

pub fn show(config: &RunConfig, key: Option<&str>) -> Result<Value> {
	let key = resolve_key(config, key)?;
	let store = store(config);
	let path = store.path_for(&key);
	let Some(state) = store.load(&key)? else {
		return Ok(json!({ "key": key, "path": path, "exists": false }));
	};

	let mut summary = summarize(&state, unix_now());
	if let Value::Object(map) = &mut summary {
		map.insert("key".into(), json!(key));
		map.insert("path".into(), json!(path));
		map.insert("exists".into(), json!(true));
	}
	Ok(summary)
}

pub fn clear(config: &RunConfig, key: Option<&str>, all: bool) -> Result<Value> {
	let store = store(config);
	let keys = if all {
		store.keys()?
	} else {
		vec![resolve_key(config, key)?]
	};

	let mut removed = Vec::new();
	for key in keys {
		if store.remove(&key)? {
			info!(target = "grid_cli.session", key = %key, "artifact removed");
			removed.push(key);
		}
	}
	Ok(json!({
		"authDir": store.dir(),
		"removed": removed,
		"count": removed.len(),
	}))
}

/// Cookie names, domains and expiry; values are never printed.
fn summarize(state: &StorageState, now: i64) -> Value {
	let cookies: Vec<Value> = state
		.cookies
		.iter()
		.map(|cookie| {
			json!({
				"name": cookie.name,
				"domain": cookie.domain,
				"expires": format_expiry(cookie.expires, now),
			})
		})
		.collect();

	let origins: Vec<Value> = state
		.origins
		.iter()
		.map(|origin| {
			let keys: Vec<&str> = origin.local_storage.iter().map(|e| e.name.as_str()).collect();
			json!({ "origin": origin.origin, "localStorage": keys })
		})
		.collect();

	json!({
		"cookies": cookies,
		"cookieCount": state.cookies.len(),
		"origins": origins,
		"originCount": state.origins.len(),
	})
}

fn unix_now() -> i64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}

fn format_expiry(expires: Option<f64>, now: i64) -> String {
	let ts = match expires {
		None => return "session".into(),
		Some(ts) if ts < 0.0 => return "session".into(),
		Some(ts) => ts as i64,
	};

	if ts < now {
		return "expired".into();
	}

	match ts - now {
		d if d < 3600 => format!("{}m", d / 60),
		d if d < 86400 => format!("{}h", d / 3600),
		d => format!("{}d", d / 86400),
	}
}
