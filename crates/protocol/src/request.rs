//! Types for requests observed through network interception.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A request paused by a route handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterceptedRequest {
	pub method: String,
	pub url: String,
	#[serde(default)]
	pub headers: BTreeMap<String, String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub post_data: Option<String>,
}

impl InterceptedRequest {
	pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
		Self {
			method: method.into(),
			url: url.into(),
			headers: BTreeMap::new(),
			post_data: None,
		}
	}

	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());
		self
	}

	pub fn with_post_data(mut self, body: impl Into<String>) -> Self {
		self.post_data = Some(body.into());
		self
	}
}

/// What the route handler tells the engine to do with a paused request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RouteDecision {
	/// Send the request on. `post_data: None` keeps the original body.
	#[serde(rename_all = "camelCase")]
	Continue {
		#[serde(default, skip_serializing_if = "Option::is_none")]
		post_data: Option<String>,
	},
	/// Answer locally without reaching the server.
	#[serde(rename_all = "camelCase")]
	Fulfill {
		status: u16,
		content_type: String,
		body: String,
	},
	Abort,
}

impl RouteDecision {
	/// Continue with the request untouched.
	pub fn passthrough() -> Self {
		Self::Continue { post_data: None }
	}
}
