//! Request-body interception.
//!
//! A [`BodyInterceptor`] is registered for a URL glob. For every matching
//! request it parses the JSON body, records it for later assertions, and
//! either forwards the request (optionally with a rewritten body) or answers
//! it locally. Method, headers and URL are never altered.

use std::sync::Arc;

use grid_protocol::{InterceptedRequest, RouteDecision};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Compiled glob pattern for URL matching.
///
/// Invalid patterns fall back to exact matching.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
	pattern: glob::Pattern,
}

impl RouteMatcher {
	pub fn new(pattern: &str) -> Self {
		let pattern = glob::Pattern::new(pattern)
			.or_else(|_| glob::Pattern::new(&glob::Pattern::escape(pattern)))
			.unwrap_or_default();
		Self { pattern }
	}

	pub fn is_match(&self, url: &str) -> bool {
		self.pattern.matches(url)
	}

	pub fn as_str(&self) -> &str {
		self.pattern.as_str()
	}
}

/// A request body observed by an interceptor.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedRequest {
	pub method: String,
	pub url: String,
	/// Parsed JSON body, `None` when the request had no body.
	pub body: Option<Value>,
}

type Transform = Arc<dyn Fn(&mut Value) + Send + Sync>;
type Responder = Arc<dyn Fn(Option<&Value>) -> Value + Send + Sync>;

enum Action {
	Forward(Vec<Transform>),
	Fulfill { status: u16, responder: Responder },
}

/// Captures and optionally rewrites JSON request bodies for one URL pattern.
pub struct BodyInterceptor {
	matcher: RouteMatcher,
	action: Action,
	captured: Mutex<Vec<CapturedRequest>>,
}

impl BodyInterceptor {
	/// Forwards matching requests, recording their bodies.
	pub fn forward(pattern: &str) -> Self {
		Self {
			matcher: RouteMatcher::new(pattern),
			action: Action::Forward(Vec::new()),
			captured: Mutex::new(Vec::new()),
		}
	}

	/// Answers matching requests locally with `status` and a JSON body built
	/// from the parsed request body.
	pub fn fulfill<F>(pattern: &str, status: u16, responder: F) -> Self
	where
		F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
	{
		Self {
			matcher: RouteMatcher::new(pattern),
			action: Action::Fulfill {
				status,
				responder: Arc::new(responder),
			},
			captured: Mutex::new(Vec::new()),
		}
	}

	/// Adds a body rewrite applied before forwarding. No-op for fulfilling interceptors.
	pub fn with_transform<F>(mut self, transform: F) -> Self
	where
		F: Fn(&mut Value) + Send + Sync + 'static,
	{
		if let Action::Forward(transforms) = &mut self.action {
			transforms.push(Arc::new(transform));
		}
		self
	}

	/// Sets a top-level field on forwarded object bodies.
	pub fn set_field(self, name: &str, value: Value) -> Self {
		let name = name.to_string();
		self.with_transform(move |body| {
			if let Value::Object(map) = body {
				map.insert(name.clone(), value.clone());
			}
		})
	}

	pub fn pattern(&self) -> &str {
		self.matcher.as_str()
	}

	pub fn matches(&self, url: &str) -> bool {
		self.matcher.is_match(url)
	}

	/// Decides what to do with `request`.
	///
	/// Non-matching requests pass through untouched. A body that is present
	/// but not JSON fails with [`Error::ApiAssertionMismatch`].
	pub fn handle(&self, request: &InterceptedRequest) -> Result<RouteDecision> {
		if !self.matches(&request.url) {
			return Ok(RouteDecision::passthrough());
		}

		let body = parse_body(request)?;
		self.captured.lock().push(CapturedRequest {
			method: request.method.clone(),
			url: request.url.clone(),
			body: body.clone(),
		});
		debug!(target = "grid.intercept", url = %request.url, method = %request.method, has_body = body.is_some(), "request captured");

		match &self.action {
			Action::Forward(transforms) => match body {
				Some(mut value) if !transforms.is_empty() => {
					for transform in transforms {
						transform(&mut value);
					}
					Ok(RouteDecision::Continue {
						post_data: Some(serde_json::to_string(&value)?),
					})
				}
				_ => Ok(RouteDecision::passthrough()),
			},
			Action::Fulfill { status, responder } => Ok(RouteDecision::Fulfill {
				status: *status,
				content_type: "application/json".to_string(),
				body: responder(body.as_ref()).to_string(),
			}),
		}
	}

	/// Like [`handle`](Self::handle), but never fails: a bad body is logged and
	/// the request continues unchanged.
	///
	/// Engine adapters call this from route callbacks, where an error has
	/// nowhere to go; the failure stays visible through [`captured`](Self::captured).
	pub fn decide(&self, request: &InterceptedRequest) -> RouteDecision {
		self.handle(request).unwrap_or_else(|e| {
			warn!(target = "grid.intercept", error = %e, "interceptor failed; continuing request unchanged");
			RouteDecision::passthrough()
		})
	}

	pub fn captured(&self) -> Vec<CapturedRequest> {
		self.captured.lock().clone()
	}

	/// Body of the most recent matching request.
	pub fn last_body(&self) -> Option<Value> {
		self.captured.lock().last().and_then(|c| c.body.clone())
	}
}

impl std::fmt::Debug for BodyInterceptor {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let mode = match &self.action {
			Action::Forward(t) => format!("forward({} transforms)", t.len()),
			Action::Fulfill { status, .. } => format!("fulfill({status})"),
		};
		f.debug_struct("BodyInterceptor")
			.field("pattern", &self.pattern())
			.field("mode", &mode)
			.field("captured", &self.captured.lock().len())
			.finish()
	}
}

/// Parses a request's body as JSON. `Ok(None)` when there is no body.
pub fn parse_body(request: &InterceptedRequest) -> Result<Option<Value>> {
	match request.post_data.as_deref() {
		None => Ok(None),
		Some(raw) if raw.trim().is_empty() => Ok(None),
		Some(raw) => serde_json::from_str(raw).map(Some).map_err(|e| Error::ApiAssertionMismatch {
			url: request.url.clone(),
			reason: format!("body is not JSON: {e}"),
		}),
	}
}

/// Checks that `body` is an object carrying every field in `fields`.
pub fn expect_fields(url: &str, body: &Value, fields: &[&str]) -> Result<()> {
	let Value::Object(map) = body else {
		return Err(Error::ApiAssertionMismatch {
			url: url.to_string(),
			reason: "body is not a JSON object".to_string(),
		});
	};
	let missing: Vec<&str> = fields.iter().copied().filter(|f| !map.contains_key(*f)).collect();
	if missing.is_empty() {
		Ok(())
	} else {
		Err(Error::ApiAssertionMismatch {
			url: url.to_string(),
			reason: format!("missing fields: {}", missing.join(", ")),
		})
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	const EXPORT: &str = "https://grid.example.test/api/drf/mapexport";

	fn export_request(body: &str) -> InterceptedRequest {
		InterceptedRequest::new("POST", EXPORT)
			.with_header("content-type", "application/json")
			.with_post_data(body)
	}

	#[test]
	fn matcher_globs_and_literals() {
		let matcher = RouteMatcher::new("https://grid.example.test/api/drf/aois?*");
		assert!(matcher.is_match("https://grid.example.test/api/drf/aois?page=1"));
		assert!(!matcher.is_match("https://grid.example.test/api/drf/aois"));

		let exact = RouteMatcher::new(EXPORT);
		assert!(exact.is_match(EXPORT));
		assert!(!exact.is_match("https://grid.example.test/api/drf/mapexport/2"));
	}

	#[test]
	fn forward_rewrites_body_and_records_original() {
		let interceptor = BodyInterceptor::forward(EXPORT).set_field("warn", json!(false));

		let decision = interceptor
			.handle(&export_request(r#"{"aoi_id": 42, "warn": true}"#))
			.unwrap();

		let RouteDecision::Continue { post_data: Some(sent) } = decision else {
			panic!("expected continue with body, got {decision:?}");
		};
		let sent: Value = serde_json::from_str(&sent).unwrap();
		assert_eq!(sent, json!({ "aoi_id": 42, "warn": false }));
		assert_eq!(interceptor.last_body(), Some(json!({ "aoi_id": 42, "warn": true })));
		assert_eq!(interceptor.captured()[0].method, "POST");
	}

	#[test]
	fn forward_without_transform_keeps_body() {
		let interceptor = BodyInterceptor::forward(EXPORT);
		let decision = interceptor.handle(&export_request(r#"{"aoi_id": 1}"#)).unwrap();
		assert_eq!(decision, RouteDecision::passthrough());
		assert_eq!(interceptor.captured().len(), 1);
	}

	#[test]
	fn non_matching_requests_are_ignored() {
		let interceptor = BodyInterceptor::forward(EXPORT).set_field("warn", json!(false));
		let decision = interceptor
			.handle(&InterceptedRequest::new("GET", "https://grid.example.test/api/drf/aois"))
			.unwrap();
		assert_eq!(decision, RouteDecision::passthrough());
		assert!(interceptor.captured().is_empty());
	}

	#[test]
	fn fulfill_echoes_aoi_id() {
		let interceptor = BodyInterceptor::fulfill("*/api/drf/hlz-yeah", 202, |body| {
			json!({ "aoi_id": body.and_then(|b| b.get("aoi_id")).cloned().unwrap_or(Value::Null) })
		});

		let request = InterceptedRequest::new("POST", "https://grid.example.test/api/drf/hlz-yeah").with_post_data(r#"{"aoi_id": 7}"#);
		match interceptor.handle(&request).unwrap() {
			RouteDecision::Fulfill { status, body, .. } => {
				assert_eq!(status, 202);
				assert_eq!(body, r#"{"aoi_id":7}"#);
			}
			other => panic!("expected fulfill, got {other:?}"),
		}
	}

	#[test]
	fn bad_json_is_an_assertion_mismatch() {
		let interceptor = BodyInterceptor::forward(EXPORT);
		let err = interceptor.handle(&export_request("aoi_id=3")).unwrap_err();
		assert!(matches!(err, Error::ApiAssertionMismatch { .. }));
		assert_eq!(interceptor.decide(&export_request("aoi_id=3")), RouteDecision::passthrough());
	}

	#[test]
	fn empty_body_is_none() {
		assert_eq!(parse_body(&InterceptedRequest::new("POST", EXPORT)).unwrap(), None);
		assert_eq!(parse_body(&export_request("  ")).unwrap(), None);
	}

	#[test]
	fn expect_fields_lists_missing() {
		let body = json!({ "aoi_id": 1, "layers": [] });
		assert!(expect_fields(EXPORT, &body, &["aoi_id", "layers"]).is_ok());

		let err = expect_fields(EXPORT, &body, &["aoi_id", "format", "warn"]).unwrap_err();
		assert!(err.to_string().contains("format, warn"));
		assert!(expect_fields(EXPORT, &json!([1]), &["aoi_id"]).is_err());
	}
}
