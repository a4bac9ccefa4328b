// Request interception through a browsing session.

use std::sync::Arc;

use grid::testing::{MockSession, MockSite};
use grid::{BodyInterceptor, BrowserSession, Error, RunConfig, expect_fields};
use grid_protocol::{InterceptedRequest, RouteDecision};
use serde_json::{Value, json};

fn config() -> RunConfig {
	RunConfig::default().with_base_url("https://grid.example.test/grid")
}

#[tokio::test]
async fn export_request_is_forwarded_with_warn_disabled() {
	let config = config();
	let export_url = config.api_url("mapexport");
	let session = MockSession::new(MockSite::grid());
	let interceptor = Arc::new(BodyInterceptor::forward(&export_url).set_field("warn", json!(false)));
	session.route(interceptor.clone()).await.unwrap();

	let request = InterceptedRequest::new("POST", &export_url)
		.with_header("content-type", "application/json")
		.with_post_data(r#"{"aoi_id": 12, "export_type": "imagery", "warn": true}"#);
	let decision = session.dispatch(&request);

	let RouteDecision::Continue { post_data: Some(sent) } = decision else {
		panic!("expected a forwarded body, got {decision:?}");
	};
	let sent: Value = serde_json::from_str(&sent).unwrap();
	assert_eq!(sent["warn"], json!(false));
	assert_eq!(sent["aoi_id"], json!(12));

	let original = interceptor.last_body().unwrap();
	assert_eq!(original["warn"], json!(true));
	expect_fields(&export_url, &original, &["aoi_id", "export_type"]).unwrap();
}

#[tokio::test]
async fn tool_request_is_answered_locally() {
	let config = config();
	let hlz_url = config.api_url("hlz-yeah");
	let session = MockSession::new(MockSite::grid());
	let interceptor = Arc::new(BodyInterceptor::fulfill(&hlz_url, 202, |body| {
		json!({ "aoi_id": body.and_then(|b| b.get("aoi_id")).cloned().unwrap_or(Value::Null) })
	}));
	session.route(interceptor.clone()).await.unwrap();

	let decision = session.dispatch(&InterceptedRequest::new("POST", &hlz_url).with_post_data(r#"{"aoi_id": 99}"#));
	assert_eq!(
		decision,
		RouteDecision::Fulfill {
			status: 202,
			content_type: "application/json".to_string(),
			body: r#"{"aoi_id":99}"#.to_string(),
		}
	);

	let other = session.dispatch(&InterceptedRequest::new("GET", config.api_url("aois")));
	assert_eq!(other, RouteDecision::passthrough());
	assert_eq!(interceptor.captured().len(), 1);
}

#[test]
fn missing_fields_are_an_assertion_mismatch() {
	let url = config().api_url("mapexport");
	let err = expect_fields(&url, &json!({ "aoi_id": 1 }), &["aoi_id", "layers"]).unwrap_err();
	match err {
		Error::ApiAssertionMismatch { url: reported, reason } => {
			assert_eq!(reported, "https://grid.example.test/grid/api/drf/mapexport");
			assert!(reason.contains("layers"));
		}
		other => panic!("expected ApiAssertionMismatch, got {other:?}"),
	}
}
