//! Scripted API server for unit tests
//!
//! Backs a [`Context`] with a `tower_test` mock service. Each request is
//! recorded as `"METHOD /path"` and answered by a closure over method and
//! path, so tests can script a whole conversation without a cluster.

use super::Context;
use crate::config::DevConfig;
use http::{Request, Response, StatusCode};
use kube::client::Body;
use kube::Client;
use std::sync::{Arc, Mutex};
use tower_test::mock::Handle;

/// Status code and JSON body sent back for one request
pub(crate) type Reply = (StatusCode, String);

/// Requests the mock server has answered, in order
#[derive(Clone, Default)]
pub(crate) struct RequestLog(Arc<Mutex<Vec<String>>>);

impl RequestLog {
    pub(crate) fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    /// Index of the last request equal to `entry`
    pub(crate) fn last_position(&self, entry: &str) -> Option<usize> {
        self.entries().iter().rposition(|e| e == entry)
    }

    fn push(&self, entry: String) {
        self.0.lock().unwrap().push(entry);
    }
}

/// A context whose API calls are answered by `respond(method, path)`
pub(crate) fn mock_context<F>(config: DevConfig, respond: F) -> (Context, RequestLog)
where
    F: FnMut(&str, &str) -> Reply + Send + 'static,
{
    let (service, handle) = tower_test::mock::pair::<Request<Body>, Response<Body>>();
    let requests = RequestLog::default();
    tokio::spawn(serve(handle, requests.clone(), respond));

    let client = Client::new(service, config.namespace.clone());
    (Context::with_client(client, config), requests)
}

async fn serve<F>(mut handle: Handle<Request<Body>, Response<Body>>, requests: RequestLog, mut respond: F)
where
    F: FnMut(&str, &str) -> Reply,
{
    while let Some((request, send)) = handle.next_request().await {
        let method = request.method().as_str().to_string();
        let path = request.uri().path().to_string();
        requests.push(format!("{method} {path}"));

        let (code, body) = respond(&method, &path);
        let response = Response::builder()
            .status(code)
            .body(Body::from(body.into_bytes()))
            .unwrap();
        send.send_response(response);
    }
}

/// 200 with `value` as the body
pub(crate) fn ok(value: serde_json::Value) -> Reply {
    (StatusCode::OK, value.to_string())
}

/// 201 with `value` as the body
pub(crate) fn created(value: serde_json::Value) -> Reply {
    (StatusCode::CREATED, value.to_string())
}

/// A `Status` failure the way the API server reports it
pub(crate) fn status(code: u16, reason: &str) -> Reply {
    let body = serde_json::json!({
        "apiVersion": "v1",
        "kind": "Status",
        "status": "Failure",
        "message": format!("{reason} (mock)"),
        "reason": reason,
        "code": code,
    });
    (
        StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        body.to_string(),
    )
}

/// Plain-text 200, as served by the log endpoint
pub(crate) fn text(body: &str) -> Reply {
    (StatusCode::OK, body.to_string())
}

/// A pod named `name` in `phase`
pub(crate) fn pod_json(name: &str, phase: &str) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name},
        "status": {"phase": phase}
    })
}

/// A pod still reporting `Running` whose only container exited with `code`
pub(crate) fn exited_pod_json(name: &str, code: i32) -> serde_json::Value {
    serde_json::json!({
        "apiVersion": "v1",
        "kind": "Pod",
        "metadata": {"name": name},
        "status": {
            "phase": "Running",
            "containerStatuses": [{
                "name": name,
                "ready": false,
                "restartCount": 0,
                "image": "localhost:5000/test-runner",
                "imageID": "",
                "state": {"terminated": {"exitCode": code}}
            }]
        }
    })
}
