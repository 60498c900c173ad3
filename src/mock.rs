//! In-process API server double for handler tests.

use http::{Method, Request, Response, StatusCode};
use kube::{Client, client::Body};
use serde_json::{Value, json};
use tower_test::mock::{self, SendResponse};

pub(crate) type Handle = mock::Handle<Request<Body>, Response<Body>>;

/// A client whose requests are answered through the returned handle.
pub(crate) fn client() -> (Client, Handle) {
    let (service, handle) = mock::pair::<Request<Body>, Response<Body>>();
    (Client::new(service, "default"), handle)
}

/// Wait for the next request and check its method and path.
pub(crate) async fn expect(
    handle: &mut Handle,
    method: Method,
    path: &str,
) -> (Request<Body>, SendResponse<Response<Body>>) {
    let (request, send) = handle.next_request().await.expect("service not called");
    assert_eq!(request.method(), method);
    assert_eq!(request.uri().path(), path);
    (request, send)
}

pub(crate) async fn body_json(request: Request<Body>) -> Value {
    let bytes = request
        .into_body()
        .collect_bytes()
        .await
        .expect("request body");
    serde_json::from_slice(&bytes).expect("request body is json")
}

pub(crate) fn ok(body: &Value) -> Response<Body> {
    respond(StatusCode::OK, body)
}

pub(crate) fn created(body: &Value) -> Response<Body> {
    respond(StatusCode::CREATED, body)
}

pub(crate) fn not_found(name: &str) -> Response<Body> {
    status(StatusCode::NOT_FOUND, "NotFound", &format!("{name:?} not found"))
}

pub(crate) fn status(code: StatusCode, reason: &str, message: &str) -> Response<Body> {
    respond(
        code,
        &json!({
            "kind": "Status",
            "apiVersion": "v1",
            "metadata": {},
            "status": "Failure",
            "message": message,
            "reason": reason,
            "code": code.as_u16()
        }),
    )
}

fn respond(code: StatusCode, body: &Value) -> Response<Body> {
    Response::builder()
        .status(code)
        .body(Body::from(serde_json::to_vec(body).expect("serializable")))
        .expect("valid response")
}
