//! In-process stand-in for the upstream API, shared by unit tests

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

#[derive(Debug, Default)]
struct StubState {
    responses: HashMap<String, (StatusCode, Value)>,
    hits: HashMap<String, usize>,
}

/// Serves canned responses under `/releasecommunications/{id}`
///
/// Ids without a canned response get a 404.
#[derive(Debug, Clone)]
pub struct StubUpstream {
    base_url: String,
    state: Arc<Mutex<StubState>>,
}

impl StubUpstream {
    pub async fn spawn() -> Self {
        let state = Arc::new(Mutex::new(StubState::default()));
        let app = Router::new()
            .route("/releasecommunications/{id}", get(serve_update))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind stub upstream");
        let addr = listener.local_addr().expect("Stub upstream has no address");
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    pub fn base_url(&self) -> String {
        self.base_url.clone()
    }

    pub fn respond(&self, id: &str, status: StatusCode, body: Value) {
        let mut state = self.state.lock().unwrap();
        state.responses.insert(id.to_string(), (status, body));
    }

    pub fn hits(&self, id: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.hits.get(id).copied().unwrap_or(0)
    }
}

async fn serve_update(
    State(state): State<Arc<Mutex<StubState>>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<Value>) {
    let mut state = state.lock().unwrap();
    *state.hits.entry(id.clone()).or_insert(0) += 1;
    match state.responses.get(&id) {
        Some((status, body)) => (*status, Json(body.clone())),
        None => (StatusCode::NOT_FOUND, Json(Value::Null)),
    }
}
