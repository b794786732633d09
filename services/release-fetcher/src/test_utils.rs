//! In-process stand-in for the catalog and the media service.
//!
//! Routes:
//! - `GET /database/search` master hits for any artist; `q=broken` answers
//!   503 and `q=garbled` answers a non-json body
//! - `GET /releases/{244362,500,sparse,delayed}`
//! - `GET /images/{cover,other,missing,slow}.jpeg`
//! - `POST /medias` records the multipart form, rejects any bearer other
//!   than `GOOD_TOKEN` with 401; `POST /medias-broken` answers 500

use std::{collections::HashMap, net::SocketAddr, sync::{Arc, Mutex}, time::Duration};

use axum::{
    body::{Body, Bytes},
    extract::{Multipart, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures::stream::{self, StreamExt};
use serde_json::json;
use url::Url;

pub const COVER_BYTES: &[u8] = b"\xff\xd8\xff\xe0fake jpeg payload\xff\xd9";
pub const OTHER_COVER_BYTES: &[u8] = b"\xff\xd8\xff\xe0another jpeg payload\xff\xd9";
pub const GOOD_TOKEN: &str = "good-token";

#[derive(Debug, Clone, Default)]
pub struct ReceivedUpload {
    pub fields: HashMap<String, String>,
    pub image: Option<Vec<u8>>,
    pub image_name: Option<String>,
}

struct StubState {
    base: String,
    uploads: Mutex<Vec<ReceivedUpload>>,
}

pub struct StubServer {
    addr: SocketAddr,
    state: Arc<StubState>,
}

impl StubServer {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(StubState {
            base: format!("http://{addr}/"),
            uploads: Mutex::new(Vec::new()),
        });

        let app = Router::new()
            .route("/database/search", get(search))
            .route("/releases/244362", get(|| async { Json(daydream_nation()) }))
            .route("/releases/500", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .route("/releases/sparse", get(|| async {
                Json(json!({ "year": "unknown", "genres": "Rock", "tracklist": null }))
            }))
            .route("/releases/delayed", get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                Json(daydream_nation())
            }))
            .route("/images/cover.jpeg", get(|| async {
                ([(header::CONTENT_TYPE, "image/jpeg")], COVER_BYTES).into_response()
            }))
            .route("/images/other.jpeg", get(|| async {
                ([(header::CONTENT_TYPE, "image/jpeg")], OTHER_COVER_BYTES).into_response()
            }))
            .route("/images/missing.jpeg", get(|| async { StatusCode::NOT_FOUND }))
            .route("/images/slow.jpeg", get(slow_image))
            .route("/medias", post(upload))
            .route("/medias-broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { addr, state }
    }

    pub fn base(&self) -> Url {
        Url::parse(&self.state.base).unwrap()
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}/{}", self.addr, path.trim_start_matches('/'))
    }

    pub fn uploads(&self) -> Vec<ReceivedUpload> {
        self.state.uploads.lock().unwrap().clone()
    }
}

fn daydream_nation() -> serde_json::Value {
    json!({
        "title": "Daydream Nation",
        "year": 1988,
        "genres": ["Alternative Rock"],
        "tracklist": [{ "title": "Teen Age Riot" }, { "title": "Silver Rocket" }],
        "notes": "Classic."
    })
}

async fn search(
    State(state): State<Arc<StubState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    match params.get("q").map(String::as_str) {
        Some("broken") => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        Some("garbled") => "<html>not json</html>".into_response(),
        _ => Json(json!({
            "pagination": { "page": 1, "pages": 1 },
            "results": [
                {
                    "type": "master",
                    "title": "Sonic Youth - Daydream Nation",
                    "resource_url": format!("{}releases/244362", state.base),
                    "cover_image": format!("{}images/cover.jpeg", state.base)
                },
                {
                    "type": "release",
                    "title": "Sonic Youth - Daydream Nation (pressing)",
                    "resource_url": format!("{}releases/1", state.base)
                },
                { "type": "artist", "title": "Sonic Youth" }
            ]
        }))
        .into_response(),
    }
}

async fn slow_image() -> Response {
    let first = stream::once(async { Ok::<_, std::io::Error>(Bytes::from_static(b"\xff\xd8partial")) });
    let body = first.chain(stream::pending());
    ([(header::CONTENT_TYPE, "image/jpeg")], Body::from_stream(body)).into_response()
}

async fn upload(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    let mut received = ReceivedUpload::default();
    while let Some(field) = multipart.next_field().await.unwrap() {
        let name = field.name().unwrap_or_default().to_string();
        if name == "image" {
            received.image_name = field.file_name().map(str::to_string);
            received.image = Some(field.bytes().await.unwrap().to_vec());
        } else {
            received.fields.insert(name, field.text().await.unwrap());
        }
    }

    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(format!("Bearer {GOOD_TOKEN}").as_str());
    if !authorized {
        return StatusCode::UNAUTHORIZED.into_response();
    }

    state.uploads.lock().unwrap().push(received);
    (StatusCode::CREATED, Json(json!({ "id": 1 }))).into_response()
}
