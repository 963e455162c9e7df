use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use shared::{
    error::{ApiError, ErrorCode},
    protocol::{AckEnvelope, MessageRequest, SnapshotEnvelope, UpdateCursor, UpdatesEnvelope},
};
use tokio::sync::{Mutex, RwLock};
use tower_http::services::ServeDir;
use tracing::{error, info};

mod app_state;
mod archive;
mod config;
mod service;

use app_state::AppState;
use archive::Archiver;
use config::load_settings;
use service::ReviewService;

#[derive(Debug, Deserialize)]
struct GetUpdatesQuery {
    #[serde(rename = "nextId")]
    next_id: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    let service = ReviewService::from_data_dir(&settings.data_dir).map_err(|error| {
        error!(
            data_dir = %settings.data_dir.display(),
            %error,
            "failed to load review corpus; verify the data dir contains an index file"
        );
        error
    })?;
    let archiver = Archiver::new(settings.data_dir.join("archive"))?;

    let state = Arc::new(AppState {
        service: RwLock::new(service),
        archiver: Mutex::new(archiver),
    });
    spawn_archiver(
        Arc::clone(&state),
        Duration::from_secs(settings.archive_interval_secs.max(1)),
    );

    let app = build_router(Arc::clone(&state), &settings.data_dir);
    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, "review service listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>, image_dir: &Path) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/message", post(message))
        .route("/getupdates", get(get_updates))
        .nest_service("/images", ServeDir::new(image_dir))
        .with_state(state)
}

fn spawn_archiver(state: Arc<AppState>, interval: Duration) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            let (data, last_update_id) = {
                let service = state.service.read().await;
                (service.data().to_vec(), service.last_update_id())
            };
            let mut archiver = state.archiver.lock().await;
            if let Err(error) = archiver.save_if_changed(&data, last_update_id) {
                error!(%error, "corpus archive failed");
            }
        }
    });
}

async fn healthz() -> &'static str {
    "ok"
}

async fn message(
    State(state): State<Arc<AppState>>,
    Json(request): Json<MessageRequest>,
) -> Result<Json<serde_json::Value>, (StatusCode, Json<ApiError>)> {
    match request {
        MessageRequest::GetData => {
            let service = state.service.read().await;
            let envelope = SnapshotEnvelope {
                response: service.snapshot(),
            };
            Ok(Json(serde_json::to_value(envelope).map_err(internal)?))
        }
        MessageRequest::Update { data } => {
            let index = data.index.0;
            let url = data.url.clone();
            state
                .service
                .write()
                .await
                .apply_update(data)
                .map_err(|e| {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(ApiError::new(ErrorCode::Validation, e.to_string())),
                    )
                })?;
            info!(index, %url, "verdict update applied");
            Ok(Json(
                serde_json::to_value(AckEnvelope {
                    response: "ok".into(),
                })
                .map_err(internal)?,
            ))
        }
    }
}

async fn get_updates(
    State(state): State<Arc<AppState>>,
    Query(query): Query<GetUpdatesQuery>,
) -> Json<UpdatesEnvelope> {
    let service = state.service.read().await;
    Json(UpdatesEnvelope {
        response: service.updates_since(UpdateCursor(query.next_id)),
    })
}

fn internal(err: impl std::fmt::Display) -> (StatusCode, Json<ApiError>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, err.to_string())),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use shared::domain::{Sample, SampleIndex, Verdict};
    use tower::ServiceExt;

    fn sample(index: u64, url: &str, verdict: Option<Verdict>) -> Sample {
        Sample {
            index: SampleIndex(index),
            url: url.to_string(),
            screenshot: format!("shots/{index}.png"),
            distilled: format!("shots/{index}-distilled.png"),
            verdict,
        }
    }

    fn test_app(data: Vec<Sample>) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = Arc::new(AppState {
            service: RwLock::new(ReviewService::new(data)),
            archiver: Mutex::new(Archiver::new(dir.path().join("archive")).expect("archiver")),
        });
        (build_router(state, dir.path()), dir)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn get_data_returns_the_full_snapshot_envelope() {
        let (app, _dir) = test_app(vec![sample(0, "a", None), sample(1, "b", None)]);
        let request = Request::post("/message")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"action":"getData"}"#))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["response"]["nextId"], 0);
        assert_eq!(body["response"]["data"].as_array().expect("data").len(), 2);
    }

    #[tokio::test]
    async fn update_round_trips_through_getupdates() {
        let (app, _dir) = test_app(vec![sample(0, "a", None), sample(1, "b", None)]);
        let updated = sample(1, "b", Some(Verdict::Poor));
        let request = Request::post("/message")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_string(&MessageRequest::Update { data: updated }).expect("body"),
            ))
            .expect("request");
        let response = app.clone().oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let request = Request::get("/getupdates?nextId=0")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["response"]["nextId"], 1);
        let updates = body["response"]["updates"].as_array().expect("updates");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0]["index"], 1);
        assert_eq!(updates[0]["entry"]["good"], 2);
    }

    #[tokio::test]
    async fn caught_up_poll_is_a_heartbeat() {
        let (app, _dir) = test_app(vec![sample(0, "a", None)]);
        let request = Request::get("/getupdates?nextId=0")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        let body = body_json(response).await;
        assert_eq!(body["response"]["nextId"], 0);
        assert!(body["response"]["data"].is_null());
        assert!(body["response"]["updates"].is_null());
    }

    #[tokio::test]
    async fn update_for_an_unknown_url_is_rejected() {
        let (app, _dir) = test_app(vec![sample(0, "a", None)]);
        let request = Request::post("/message")
            .header("content-type", "application/json")
            .body(Body::from(
                serde_json::to_string(&MessageRequest::Update {
                    data: sample(9, "unknown", Some(Verdict::Good)),
                })
                .expect("body"),
            ))
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn images_are_served_by_basename_from_the_data_dir() {
        let (app, dir) = test_app(vec![sample(0, "a", None)]);
        std::fs::write(dir.path().join("0.png"), b"png-bytes").expect("write image");

        let request = Request::get("/images/0.png")
            .body(Body::empty())
            .expect("request");
        let response = app.oneshot(request).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        assert_eq!(&bytes[..], b"png-bytes");
    }
}
