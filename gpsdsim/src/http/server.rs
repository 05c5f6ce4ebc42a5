//! HTTP server: route upload, state toggling and the SSE position stream.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, KeepAliveStream, Sse};
use axum::response::Html;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;

use crate::log::Logger;
use crate::route::{Controller, LatLon, Point};
use crate::{log_error, log_info};

/// Errors raised while starting the server.
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// Failed to bind the listen socket.
    #[error("failed to bind HTTP listener on {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

struct AppState {
    controller: Arc<Controller>,
    logger: Arc<dyn Logger>,
}

/// Browser-facing HTTP server.
pub struct HttpServer {
    listener: TcpListener,
    cancel: CancellationToken,
    state: Arc<AppState>,
}

impl HttpServer {
    /// Bind the listen socket. Port 0 picks an ephemeral port.
    pub async fn bind(
        parent: CancellationToken,
        port: u16,
        controller: Arc<Controller>,
        logger: Arc<dyn Logger>,
    ) -> Result<Self, HttpError> {
        let addr = format!("0.0.0.0:{port}");
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| HttpError::Bind { addr, source })?;

        Ok(Self {
            listener,
            cancel: parent.child_token(),
            state: Arc::new(AppState { controller, logger }),
        })
    }

    /// The bound address (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Spawn the server task.
    pub fn startup(self) {
        let Self {
            listener,
            cancel,
            state,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            log_info!(state.logger, "http: starting up the web UI on {}", addr);
        }

        let router = Router::new()
            .route("/", get(index))
            .route("/route", get(current_route).post(update_route))
            .route("/toggle", post(toggle))
            .route("/stop", post(stop))
            .route("/sse", get(sse))
            .with_state(Arc::clone(&state));

        tokio::spawn(async move {
            let shutdown = cancel.cancelled_owned();
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                log_error!(state.logger, "http: server error: {e}");
            }
        });
    }
}

async fn index() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

/// Route upload request from the browser polyline editor.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RouteRequest {
    name: String,
    coordinates: Vec<Coordinate>,
    #[serde(rename = "maxSpeed")]
    max_speed: u32,
}

#[derive(Debug, Default, Deserialize)]
struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Serialize)]
struct RouteSnapshot {
    #[serde(rename = "type")]
    message_type: &'static str,
    name: String,
    distance: f64,
    #[serde(rename = "maxSpeed")]
    max_speed: u32,
    points: Vec<Point>,
}

#[derive(Serialize)]
struct CurrentPoint {
    #[serde(rename = "type")]
    message_type: &'static str,
    lat: f64,
    lon: f64,
    speed: f64,
    status: String,
}

fn snapshot(controller: &Controller) -> RouteSnapshot {
    let route = controller.get_route();
    RouteSnapshot {
        message_type: "initial-route",
        name: route.name,
        distance: route.distance,
        max_speed: route.max_speed,
        points: route.points,
    }
}

async fn current_route(State(state): State<Arc<AppState>>) -> Json<RouteSnapshot> {
    Json(snapshot(&state.controller))
}

async fn update_route(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> StatusCode {
    let polyline: Vec<LatLon> = request
        .coordinates
        .iter()
        .map(|c| LatLon::new(c.lat, c.lng))
        .collect();

    state
        .controller
        .update_route(&request.name, request.max_speed, &polyline)
        .await;
    StatusCode::ACCEPTED
}

async fn toggle(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.toggle_state();
    StatusCode::ACCEPTED
}

async fn stop(State(state): State<Arc<AppState>>) -> StatusCode {
    state.controller.update_route("", 0, &[]).await;
    StatusCode::ACCEPTED
}

/// SSE stream: an initial route snapshot when one is loaded, then one
/// `current-point` message per emission tick.
async fn sse(
    State(state): State<Arc<AppState>>,
) -> Sse<KeepAliveStream<ReceiverStream<Result<Event, Infallible>>>> {
    // Depth 1 keeps the controller's backpressure contract: a stalled
    // browser stalls the loop instead of piling up events.
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(feed_events(state, tx));
    Sse::new(ReceiverStream::new(rx)).keep_alive(KeepAlive::default())
}

async fn feed_events(state: Arc<AppState>, tx: mpsc::Sender<Result<Event, Infallible>>) {
    log_info!(state.logger, "http: SSE client connected");
    let (mut updates, subscription) = state.controller.subscribe().await;

    if state.controller.get_route_size() > 0
        && send_json(&tx, &snapshot(&state.controller)).await.is_err()
    {
        drop(updates);
        subscription.cancel().await;
        return;
    }

    loop {
        let point = tokio::select! {
            _ = tx.closed() => break, // client gone
            point = updates.recv() => match point {
                Some(point) => point,
                None => break,
            },
        };

        let message = CurrentPoint {
            message_type: "current-point",
            lat: point.lat,
            lon: point.lon,
            speed: point.speed,
            status: state.controller.get_state().to_string(),
        };
        if send_json(&tx, &message).await.is_err() {
            break;
        }
    }

    log_info!(state.logger, "http: SSE client disconnected");
    // Close our receiver first so a broadcast blocked on this subscriber
    // cannot hold the table lock against the unsubscribe.
    drop(updates);
    subscription.cancel().await;
}

async fn send_json<T: Serialize>(
    tx: &mpsc::Sender<Result<Event, Infallible>>,
    message: &T,
) -> Result<(), ()> {
    let event = match Event::default().json_data(message) {
        Ok(event) => event,
        Err(_) => return Err(()),
    };
    tx.send(Ok(event)).await.map_err(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::log::NoOpLogger;
    use crate::route::ElevationClient;
    use std::time::Duration;

    fn controller(parent: &CancellationToken) -> Arc<Controller> {
        Arc::new(Controller::with_elevation(
            parent.clone(),
            Duration::from_millis(50),
            ElevationClient::new("http://127.0.0.1:1/unreachable".into()),
            Arc::new(NoOpLogger),
        ))
    }

    #[test]
    fn test_route_request_shape() {
        let request: RouteRequest = serde_json::from_str(
            r#"{"name":"city loop","maxSpeed":30,"coordinates":[{"lat":47.0,"lng":8.0},{"lat":47.01,"lng":8.0}]}"#,
        )
        .unwrap();
        assert_eq!(request.name, "city loop");
        assert_eq!(request.max_speed, 30);
        assert_eq!(request.coordinates.len(), 2);
        assert_eq!(request.coordinates[0].lng, 8.0);
    }

    #[test]
    fn test_route_request_defaults() {
        let request: RouteRequest = serde_json::from_str(r#"{"coordinates":[]}"#).unwrap();
        assert_eq!(request.max_speed, 0);
        assert!(request.name.is_empty());
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let parent = CancellationToken::new();
        let server = HttpServer::bind(parent.clone(), 0, controller(&parent), Arc::new(NoOpLogger))
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }

    #[tokio::test]
    async fn test_snapshot_reflects_controller_route() {
        let parent = CancellationToken::new();
        let ctrl = controller(&parent);
        ctrl.update_route("snapshot", 0, &[LatLon::new(47.0, 8.0), LatLon::new(47.01, 8.0)])
            .await;

        let snap = snapshot(&ctrl);
        assert_eq!(snap.message_type, "initial-route");
        assert_eq!(snap.name, "snapshot");
        assert_eq!(snap.points.len(), 2);
    }
}
