//! Programmable HTTP stub standing in for instances and the scheduler.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::task::JoinHandle;

#[derive(Clone)]
struct Route {
    status: u16,
    body: String,
    delay: Duration,
}

#[derive(Clone, Default)]
struct Routes {
    routes: Arc<Mutex<HashMap<String, Route>>>,
    bodies: Arc<Mutex<HashMap<String, String>>>,
    hits: Arc<Mutex<HashMap<String, usize>>>,
}

pub(crate) struct StubServer {
    addr: SocketAddr,
    routes: Routes,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub(crate) async fn start() -> Self {
        let routes = Routes::default();
        let app = Router::new().fallback(serve).with_state(routes.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Self {
            addr,
            routes,
            handle,
        }
    }

    pub(crate) fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub(crate) fn set(&self, path: &str, status: u16, body: &str) {
        let mut routes = self.routes.routes.lock().unwrap();
        let delay = routes.get(path).map(|r| r.delay).unwrap_or_default();
        routes.insert(
            path.to_string(),
            Route {
                status,
                body: body.to_string(),
                delay,
            },
        );
    }

    pub(crate) fn set_delay(&self, path: &str, delay: Duration) {
        if let Some(route) = self.routes.routes.lock().unwrap().get_mut(path) {
            route.delay = delay;
        }
    }

    pub(crate) fn last_body(&self, path: &str) -> Option<String> {
        self.routes.bodies.lock().unwrap().get(path).cloned()
    }

    pub(crate) fn hits(&self, path: &str) -> usize {
        self.routes.hits.lock().unwrap().get(path).copied().unwrap_or(0)
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve(State(routes): State<Routes>, uri: Uri, body: Bytes) -> Response {
    let path = uri.path().to_string();
    *routes.hits.lock().unwrap().entry(path.clone()).or_default() += 1;
    if !body.is_empty() {
        routes
            .bodies
            .lock()
            .unwrap()
            .insert(path.clone(), String::from_utf8_lossy(&body).into_owned());
    }

    let route = routes.routes.lock().unwrap().get(&path).cloned();
    match route {
        Some(route) => {
            if !route.delay.is_zero() {
                tokio::time::sleep(route.delay).await;
            }
            let status = StatusCode::from_u16(route.status).unwrap();
            (status, route.body).into_response()
        }
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
