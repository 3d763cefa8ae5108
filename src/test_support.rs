//! Scripted local HTTP server standing in for the Twitch endpoints.

use std::collections::{HashMap, VecDeque};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use tiny_http::{Header, Response, Server};

use crate::auth::{OAuthClient, OAuthOptions, TokenStore};

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
    /// Contents of the watched file when the request arrived.
    pub watched_file: Option<String>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn form(&self) -> HashMap<String, String> {
        url::form_urlencoded::parse(self.body.as_bytes())
            .into_owned()
            .collect()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap()
    }
}

#[derive(Debug, Clone)]
struct Scripted {
    status: u16,
    body: String,
}

type Routes = HashMap<String, VecDeque<Scripted>>;

/// Responses are queued per `"METHOD /path"`; the last one of a route repeats.
pub struct MockServer {
    url: String,
    server: Arc<Server>,
    routes: Arc<Mutex<Routes>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    watched: Arc<Mutex<Option<PathBuf>>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockServer {
    pub fn start() -> Self {
        let server = Arc::new(Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let routes: Arc<Mutex<Routes>> = Arc::new(Mutex::new(HashMap::new()));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let watched: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));

        let server_clone = server.clone();
        let routes_clone = routes.clone();
        let requests_clone = requests.clone();
        let watched_clone = watched.clone();
        let handle = thread::spawn(move || {
            for mut request in server_clone.incoming_requests() {
                let mut body = String::new();
                let _ = request.as_reader().read_to_string(&mut body);

                let (path, query) = match request.url().split_once('?') {
                    Some((path, query)) => (path.to_string(), query.to_string()),
                    None => (request.url().to_string(), String::new()),
                };
                let method = request.method().to_string();
                let headers = request
                    .headers()
                    .iter()
                    .map(|h| (h.field.to_string(), h.value.to_string()))
                    .collect();

                let key = format!("{} {}", method, path);
                let scripted = {
                    let mut routes = routes_clone.lock().unwrap();
                    match routes.get_mut(&key) {
                        Some(queue) if queue.len() > 1 => queue.pop_front(),
                        Some(queue) => queue.front().cloned(),
                        None => None,
                    }
                };

                let watched_file = watched_clone
                    .lock()
                    .unwrap()
                    .as_ref()
                    .and_then(|file| std::fs::read_to_string(file).ok());

                requests_clone.lock().unwrap().push(RecordedRequest {
                    method,
                    path,
                    query,
                    headers,
                    body,
                    watched_file,
                });

                let scripted = scripted.unwrap_or(Scripted {
                    status: 500,
                    body: format!(r#"{{"error":"Unscripted","status":500,"message":"{}"}}"#, key),
                });
                let response = Response::from_string(scripted.body)
                    .with_status_code(scripted.status)
                    .with_header(
                        Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap(),
                    );
                let _ = request.respond(response);
            }
        });

        Self {
            url: format!("http://{}", addr),
            server,
            routes,
            requests,
            watched,
            handle: Some(handle),
        }
    }

    pub fn id_base(&self) -> String {
        format!("{}/oauth2", self.url)
    }

    pub fn helix_base(&self) -> String {
        format!("{}/helix", self.url)
    }

    pub fn respond(&self, method: &str, path: &str, status: u16, body: serde_json::Value) -> &Self {
        self.routes
            .lock()
            .unwrap()
            .entry(format!("{} {}", method, path))
            .or_default()
            .push_back(Scripted {
                status,
                body: body.to_string(),
            });
        self
    }

    /// Snapshots `path` into every request recorded from now on.
    pub fn watch_file(&self, path: &Path) {
        *self.watched.lock().unwrap() = Some(path.to_path_buf());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method && r.path == path)
            .collect()
    }

    pub fn options(&self) -> OAuthOptions {
        let mut opts = OAuthOptions::new("test-client".to_string());
        opts.client_secret = Some("test-secret".to_string());
        opts.id_base = self.id_base();
        opts.helix_base = self.helix_base();
        opts.poll_interval = Duration::from_millis(5);
        opts.device_timeout = Duration::from_secs(5);
        opts.open_browser = false;
        opts
    }

    pub fn oauth_client(&self, token_file: &Path) -> OAuthClient {
        OAuthClient::new(self.options(), TokenStore::new(token_file))
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub fn error_body(status: u16, error: &str, message: &str) -> serde_json::Value {
    serde_json::json!({ "error": error, "status": status, "message": message })
}

pub fn token_body(access: &str, refresh: &str) -> serde_json::Value {
    serde_json::json!({
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": 14124,
        "scope": ["channel:manage:polls", "channel:manage:predictions"],
        "token_type": "bearer"
    })
}

pub fn users_body() -> serde_json::Value {
    serde_json::json!({
        "data": [{
            "id": "141981764",
            "login": "twitchdev",
            "display_name": "TwitchDev"
        }]
    })
}
