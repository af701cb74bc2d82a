//! In-process Dropbox stand-in for end-to-end tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use serde_json::{json, Value};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Page size of `list_folder`, small so pagination is exercised.
const PAGE_SIZE: usize = 2;

#[derive(Clone)]
struct StoredFile {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    folders: Vec<String>,
    files: BTreeMap<String, StoredFile>,
}

/// Stateful fake of the Dropbox v2 file endpoints used by the backup store.
pub struct FakeDropbox {
    pub server: MockServer,
    state: Arc<Mutex<State>>,
}

impl FakeDropbox {
    pub async fn start(token: &str) -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(State::default()));
        Mock::given(wiremock::matchers::method("POST"))
            .respond_with(Handler { state: state.clone(), bearer: format!("Bearer {token}") })
            .mount(&server)
            .await;
        Self { server, state }
    }

    pub fn uri(&self) -> String {
        self.server.uri()
    }

    /// Remote paths, oldest first. Same-second uploads fall back to path
    /// order, which follows the creation stamp in the name.
    pub fn file_paths(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut files: Vec<_> = state.files.iter().collect();
        files.sort_by_key(|(_, f)| f.modified);
        files.into_iter().map(|(path, _)| path.clone()).collect()
    }
}

struct Handler {
    state: Arc<Mutex<State>>,
    bearer: String,
}

impl Handler {
    fn arg(request: &Request) -> Value {
        if let Some(header) = request.headers.get("Dropbox-API-Arg") {
            return serde_json::from_str(header.to_str().unwrap_or("{}")).unwrap_or(Value::Null);
        }
        serde_json::from_slice(&request.body).unwrap_or(Value::Null)
    }

    fn list_page(state: &State, offset: usize) -> ResponseTemplate {
        let entries: Vec<Value> = state
            .files
            .iter()
            .skip(offset)
            .take(PAGE_SIZE)
            .map(|(path, file)| {
                let name = path.rsplit('/').next().unwrap_or_default();
                json!({
                    ".tag": "file",
                    "name": name,
                    "path_lower": path.to_lowercase(),
                    "path_display": path,
                    "server_modified":
                        file.modified.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
                    "size": file.bytes.len()
                })
            })
            .collect();
        let next = offset + entries.len();
        ResponseTemplate::new(200).set_body_json(json!({
            "entries": entries,
            "cursor": next.to_string(),
            "has_more": next < state.files.len()
        }))
    }

    fn conflict(summary: &str) -> ResponseTemplate {
        ResponseTemplate::new(409).set_body_json(json!({ "error_summary": summary }))
    }
}

impl Respond for Handler {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let authorized = request
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == self.bearer);
        if !authorized {
            return ResponseTemplate::new(401)
                .set_body_json(json!({ "error_summary": "invalid_access_token/" }));
        }

        let arg = Self::arg(request);
        let path = arg["path"].as_str().unwrap_or_default().to_string();
        let mut state = self.state.lock();

        match request.url.path() {
            "/2/files/create_folder_v2" => {
                if state.folders.contains(&path) {
                    return Self::conflict("path/conflict/folder/");
                }
                state.folders.push(path.clone());
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "metadata": { "path_display": path } }))
            }
            "/2/files/upload" => {
                // Dropbox stamps whole seconds; a fast test lands every
                // upload in the same one.
                let modified =
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
                let stored = StoredFile { bytes: request.body.clone(), modified };
                state.files.insert(path.clone(), stored);
                ResponseTemplate::new(200).set_body_json(json!({ "path_display": path }))
            }
            "/2/files/list_folder" => {
                if !state.folders.contains(&path) {
                    return Self::conflict("path/not_found/");
                }
                Self::list_page(&state, 0)
            }
            "/2/files/list_folder/continue" => {
                let offset = arg["cursor"].as_str().and_then(|c| c.parse().ok()).unwrap_or(0);
                Self::list_page(&state, offset)
            }
            "/2/files/delete_v2" => match state.files.remove(&path) {
                Some(_) => ResponseTemplate::new(200).set_body_json(json!({ "metadata": {} })),
                None => Self::conflict("path_lookup/not_found/"),
            },
            "/2/files/download" => match state.files.get(&path) {
                Some(file) => ResponseTemplate::new(200).set_body_bytes(file.bytes.clone()),
                None => Self::conflict("path/not_found/"),
            },
            _ => ResponseTemplate::new(404),
        }
    }
}
