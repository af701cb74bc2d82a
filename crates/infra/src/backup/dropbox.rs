//! Dropbox implementation of the remote backup store.
//!
//! Talks to the Dropbox v2 HTTP API directly: RPC endpoints on the API host
//! take JSON bodies, content endpoints on the content host take their
//! arguments in the `Dropbox-API-Arg` header. Every call carries the bearer
//! token from the linked account.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eventtracker_core::backup::ports::{AccountLink, RemoteBackupStore};
use eventtracker_domain::constants::{APP_ID, BACKUP_EXTENSION};
use eventtracker_domain::{BackupErrorKind, BackupOutcome, Config, RemoteBackupEntry};
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument, warn};

use crate::http::{HttpClient, RemoteError};

const API_ARG_HEADER: &str = "Dropbox-API-Arg";

#[derive(Debug, Deserialize)]
struct ListFolderResult {
    entries: Vec<Metadata>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct Metadata {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
    #[serde(default)]
    path_lower: Option<String>,
    #[serde(default)]
    path_display: Option<String>,
    #[serde(default)]
    server_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_summary: String,
}

/// [`RemoteBackupStore`] backed by a Dropbox app folder.
pub struct DropboxBackupStore {
    http: HttpClient,
    account: Arc<dyn AccountLink>,
    api_base: String,
    content_base: String,
    remote_dir: String,
    scratch_dir: PathBuf,
}

impl DropboxBackupStore {
    pub fn new(http: HttpClient, account: Arc<dyn AccountLink>, config: &Config) -> Self {
        Self {
            http,
            account,
            api_base: config.provider.api_endpoint.trim_end_matches('/').to_string(),
            content_base: config.provider.content_endpoint.trim_end_matches('/').to_string(),
            remote_dir: config.backup.remote_dir.trim_end_matches('/').to_string(),
            scratch_dir: config.backup.scratch_dir.clone(),
        }
    }

    /// Every `.etbak` file in the remote directory, following pagination.
    /// A missing directory lists as empty.
    pub async fn list_backups(&self) -> Result<Vec<RemoteBackupEntry>, RemoteError> {
        let token = self.token().await?;
        self.list_with(&token).await
    }

    async fn token(&self) -> Result<String, RemoteError> {
        self.account.valid_access_token().await.ok_or_else(RemoteError::not_authenticated)
    }

    async fn list_with(&self, token: &str) -> Result<Vec<RemoteBackupEntry>, RemoteError> {
        let response = self
            .rpc(
                token,
                "files/list_folder",
                &json!({ "path": self.remote_dir, "recursive": false }),
            )
            .await?;
        let mut page: ListFolderResult = match response {
            RpcReply::Ok(value) => parse(value)?,
            RpcReply::Conflict(summary) if summary.starts_with("path/not_found") => {
                debug!(dir = %self.remote_dir, "dropbox.list.dir_missing");
                return Ok(Vec::new());
            }
            RpcReply::Conflict(summary) => return Err(conflict_error(&summary)),
        };

        let mut entries = Vec::new();
        loop {
            entries.extend(page.entries.into_iter().filter_map(|m| self.backup_entry(m)));
            if !page.has_more {
                break;
            }
            page = match self
                .rpc(token, "files/list_folder/continue", &json!({ "cursor": page.cursor }))
                .await?
            {
                RpcReply::Ok(value) => parse(value)?,
                RpcReply::Conflict(summary) => return Err(conflict_error(&summary)),
            };
        }
        Ok(entries)
    }

    fn backup_entry(&self, meta: Metadata) -> Option<RemoteBackupEntry> {
        if meta.tag != "file" || !meta.name.ends_with(&format!(".{BACKUP_EXTENSION}")) {
            return None;
        }
        let server_modified = meta.server_modified?;
        let path = meta
            .path_lower
            .or(meta.path_display)
            .unwrap_or_else(|| format!("{}/{}", self.remote_dir, meta.name));
        Some(RemoteBackupEntry { name: meta.name, path, server_modified })
    }

    async fn ensure_remote_dir(&self, token: &str) -> Result<(), RemoteError> {
        let reply = self
            .rpc(
                token,
                "files/create_folder_v2",
                &json!({ "path": self.remote_dir, "autorename": false }),
            )
            .await?;
        match reply {
            RpcReply::Ok(_) => Ok(()),
            RpcReply::Conflict(summary) if summary.starts_with("path/conflict") => Ok(()),
            RpcReply::Conflict(summary) => Err(conflict_error(&summary)),
        }
    }

    async fn upload_with(&self, token: &str, file: &Path) -> Result<String, RemoteError> {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RemoteError::new(BackupErrorKind::File, "Archive path has no file name")
            })?;
        let bytes = tokio::fs::read(file).await.map_err(|e| RemoteError::local(&e))?;

        self.ensure_remote_dir(token).await?;

        let remote_path = format!("{}/{}", self.remote_dir, name);
        let arg = json!({
            "path": remote_path,
            "mode": "overwrite",
            "autorename": false,
            "mute": true
        });
        let request = self
            .http
            .post(format!("{}/2/files/upload", self.content_base))
            .header(AUTHORIZATION, bearer(token)?)
            .header(API_ARG_HEADER, api_arg(&arg)?)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(bytes);
        let response = self.http.send(request).await?;
        check_status(response).await?;

        info!(path = %remote_path, "dropbox.upload.completed");
        Ok(remote_path)
    }

    /// Keep the `retention_count` most recent archives. Failures are logged
    /// and never change the upload outcome.
    async fn enforce_retention(&self, token: &str, retention_count: usize) {
        if retention_count == 0 {
            return;
        }
        let mut entries = match self.list_with(token).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(kind = %e.kind, error = %e.message, "dropbox.retention.list_failed");
                return;
            }
        };
        entries.sort_by(newest_first);

        let mut failures = Vec::new();
        for entry in entries.into_iter().skip(retention_count) {
            match self.rpc(token, "files/delete_v2", &json!({ "path": entry.path })).await {
                Ok(RpcReply::Ok(_)) => debug!(path = %entry.path, "dropbox.retention.deleted"),
                Ok(RpcReply::Conflict(summary)) => failures.push((entry.path, summary)),
                Err(e) => failures.push((entry.path, e.message)),
            }
        }
        for (path, error) in &failures {
            warn!(path = %path, error = %error, "dropbox.retention.delete_failed");
        }
    }

    async fn download_with(&self, token: &str) -> Result<Option<PathBuf>, RemoteError> {
        let mut entries = self.list_with(token).await?;
        entries.sort_by(newest_first);
        let Some(latest) = entries.into_iter().next() else {
            return Ok(None);
        };

        let request = self
            .http
            .post(format!("{}/2/files/download", self.content_base))
            .header(AUTHORIZATION, bearer(token)?)
            .header(API_ARG_HEADER, api_arg(&json!({ "path": latest.path }))?);
        let response = self.http.send(request).await?;
        if response.status() == StatusCode::CONFLICT {
            let summary = error_summary(response).await;
            if summary.starts_with("path/not_found") {
                return Ok(None);
            }
            return Err(conflict_error(&summary));
        }
        let mut response = check_status(response).await?;

        tokio::fs::create_dir_all(&self.scratch_dir).await.map_err(|e| RemoteError::local(&e))?;
        let target = self.scratch_dir.join(&latest.name);
        let written = async {
            let mut out =
                tokio::fs::File::create(&target).await.map_err(|e| RemoteError::local(&e))?;
            while let Some(chunk) =
                response.chunk().await.map_err(|e| self.http.transport_error(&e))?
            {
                out.write_all(&chunk).await.map_err(|e| RemoteError::local(&e))?;
            }
            out.flush().await.map_err(|e| RemoteError::local(&e))?;
            Ok::<(), RemoteError>(())
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&target).await;
            return Err(e);
        }

        info!(name = %latest.name, "dropbox.download.completed");
        Ok(Some(target))
    }

    async fn rpc(
        &self,
        token: &str,
        endpoint: &str,
        body: &Value,
    ) -> Result<RpcReply, RemoteError> {
        let request = self
            .http
            .post(format!("{}/2/{endpoint}", self.api_base))
            .header(AUTHORIZATION, bearer(token)?)
            .json(body);
        let response = self.http.send(request).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(RpcReply::Conflict(error_summary(response).await));
        }
        let response = check_status(response).await?;
        let value = response.json::<Value>().await.map_err(RemoteError::malformed)?;
        Ok(RpcReply::Ok(value))
    }
}

#[async_trait]
impl RemoteBackupStore for DropboxBackupStore {
    #[instrument(skip(self), fields(file = %file.display()))]
    async fn upload_backup(&self, file: &Path, retention_count: usize) -> BackupOutcome {
        let token = match self.token().await {
            Ok(token) => token,
            Err(e) => return e.into_outcome(),
        };
        match self.upload_with(&token, file).await {
            Ok(_) => {
                self.enforce_retention(&token, retention_count).await;
                BackupOutcome::success()
            }
            Err(e) => {
                warn!(kind = %e.kind, error = %e.message, "dropbox.upload.failed");
                e.into_outcome()
            }
        }
    }

    #[instrument(skip(self))]
    async fn download_latest_backup(&self) -> BackupOutcome {
        let token = match self.token().await {
            Ok(token) => token,
            Err(e) => return e.into_outcome(),
        };
        match self.download_with(&token).await {
            Ok(Some(file)) => BackupOutcome::with_file(file),
            Ok(None) => BackupOutcome::no_backups_found(),
            Err(e) => {
                warn!(kind = %e.kind, error = %e.message, "dropbox.download.failed");
                e.into_outcome()
            }
        }
    }
}

enum RpcReply {
    Ok(Value),
    /// HTTP 409 with the endpoint-specific `error_summary`
    Conflict(String),
}

fn parse<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, RemoteError> {
    serde_json::from_value(value).map_err(RemoteError::malformed)
}

/// Most recent first: server time, then the creation millis in the archive
/// name, since `server_modified` only has second resolution.
fn newest_first(a: &RemoteBackupEntry, b: &RemoteBackupEntry) -> Ordering {
    b.server_modified
        .cmp(&a.server_modified)
        .then_with(|| created_millis(&b.name).cmp(&created_millis(&a.name)))
        .then_with(|| b.name.cmp(&a.name))
}

fn created_millis(name: &str) -> Option<i64> {
    name.strip_prefix(APP_ID)?
        .strip_prefix('-')?
        .strip_suffix(BACKUP_EXTENSION)?
        .strip_suffix('.')?
        .parse()
        .ok()
}

fn conflict_error(summary: &str) -> RemoteError {
    RemoteError::new(BackupErrorKind::Unknown, format!("Dropbox API error: {summary}"))
}

async fn error_summary(response: Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<ApiErrorBody>(&body).map(|b| b.error_summary).unwrap_or(body)
}

async fn check_status(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let summary = error_summary(response).await;
    Err(RemoteError::status(status, &summary))
}

fn bearer(token: &str) -> Result<HeaderValue, RemoteError> {
    HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
        RemoteError::new(BackupErrorKind::Auth, "Access token is not a valid header value")
    })
}

/// JSON for the `Dropbox-API-Arg` header; characters outside ASCII are
/// escaped as `\uXXXX` because HTTP headers cannot carry them.
fn api_arg(value: &Value) -> Result<HeaderValue, RemoteError> {
    let mut escaped = String::new();
    for c in value.to_string().chars() {
        if c.is_ascii() {
            escaped.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                escaped.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    HeaderValue::from_str(&escaped).map_err(|e| {
        RemoteError::new(BackupErrorKind::Unknown, format!("Invalid API argument: {e}"))
    })
}

#[cfg(test)]
mod tests {
    //! Unit tests for backup::dropbox.
    use std::time::Duration;

    use eventtracker_domain::constants::NO_BACKUPS_FOUND;
    use tempfile::TempDir;
    use wiremock::matchers::{body_partial_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, Request, ResponseTemplate};

    use super::*;

    struct StaticAccount(Option<&'static str>);

    #[async_trait]
    impl AccountLink for StaticAccount {
        fn is_configured(&self) -> bool {
            true
        }

        fn is_linked(&self) -> bool {
            self.0.is_some()
        }

        async fn valid_access_token(&self) -> Option<String> {
            self.0.map(str::to_string)
        }
    }

    fn store_for(
        server: &MockServer,
        scratch: &TempDir,
        token: Option<&'static str>,
    ) -> DropboxBackupStore {
        let mut config = Config::default();
        config.provider.api_endpoint = server.uri();
        config.provider.content_endpoint = server.uri();
        config.backup.scratch_dir = scratch.path().join("downloads");
        let http = HttpClient::with_timeout(Duration::from_secs(5))
            .unwrap()
            .with_retries(1, Duration::ZERO);
        DropboxBackupStore::new(http, Arc::new(StaticAccount(token)), &config)
    }

    fn file_entry(name: &str, modified: &str) -> Value {
        json!({
            ".tag": "file",
            "name": name,
            "path_lower": format!("/backups/{name}"),
            "path_display": format!("/backups/{name}"),
            "server_modified": modified
        })
    }

    async fn mount_listing(server: &MockServer, entries: Vec<Value>) {
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": entries,
                "cursor": "c1",
                "has_more": false
            })))
            .mount(server)
            .await;
    }

    fn deleted_paths(requests: &[Request]) -> Vec<String> {
        requests
            .iter()
            .filter(|r| r.url.path() == "/2/files/delete_v2")
            .map(|r| {
                let body: Value = serde_json::from_slice(&r.body).unwrap();
                body["path"].as_str().unwrap().to_string()
            })
            .collect()
    }

    /// Validates upload, folder creation, and retention pruning.
    ///
    /// Assertions:
    /// - Confirms an existing folder (409 `path/conflict`) is not an error.
    /// - Confirms the upload targets `/backups/<name>` in overwrite mode.
    /// - Ensures retention 3 over t1..t4 deletes only t1.
    #[tokio::test]
    async fn test_upload_then_retention() {
        let server = MockServer::start().await;
        let scratch = TempDir::new().unwrap();
        let archive = scratch.path().join("eventtracker-4.etbak");
        std::fs::write(&archive, b"sealed").unwrap();

        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({ "error_summary": "path/conflict/folder/.." })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/upload"))
            .and(header("authorization", "Bearer tok"))
            .and(header_exists("Dropbox-API-Arg"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "name": "eventtracker-4.etbak" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_listing(
            &server,
            vec![
                file_entry("eventtracker-2.etbak", "2024-01-02T00:00:00Z"),
                file_entry("eventtracker-4.etbak", "2024-01-04T00:00:00Z"),
                file_entry("eventtracker-1.etbak", "2024-01-01T00:00:00Z"),
                file_entry("eventtracker-3.etbak", "2024-01-03T00:00:00Z"),
                file_entry("notes.txt", "2023-01-01T00:00:00Z"),
                json!({ ".tag": "folder", "name": "old", "path_lower": "/backups/old" }),
            ],
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/2/files/delete_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let outcome = store_for(&server, &scratch, Some("tok")).upload_backup(&archive, 3).await;

        assert!(outcome.is_success(), "{outcome:?}");
        let requests = server.received_requests().await.unwrap();
        let upload = requests.iter().find(|r| r.url.path() == "/2/files/upload").unwrap();
        let arg_header = upload.headers.get("Dropbox-API-Arg").unwrap().to_str().unwrap();
        let arg: Value = serde_json::from_str(arg_header).unwrap();
        assert_eq!(arg["path"], "/backups/eventtracker-4.etbak");
        assert_eq!(arg["mode"], "overwrite");
        assert_eq!(upload.body, b"sealed");
        assert_eq!(deleted_paths(&requests), vec!["/backups/eventtracker-1.etbak"]);
    }

    /// Validates that zero retention disables pruning and that delete
    /// failures never fail the upload.
    #[tokio::test]
    async fn test_retention_failures_are_swallowed() {
        let server = MockServer::start().await;
        let scratch = TempDir::new().unwrap();
        let archive = scratch.path().join("eventtracker-3.etbak");
        std::fs::write(&archive, b"sealed").unwrap();

        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        mount_listing(
            &server,
            vec![
                file_entry("eventtracker-1.etbak", "2024-01-01T00:00:00Z"),
                file_entry("eventtracker-2.etbak", "2024-01-02T00:00:00Z"),
                file_entry("eventtracker-3.etbak", "2024-01-03T00:00:00Z"),
            ],
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/2/files/delete_v2"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let store = store_for(&server, &scratch, Some("tok"));
        assert!(store.upload_backup(&archive, 0).await.is_success());
        assert!(deleted_paths(&server.received_requests().await.unwrap()).is_empty());

        assert!(store.upload_backup(&archive, 1).await.is_success());
        assert_eq!(deleted_paths(&server.received_requests().await.unwrap()).len(), 2);
    }

    /// Validates ordering of archives uploaded within the same second.
    ///
    /// Assertions:
    /// - Ensures retention keeps the archive with the later creation stamp
    ///   when `server_modified` ties, whatever the listing order.
    /// - Ensures download picks that same archive.
    #[tokio::test]
    async fn test_same_second_archives_order_by_creation_stamp() {
        let server = MockServer::start().await;
        let scratch = TempDir::new().unwrap();
        let archive = scratch.path().join("eventtracker-1700000000900.etbak");
        std::fs::write(&archive, b"sealed").unwrap();

        Mock::given(method("POST"))
            .and(path("/2/files/create_folder_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/upload"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        mount_listing(
            &server,
            vec![
                file_entry("eventtracker-1700000000100.etbak", "2023-11-14T22:13:20Z"),
                file_entry("eventtracker-1700000000900.etbak", "2023-11-14T22:13:20Z"),
            ],
        )
        .await;
        Mock::given(method("POST"))
            .and(path("/2/files/delete_v2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/download"))
            .and(header(
                "Dropbox-API-Arg",
                r#"{"path":"/backups/eventtracker-1700000000900.etbak"}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"fresh".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server, &scratch, Some("tok"));
        assert!(store.upload_backup(&archive, 1).await.is_success());
        assert_eq!(
            deleted_paths(&server.received_requests().await.unwrap()),
            vec!["/backups/eventtracker-1700000000100.etbak"]
        );

        let BackupOutcome::Success { file: Some(file) } = store.download_latest_backup().await
        else {
            panic!("expected the fresh archive");
        };
        assert_eq!(file.file_name().unwrap(), "eventtracker-1700000000900.etbak");
    }

    #[test]
    fn test_creation_stamp_compares_numerically() {
        assert_eq!(created_millis("eventtracker-1700000000900.etbak"), Some(1_700_000_000_900));
        assert_eq!(created_millis("eventtracker-.etbak"), None);
        assert_eq!(created_millis("notes-1.etbak"), None);

        let modified = "2024-01-01T00:00:00Z".parse().unwrap();
        let entry = |name: &str| RemoteBackupEntry {
            name: name.to_string(),
            path: format!("/backups/{name}"),
            server_modified: modified,
        };
        let mut entries = vec![entry("eventtracker-999.etbak"), entry("eventtracker-1000.etbak")];
        entries.sort_by(newest_first);
        assert_eq!(entries[0].name, "eventtracker-1000.etbak");
    }

    /// Validates that the newest archive across pages is downloaded.
    #[tokio::test]
    async fn test_download_latest_follows_pagination() {
        let server = MockServer::start().await;
        let scratch = TempDir::new().unwrap();

        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [file_entry("eventtracker-1.etbak", "2024-01-01T00:00:00Z")],
                "cursor": "page-2",
                "has_more": true
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder/continue"))
            .and(body_partial_json(json!({ "cursor": "page-2" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "entries": [file_entry("eventtracker-9.etbak", "2024-03-01T00:00:00Z")],
                "cursor": "page-3",
                "has_more": false
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/files/download"))
            .and(header("Dropbox-API-Arg", r#"{"path":"/backups/eventtracker-9.etbak"}"#))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"newest archive".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = store_for(&server, &scratch, Some("tok")).download_latest_backup().await;

        let BackupOutcome::Success { file: Some(file) } = outcome else {
            panic!("expected a downloaded file, got {outcome:?}");
        };
        assert_eq!(file.file_name().unwrap(), "eventtracker-9.etbak");
        assert_eq!(std::fs::read(file).unwrap(), b"newest archive");
    }

    /// Validates that an empty or missing directory means "no backups".
    #[tokio::test]
    async fn test_download_without_backups() {
        let server = MockServer::start().await;
        let scratch = TempDir::new().unwrap();
        mount_listing(&server, vec![file_entry("readme.txt", "2024-01-01T00:00:00Z")]).await;

        let outcome = store_for(&server, &scratch, Some("tok")).download_latest_backup().await;
        assert!(outcome.is_no_backups_found(), "{outcome:?}");

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/files/list_folder"))
            .respond_with(
                ResponseTemplate::new(409)
                    .set_body_json(json!({ "error_summary": "path/not_found/.." })),
            )
            .mount(&server)
            .await;

        let outcome = store_for(&server, &scratch, Some("tok")).download_latest_backup().await;
        assert_eq!(outcome, BackupOutcome::error(BackupErrorKind::File, NO_BACKUPS_FOUND));
    }

    /// Validates the error taxonomy for provider and transport failures.
    ///
    /// Assertions:
    /// - Ensures a missing token is `Auth` without any request.
    /// - Ensures HTTP 401 is `Auth`.
    /// - Ensures HTTP 500 is `Unknown`.
    /// - Ensures an unreachable host is `Network`.
    #[tokio::test]
    async fn test_error_classification() {
        let scratch = TempDir::new().unwrap();
        let archive = scratch.path().join("eventtracker-1.etbak");
        std::fs::write(&archive, b"sealed").unwrap();

        let server = MockServer::start().await;
        let outcome = store_for(&server, &scratch, None).upload_backup(&archive, 3).await;
        assert_eq!(outcome.error_kind(), Some(BackupErrorKind::Auth));
        assert!(server.received_requests().await.unwrap().is_empty());

        Mock::given(method("POST"))
            .and(header_exists("authorization"))
            .respond_with(
                ResponseTemplate::new(401)
                    .set_body_json(json!({ "error_summary": "expired_access_token/" })),
            )
            .mount(&server)
            .await;
        let outcome = store_for(&server, &scratch, Some("tok")).upload_backup(&archive, 3).await;
        assert_eq!(outcome.error_kind(), Some(BackupErrorKind::Auth));

        let failing = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&failing)
            .await;
        let outcome = store_for(&failing, &scratch, Some("tok")).download_latest_backup().await;
        assert_eq!(outcome.error_kind(), Some(BackupErrorKind::Unknown));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let mut config = Config::default();
        config.provider.api_endpoint = format!("http://{addr}");
        config.provider.content_endpoint = format!("http://{addr}");
        let http =
            HttpClient::for_provider(&config.provider).unwrap().with_retries(1, Duration::ZERO);
        let store = DropboxBackupStore::new(http, Arc::new(StaticAccount(Some("tok"))), &config);
        let outcome = store.upload_backup(&archive, 3).await;
        assert_eq!(outcome.error_kind(), Some(BackupErrorKind::Network));
    }

    /// Validates that a missing local archive is a `File` failure.
    #[tokio::test]
    async fn test_missing_local_archive() {
        let server = MockServer::start().await;
        let scratch = TempDir::new().unwrap();

        let outcome = store_for(&server, &scratch, Some("tok"))
            .upload_backup(&scratch.path().join("absent.etbak"), 3)
            .await;

        assert_eq!(outcome.error_kind(), Some(BackupErrorKind::File));
    }

    #[test]
    fn test_api_arg_escapes_non_ascii() {
        let header = api_arg(&json!({ "path": "/backups/é😀" })).unwrap();
        assert_eq!(header.to_str().unwrap(), r#"{"path":"/backups/\u00e9\ud83d\ude00"}"#);
    }
}
