//! File and directory operations.
//!
//! Stateless handler over async filesystem calls. `create_file` creates
//! missing parent directories; `delete_file` refuses to delete directories.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::fs;

use outpost_types::{CapabilityHandler, HandlerOutcome};

/// Handles the `files` capability domain.
#[derive(Debug, Default)]
pub struct FilesHandler;

impl FilesHandler {
    pub fn new() -> Self {
        Self
    }

    async fn create_file(&self, path: &str, content: &str) -> HandlerOutcome {
        let target = Path::new(path);
        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = fs::create_dir_all(parent).await {
                    return HandlerOutcome::err(format!("failed to create parent dirs: {e}"));
                }
            }
        }
        match fs::write(target, content).await {
            Ok(()) => HandlerOutcome::ok(format!("created file: {path}")),
            Err(e) => HandlerOutcome::err(format!("failed to create {path}: {e}")),
        }
    }

    async fn read_file(&self, path: &str) -> HandlerOutcome {
        match fs::read_to_string(path).await {
            Ok(content) => {
                let size = content.len();
                HandlerOutcome::ok_with(
                    format!("read file: {path}"),
                    json!({"content": content, "size": size}),
                )
            }
            Err(e) => HandlerOutcome::err(format!("failed to read {path}: {e}")),
        }
    }

    async fn delete_file(&self, path: &str) -> HandlerOutcome {
        match fs::metadata(path).await {
            Ok(meta) if meta.is_file() => match fs::remove_file(path).await {
                Ok(()) => HandlerOutcome::ok(format!("deleted file: {path}")),
                Err(e) => HandlerOutcome::err(format!("failed to delete {path}: {e}")),
            },
            Ok(_) => HandlerOutcome::err(format!("not a file: {path}")),
            Err(_) => HandlerOutcome::err(format!("not a file or does not exist: {path}")),
        }
    }

    async fn create_directory(&self, path: &str) -> HandlerOutcome {
        match fs::create_dir_all(path).await {
            Ok(()) => HandlerOutcome::ok(format!("created directory: {path}")),
            Err(e) => HandlerOutcome::err(format!("failed to create directory {path}: {e}")),
        }
    }

    async fn list_directory(&self, path: &str) -> HandlerOutcome {
        let mut entries = match fs::read_dir(path).await {
            Ok(entries) => entries,
            Err(e) => return HandlerOutcome::err(format!("failed to list {path}: {e}")),
        };

        let mut items = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    match entry.metadata().await {
                        Ok(meta) if meta.is_dir() => {
                            items.push(json!({"name": name, "type": "dir", "size": Value::Null}));
                        }
                        Ok(meta) => {
                            items.push(json!({"name": name, "type": "file", "size": meta.len()}));
                        }
                        Err(_) => {
                            items.push(json!({"name": name, "type": "file", "size": Value::Null}));
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => return HandlerOutcome::err(format!("failed to list {path}: {e}")),
            }
        }

        // Deterministic listing order.
        items.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
        HandlerOutcome::ok_with(format!("listed directory: {path}"), json!({"items": items}))
    }

    async fn copy_file(&self, source: &str, destination: &str) -> HandlerOutcome {
        match fs::copy(source, destination).await {
            Ok(_) => HandlerOutcome::ok(format!("copied {source} to {destination}")),
            Err(e) => HandlerOutcome::err(format!("failed to copy {source}: {e}")),
        }
    }

    async fn move_file(&self, source: &str, destination: &str) -> HandlerOutcome {
        match fs::rename(source, destination).await {
            Ok(()) => HandlerOutcome::ok(format!("moved {source} to {destination}")),
            Err(e) => HandlerOutcome::err(format!("failed to move {source}: {e}")),
        }
    }
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params.get(key).and_then(Value::as_str)
}

#[async_trait]
impl CapabilityHandler for FilesHandler {
    fn name(&self) -> &'static str {
        "files"
    }

    async fn execute(&mut self, method: &str, params: &Map<String, Value>) -> HandlerOutcome {
        let path = || str_param(params, "path");
        match method {
            "create_file" => match path() {
                Some(p) => {
                    let content = str_param(params, "content").unwrap_or("");
                    self.create_file(p, content).await
                }
                None => HandlerOutcome::err("missing parameter 'path'"),
            },
            "read_file" => match path() {
                Some(p) => self.read_file(p).await,
                None => HandlerOutcome::err("missing parameter 'path'"),
            },
            "delete_file" => match path() {
                Some(p) => self.delete_file(p).await,
                None => HandlerOutcome::err("missing parameter 'path'"),
            },
            "create_directory" => match path() {
                Some(p) => self.create_directory(p).await,
                None => HandlerOutcome::err("missing parameter 'path'"),
            },
            "list_directory" => match path() {
                Some(p) => self.list_directory(p).await,
                None => HandlerOutcome::err("missing parameter 'path'"),
            },
            "copy_file" | "move_file" => {
                let (Some(source), Some(destination)) = (
                    str_param(params, "source"),
                    str_param(params, "destination"),
                ) else {
                    return HandlerOutcome::err("missing parameter 'source' or 'destination'");
                };
                if method == "copy_file" {
                    self.copy_file(source, destination).await
                } else {
                    self.move_file(source, destination).await
                }
            }
            other => HandlerOutcome::err(format!("files handler has no method '{other}'")),
        }
    }
}
