//! Append-only log file sink.
//!
//! Each event becomes one line: `[<rfc3339>] [<KIND>] <detail>`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::{
    fs::{File, OpenOptions},
    io::AsyncWriteExt,
    sync::Mutex,
};
use whisper_shared::time::timestamp_to_rfc3339;

use crate::domain::{EventSink, EventSinkError, ServerEvent};

pub struct FileEventSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileEventSink {
    /// Open (or create) the log file for appending. Missing parent directories are created.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn format_line(event: &ServerEvent) -> String {
    format!(
        "[{}] [{}] {}\n",
        timestamp_to_rfc3339(event.timestamp.value()),
        event.kind,
        event.detail
    )
}

#[async_trait]
impl EventSink for FileEventSink {
    async fn on_event(&self, event: &ServerEvent) -> Result<(), EventSinkError> {
        let line = format_line(event);
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
