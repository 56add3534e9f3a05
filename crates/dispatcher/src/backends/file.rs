//! FileBackend - appends records to JSON-lines files

use std::io::{Error as IoError, ErrorKind};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use contracts::{BackendConfig, ContractError, DeliveryCounts, Item, Record, StorageBackend};
use observability::RecordCategory;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

use crate::metrics::BackendMetrics;

const ITEMS_FILE: &str = "items.jsonl";
const MEDIA_FILE: &str = "media.jsonl";
const WEBPAGES_FILE: &str = "webpages.jsonl";

/// Configuration for FileBackend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileBackendConfig {
    /// Base output directory
    pub base_path: PathBuf,
    pub items: bool,
    pub media_items: bool,
    pub web_pages: bool,
}

impl FileBackendConfig {
    /// Create config from backend params
    pub fn from_params(config: &BackendConfig) -> Result<Self, ContractError> {
        let base_path = config
            .param("base_path")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./output"));

        Ok(Self {
            base_path,
            items: config.parsed_param("items", true)?,
            media_items: config.parsed_param("media", true)?,
            web_pages: config.parsed_param("webpages", true)?,
        })
    }
}

#[derive(Default)]
struct OpenFiles {
    items: Option<File>,
    media_items: Option<File>,
    web_pages: Option<File>,
}

/// Backend that writes one JSON object per line, one file per category
pub struct FileBackend {
    name: String,
    config: FileBackendConfig,
    files: Mutex<Option<OpenFiles>>,
    metrics: BackendMetrics,
}

impl FileBackend {
    pub fn new(name: impl Into<String>, config: FileBackendConfig) -> Self {
        Self {
            name: name.into(),
            config,
            files: Mutex::new(None),
            metrics: BackendMetrics::new(),
        }
    }

    /// Create from backend config (for factory)
    pub fn from_config(config: &BackendConfig) -> Result<Self, ContractError> {
        Ok(Self::new(config.id.clone(), FileBackendConfig::from_params(config)?))
    }

    pub fn base_path(&self) -> &Path {
        &self.config.base_path
    }

    async fn open_files(&self) -> std::io::Result<OpenFiles> {
        fs::create_dir_all(&self.config.base_path).await?;

        let mut files = OpenFiles::default();
        if self.config.items {
            files.items = Some(self.open_append(ITEMS_FILE).await?);
        }
        if self.config.media_items {
            files.media_items = Some(self.open_append(MEDIA_FILE).await?);
        }
        if self.config.web_pages {
            files.web_pages = Some(self.open_append(WEBPAGES_FILE).await?);
        }
        Ok(files)
    }

    async fn open_append(&self, file_name: &str) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.config.base_path.join(file_name))
            .await
    }

    /// Output directory still present and every handle flushable
    async fn probe(&self, files: &mut OpenFiles) -> std::io::Result<()> {
        let metadata = fs::metadata(&self.config.base_path).await?;
        if !metadata.is_dir() {
            return Err(IoError::new(ErrorKind::NotFound, "output path is not a directory"));
        }
        for file in [
            files.items.as_mut(),
            files.media_items.as_mut(),
            files.web_pages.as_mut(),
        ]
        .into_iter()
        .flatten()
        {
            file.flush().await?;
        }
        Ok(())
    }

    async fn append_line(
        &self,
        file: &mut File,
        record: &impl Record,
        category: RecordCategory,
    ) -> Result<(), ContractError> {
        let mut line = record.to_payload()?;
        line.push('\n');
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| ContractError::backend_write(&self.name, e.to_string()))?;
        self.metrics.record_published(&self.name, category);
        Ok(())
    }

    async fn write_item(&self, files: &mut OpenFiles, item: &Item) -> Result<(), ContractError> {
        if let Some(file) = files.items.as_mut() {
            self.append_line(file, item, RecordCategory::Item).await?;
        }
        if let Some(file) = files.media_items.as_mut() {
            for media in &item.media_items {
                self.append_line(file, media, RecordCategory::MediaItem).await?;
            }
        }
        if let Some(file) = files.web_pages.as_mut() {
            for page in &item.web_pages {
                self.append_line(file, page, RecordCategory::WebPage).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "file_backend_open", skip(self), fields(backend = %self.name))]
    async fn open(&self) -> bool {
        match self.open_files().await {
            Ok(files) => {
                *self.files.lock().await = Some(files);
                debug!(path = %self.config.base_path.display(), "Output files opened");
                true
            }
            Err(e) => {
                error!(
                    backend = %self.name,
                    path = %self.config.base_path.display(),
                    error = %e,
                    "Failed to open output files"
                );
                false
            }
        }
    }

    async fn store(&self, item: &Item) -> Result<(), ContractError> {
        if !item.is_original() {
            return Ok(());
        }

        let mut guard = self.files.lock().await;
        let files = guard
            .as_mut()
            .ok_or_else(|| ContractError::backend_connection(&self.name, "files not open"))?;

        let result = self.write_item(files, item).await;
        if result.is_err() {
            self.metrics.inc_failure_count();
        }
        result
    }

    async fn close(&self) {
        if let Some(files) = self.files.lock().await.take() {
            for mut file in [files.items, files.media_items, files.web_pages]
                .into_iter()
                .flatten()
            {
                if let Err(e) = file.flush().await {
                    debug!(backend = %self.name, error = %e, "Flush on close failed");
                }
            }
        }
    }

    #[instrument(name = "file_backend_check_status", skip(self), fields(backend = %self.name))]
    async fn check_status(&self) -> bool {
        let mut guard = self.files.lock().await;
        let probe = match guard.as_mut() {
            Some(files) => self.probe(files).await,
            None => Err(IoError::new(ErrorKind::NotConnected, "files not open")),
        };

        let Err(e) = probe else {
            return true;
        };
        warn!(backend = %self.name, error = %e, "Output probe failed, reopening");
        guard.take();

        match self.open_files().await {
            Ok(files) => {
                *guard = Some(files);
                info!(path = %self.config.base_path.display(), "Output files reopened");
                true
            }
            Err(e) => {
                error!(
                    backend = %self.name,
                    path = %self.config.base_path.display(),
                    error = %e,
                    "Reopen failed"
                );
                false
            }
        }
    }

    fn delivered(&self) -> DeliveryCounts {
        self.metrics.snapshot()
    }
}
