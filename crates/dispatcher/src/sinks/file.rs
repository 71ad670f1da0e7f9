//! FileSink - line-oriented text file, flushed after every write

use contracts::{ContractError, LineSink};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Sink that appends lines to a text file
///
/// The file is truncated on creation. Each `write_line` flushes, so a crash
/// loses at most the line being written.
pub struct FileSink {
    name: String,
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    /// Create (or truncate) the file at `path`, creating parent directories
    #[instrument(name = "file_sink_create", skip(name, path), fields(path = %path.display()))]
    pub fn create(name: impl Into<String>, path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;

        let name = name.into();
        debug!(sink = %name, path = %path.display(), "FileSink created");

        Ok(Self {
            name,
            path: path.to_path_buf(),
            writer: Some(BufWriter::new(file)),
        })
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    fn write_and_flush(&mut self, line: &str) -> Result<(), ContractError> {
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_closed(&self.name))?;

        writer
            .write_all(line.as_bytes())
            .and_then(|()| writer.flush())
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }
}

impl LineSink for FileSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write_line(&mut self, line: &str) -> Result<(), ContractError> {
        self.write_and_flush(line)
    }

    #[instrument(name = "file_sink_flush", skip(self), fields(sink = %self.name))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        match self.writer.as_mut() {
            Some(writer) => writer
                .flush()
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string())),
            None => Ok(()),
        }
    }

    #[instrument(name = "file_sink_close", skip(self), fields(sink = %self.name))]
    async fn close(&mut self) -> Result<(), ContractError> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };
        writer
            .flush()
            .and_then(|()| writer.get_ref().sync_all())
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))?;
        debug!(sink = %self.name, "FileSink closed");
        Ok(())
    }
}
