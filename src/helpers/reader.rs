use crate::error::SheetSyncError;
use std::fs::File;
use std::io::BufReader;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum UnifiedReaderError {
    #[error("No data from remote file: '{0}'")]
    RemoteFileNoDataError(String),
}

/// Seekable source of workbook bytes, read from disk or fetched whole from a URL.
pub(crate) enum UnifiedReader {
    Local(BufReader<File>),
    Remote(Cursor<Vec<u8>>),
}

impl UnifiedReader {
    /// Opens a local path, or downloads a remote URL through DuckDB's
    /// `read_blob`, which resolves http(s), s3, gs and hf locations along
    /// with any configured credentials.
    pub(crate) fn open(location: &str) -> Result<UnifiedReader, SheetSyncError> {
        if Self::is_remote_url(location) {
            tracing::debug!("fetching {location} through read_blob");
            Self::read_blob(location)
        } else {
            let path = Url::parse(location)
                .ok()
                .and_then(|url| url.to_file_path().ok())
                .unwrap_or_else(|| location.into());
            Ok(UnifiedReader::Local(BufReader::new(File::open(path)?)))
        }
    }

    /// Any parseable URL except `file://` is remote.
    pub(crate) fn is_remote_url(location: &str) -> bool {
        Url::parse(location)
            .map(|url| url.scheme() != "file" && url.scheme().len() > 1)
            .unwrap_or(false)
    }

    fn read_blob(location: &str) -> Result<UnifiedReader, SheetSyncError> {
        let connection = duckdb::Connection::open_in_memory()?;
        let content: Result<Vec<u8>, _> =
            connection.query_row("SELECT content FROM read_blob(?)", [location], |row| row.get(0));
        connection.close().map_err(|(_, e)| e)?;

        let bytes = content?;
        if bytes.is_empty() {
            Err(UnifiedReaderError::RemoteFileNoDataError(location.to_owned()))?;
        }
        Ok(UnifiedReader::Remote(Cursor::new(bytes)))
    }
}

impl Read for UnifiedReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match self {
            UnifiedReader::Local(reader) => reader.read(buf),
            UnifiedReader::Remote(reader) => reader.read(buf),
        }
    }
}

impl Seek for UnifiedReader {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        match self {
            UnifiedReader::Local(reader) => reader.seek(pos),
            UnifiedReader::Remote(reader) => reader.seek(pos),
        }
    }
}
