//! Upload inputs and their local staging.

use std::fmt;
use std::path::{Path, PathBuf};

use depot_storage::ByteReader;
use tempfile::TempPath;
use tokio::io::{AsyncRead, AsyncWriteExt};

use crate::error::FileResult;

/// What a caller hands to `FileManager::upload`.
pub enum UploadSource {
    /// A local file owned by the caller. It is read in place and never deleted.
    Path(PathBuf),
    /// A temporary file whose ownership passes to the manager.
    TempFile {
        file: TempPath,
        original_filename: String,
    },
    /// A stream without a local path. Drained into a staging file before hashing.
    Reader {
        original_filename: String,
        reader: ByteReader,
    },
}

impl UploadSource {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        UploadSource::Path(path.into())
    }

    pub fn temp_file(file: TempPath, original_filename: impl Into<String>) -> Self {
        UploadSource::TempFile {
            file,
            original_filename: original_filename.into(),
        }
    }

    pub fn reader(
        original_filename: impl Into<String>,
        reader: impl AsyncRead + Send + Unpin + 'static,
    ) -> Self {
        UploadSource::Reader {
            original_filename: original_filename.into(),
            reader: Box::pin(reader),
        }
    }

    /// In-memory content, staged like any other stream.
    pub fn bytes(original_filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self::reader(original_filename, std::io::Cursor::new(data.into()))
    }

    /// Name recorded on the file record.
    pub fn original_filename(&self) -> String {
        match self {
            UploadSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            UploadSource::TempFile {
                original_filename, ..
            }
            | UploadSource::Reader {
                original_filename, ..
            } => original_filename.clone(),
        }
    }

    /// Resolve a local path for the content, copying streamed input into `staging_dir`.
    pub(crate) async fn stage(self, staging_dir: &Path) -> FileResult<StagedFile> {
        match self {
            UploadSource::Path(path) => Ok(StagedFile::Borrowed(path)),
            UploadSource::TempFile { file, .. } => Ok(StagedFile::Owned(file)),
            UploadSource::Reader { mut reader, .. } => {
                tokio::fs::create_dir_all(staging_dir).await?;
                let named = tempfile::Builder::new()
                    .prefix("depot-")
                    .tempfile_in(staging_dir)?;
                let (file, temp_path) = named.into_parts();

                let mut file = tokio::fs::File::from_std(file);
                let copied = tokio::io::copy(&mut reader, &mut file).await?;
                file.flush().await?;

                tracing::debug!(
                    path = %temp_path.display(),
                    size_bytes = copied,
                    "Staged streamed upload"
                );
                Ok(StagedFile::Owned(temp_path))
            }
        }
    }
}

impl fmt::Debug for UploadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            UploadSource::TempFile {
                file,
                original_filename,
            } => f
                .debug_struct("TempFile")
                .field("file", &file.display().to_string())
                .field("original_filename", original_filename)
                .finish(),
            UploadSource::Reader {
                original_filename, ..
            } => f
                .debug_struct("Reader")
                .field("original_filename", original_filename)
                .finish_non_exhaustive(),
        }
    }
}

/// Local copy of a pending upload's bytes.
///
/// An owned temp file is deleted when dropped: on commit, on removal of the pending record
/// and when pending state is cleared. A borrowed path belongs to the caller and is left alone.
#[derive(Debug)]
pub enum StagedFile {
    Borrowed(PathBuf),
    Owned(TempPath),
}

impl StagedFile {
    pub fn path(&self) -> &Path {
        match self {
            StagedFile::Borrowed(path) => path,
            StagedFile::Owned(temp) => temp,
        }
    }

    pub fn is_owned(&self) -> bool {
        matches!(self, StagedFile::Owned(_))
    }

    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(self.path()).await
    }
}
