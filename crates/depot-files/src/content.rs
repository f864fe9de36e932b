//! Content identity: size, MD5 digest and MIME type of a blob.
//!
//! The digest is chosen for speed, not collision resistance.

use std::path::Path;

use depot_storage::ByteStream;
use futures::StreamExt;
use md5::{Digest, Md5};
use tokio::io::AsyncReadExt;

use crate::error::{FileError, FileResult};

/// Bytes kept from the start of a blob for MIME sniffing.
pub const SNIFF_LEN: usize = 8192;

const READ_CHUNK: usize = 64 * 1024;

/// Size, digest and leading bytes of a blob, computed in one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentInfo {
    pub size_bytes: u64,
    /// Lowercase hex MD5 digest.
    pub content_hash: String,
    pub head: Vec<u8>,
}

/// Incremental hasher fed chunk by chunk.
#[derive(Default)]
pub struct ContentInspector {
    hasher: Md5,
    size_bytes: u64,
    head: Vec<u8>,
}

impl ContentInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.size_bytes += chunk.len() as u64;
        if self.head.len() < SNIFF_LEN {
            let take = (SNIFF_LEN - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }
    }

    pub fn finish(self) -> ContentInfo {
        ContentInfo {
            size_bytes: self.size_bytes,
            content_hash: hex::encode(self.hasher.finalize()),
            head: self.head,
        }
    }
}

/// Inspect a local file without loading it into memory.
pub async fn inspect_file(path: &Path) -> FileResult<ContentInfo> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut inspector = ContentInspector::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        inspector.update(&buf[..n]);
    }
    Ok(inspector.finish())
}

/// Inspect a stored blob as it streams out of the backend.
pub async fn inspect_stream(mut stream: ByteStream) -> FileResult<ContentInfo> {
    let mut inspector = ContentInspector::new();
    while let Some(chunk) = stream.next().await {
        inspector.update(&chunk?);
    }
    Ok(inspector.finish())
}

/// MD5 of an in-memory buffer, as lowercase hex.
pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(Md5::digest(data))
}

/// Detects a MIME type from the leading bytes of a blob.
///
/// Detection never looks at a caller-supplied filename or content type.
pub trait MimeDetector: Send + Sync {
    fn detect(&self, head: &[u8]) -> FileResult<String>;
}

/// Magic-byte sniffer with plain-text and binary fallbacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSniffer;

impl MimeDetector for ContentSniffer {
    fn detect(&self, head: &[u8]) -> FileResult<String> {
        if head.is_empty() {
            return Ok("application/x-empty".to_string());
        }
        if let Some(kind) = infer::get(head) {
            return Ok(kind.mime_type().to_string());
        }
        if looks_like_text(head) {
            return Ok("text/plain".to_string());
        }
        Ok("application/octet-stream".to_string())
    }
}

/// UTF-8 without NUL bytes. A multi-byte sequence cut off by the sniff window still counts.
fn looks_like_text(head: &[u8]) -> bool {
    if head.contains(&0) {
        return false;
    }
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => e.error_len().is_none(),
    }
}

/// Detector with a fixed answer, or a fixed failure.
#[derive(Debug, Clone)]
pub struct FixedMime(pub Option<String>);

impl MimeDetector for FixedMime {
    fn detect(&self, _head: &[u8]) -> FileResult<String> {
        self.0
            .clone()
            .ok_or_else(|| FileError::MimeDetection("no MIME type configured".to_string()))
    }
}
