use std::io::Write;

use depot_files::content::md5_hex;
use tempfile::NamedTempFile;

/// Smallest byte sequence sniffed as a JPEG: SOI, an APP0/JFIF segment and EOI.
pub fn create_test_jpeg() -> Vec<u8> {
    let mut jpeg = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
    jpeg.extend_from_slice(b"JFIF\0");
    jpeg.extend_from_slice(&[0x01, 0x01, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00]);
    jpeg.extend_from_slice(&[0xFF, 0xD9]);
    jpeg
}

/// Write `data` to a caller-owned file named `name` inside `dir`.
pub fn write_file(dir: &std::path::Path, name: &str, data: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("Failed to write fixture");
    path
}

pub fn temp_file_with(data: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(data).expect("Failed to write temp file");
    file.flush().expect("Failed to flush temp file");
    file
}

pub fn hash_of(data: &[u8]) -> String {
    md5_hex(data)
}
