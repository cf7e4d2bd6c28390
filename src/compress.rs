// ─────────────────────────────────────────────────────────────────────────────
// compress.rs — Rotate a closed bucket file into a `.zip` and remove the
// source, mirroring REFACTOR_symbol_dump_snapshot.py's `zip_and_remove`.
// ─────────────────────────────────────────────────────────────────────────────
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use zip::write::FileOptions;
use zip::ZipWriter;

use crate::error::IngestError;

/// Compresses `path` into `<path>.zip` and removes `path` on success. If
/// `path` does not exist this is an error — the caller is expected to have
/// already checked for the file and logged accordingly.
pub fn zip_and_remove(path: &Path) -> Result<(), IngestError> {
    if !path.exists() {
        return Err(IngestError::Compress(format!("file not found: {}", path.display())));
    }

    let zip_path = path.with_extension(match path.extension() {
        Some(ext) => format!("{}.zip", ext.to_string_lossy()),
        None => "zip".to_string(),
    });

    let mut src = File::open(path)?;
    let mut contents = Vec::new();
    src.read_to_end(&mut contents)?;

    let zip_file = File::create(&zip_path)?;
    let mut writer = ZipWriter::new(zip_file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let entry_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "entry".to_string());

    writer
        .start_file(entry_name, options)
        .map_err(|e| IngestError::Compress(e.to_string()))?;
    writer
        .write_all(&contents)
        .map_err(|e| IngestError::Compress(e.to_string()))?;
    writer
        .finish()
        .map_err(|e| IngestError::Compress(e.to_string()))?;

    std::fs::remove_file(path)?;
    Ok(())
}
