use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::engine::TickResult;

/// Audit flush: one JSON object per line, one line per city tick. Any
/// existing file at `path` is truncated first.
pub fn results_to_jsonl(results: &[TickResult], path: &Path) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for result in results {
        serde_json::to_writer(&mut writer, result)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    tracing::debug!(lines = results.len(), path = %path.display(), "tick results flushed");
    Ok(())
}
