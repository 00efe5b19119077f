use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

const SEGMENT_PREFIX: &str = "seg_";
const SEGMENT_EXTENSION: &str = "ts";

/// A recorded segment file
#[derive(Debug, Clone, Serialize)]
pub struct Segment {
    /// Sequence index, contiguous from 0 within a job
    pub index: u32,
    pub path: PathBuf,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// File name of the segment with `index`
pub fn segment_file_name(index: u32) -> String {
    format!("{}{:06}.{}", SEGMENT_PREFIX, index, SEGMENT_EXTENSION)
}

pub fn segment_path(dir: &Path, index: u32) -> PathBuf {
    dir.join(segment_file_name(index))
}

/// Output pattern handed to the stream-copy process
pub fn segment_pattern(dir: &Path) -> PathBuf {
    dir.join(format!("{}%06d.{}", SEGMENT_PREFIX, SEGMENT_EXTENSION))
}

/// Sequence index embedded in a segment file name
pub fn parse_segment_index(file_name: &str) -> Option<u32> {
    let digits = file_name
        .strip_prefix(SEGMENT_PREFIX)?
        .strip_suffix(SEGMENT_EXTENSION)?
        .strip_suffix('.')?;

    // Zero-padded to six digits, wider only once the index outgrows them
    let canonical = digits.len() == 6 || (digits.len() > 6 && !digits.starts_with('0'));
    if !canonical || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// List segments in `dir`, ordered by embedded index
///
/// A missing directory yields no segments.
pub async fn scan_segments(dir: &Path) -> Result<Vec<Segment>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read segment dir {:?}", dir))
        }
    };

    let mut segments = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let file_name = entry.file_name();
        let Some(index) = file_name.to_str().and_then(parse_segment_index) else {
            continue;
        };

        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let created_at = metadata
            .created()
            .or_else(|_| metadata.modified())
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        segments.push(Segment {
            index,
            path: entry.path(),
            size: metadata.len(),
            created_at,
        });
    }

    segments.sort_by_key(|s| s.index);
    Ok(segments)
}

/// Index the next capture should start from
pub fn next_index(segments: &[Segment]) -> u32 {
    segments.last().map_or(0, |s| s.index + 1)
}
