use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::io::ErrorKind;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;
use tracing::{info, warn};

use super::segment::{scan_segments, Segment};
use super::settings::ConcatMode;
use crate::error::LiveError;

const MANIFEST_NAME: &str = "concat.txt";

/// Result of a merge
#[derive(Debug, Clone, Serialize)]
pub struct MergeReport {
    pub output_path: PathBuf,
    pub segments_merged: usize,
    pub bytes: u64,
    /// Index ranges absent from the merged sequence (gaps and excluded segments)
    pub missing: Vec<RangeInclusive<u32>>,
    /// Segments left on disk because they were empty or outside the merged run
    pub excluded: Vec<u32>,
    pub partial: bool,
}

/// Joins a job's segments into one output file
pub struct SegmentMerger {
    mode: ConcatMode,
    ffmpeg_path: PathBuf,
}

impl SegmentMerger {
    pub fn new(mode: ConcatMode, ffmpeg_path: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            ffmpeg_path: ffmpeg_path.into(),
        }
    }

    /// Merge every usable segment in `segment_dir` into `output`
    ///
    /// Segments are ordered by their embedded index, never by file times.
    /// When the sequence has gaps, the longest contiguous run is merged and
    /// the report is marked partial. Merged segments are removed only after
    /// the output is written.
    pub async fn merge(&self, segment_dir: &Path, output: &Path) -> Result<MergeReport, LiveError> {
        let segments = scan_segments(segment_dir)
            .await
            .map_err(|e| LiveError::MergeFailure(format!("{:#}", e)))?;

        let (usable, empty): (Vec<Segment>, Vec<Segment>) =
            segments.into_iter().partition(|s| s.size > 0);
        if usable.is_empty() {
            return Err(LiveError::MergeFailure("no data recorded".to_string()));
        }

        let run = longest_contiguous_run(&usable);
        let highest = usable.last().map_or(0, |s| s.index);
        let run_start = run.first().map_or(0, |s| s.index);
        let run_end = run.last().map_or(0, |s| s.index);

        let mut missing = Vec::new();
        if run_start > 0 {
            missing.push(0..=run_start - 1);
        }
        if highest > run_end {
            missing.push(run_end + 1..=highest);
        }
        let mut excluded: Vec<u32> = empty.iter().map(|s| s.index).collect();
        excluded.extend(
            usable
                .iter()
                .filter(|s| s.index < run_start || s.index > run_end)
                .map(|s| s.index),
        );
        excluded.sort_unstable();

        let partial = !missing.is_empty();
        if partial {
            warn!(
                "Segment sequence has gaps; merging {}..={} ({} segments), missing {:?}",
                run_start,
                run_end,
                run.len(),
                missing
            );
        }

        if let Some(parent) = output.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LiveError::MergeFailure(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let manifest = write_manifest(segment_dir, run)
            .await
            .map_err(|e| LiveError::MergeFailure(format!("{:#}", e)))?;

        let joined = if run.len() == 1 {
            move_segment(&run[0].path, output).await
        } else {
            match self.mode {
                ConcatMode::Ffmpeg => self.concat_ffmpeg(&manifest, output).await,
                ConcatMode::Binary => concat_binary(run, output).await,
            }
        };

        let written = match joined {
            Ok(()) => tokio::fs::metadata(output)
                .await
                .map(|m| m.len())
                .map_err(anyhow::Error::from),
            Err(e) => Err(e),
        };

        let bytes = match written {
            Ok(bytes) if bytes > 0 => bytes,
            Ok(_) => {
                remove_quietly(output).await;
                return Err(LiveError::MergeFailure("merged output is empty".to_string()));
            }
            Err(e) => {
                remove_quietly(output).await;
                return Err(LiveError::MergeFailure(format!("{:#}", e)));
            }
        };

        remove_quietly(&manifest).await;
        for segment in run {
            remove_quietly(&segment.path).await;
        }
        if excluded.is_empty() {
            // Only succeeds when nothing else is left in the directory
            let _ = tokio::fs::remove_dir(segment_dir).await;
        }

        info!(
            "Merged {} segments into {} ({} bytes{})",
            run.len(),
            output.display(),
            bytes,
            if partial { ", partial" } else { "" }
        );

        Ok(MergeReport {
            output_path: output.to_path_buf(),
            segments_merged: run.len(),
            bytes,
            missing,
            excluded,
            partial,
        })
    }

    async fn concat_ffmpeg(&self, manifest: &Path, output: &Path) -> Result<()> {
        let status = Command::new(&self.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-y"])
            .args(["-f", "concat", "-safe", "0"])
            .arg("-i")
            .arg(manifest)
            .args(["-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .kill_on_drop(true)
            .status()
            .await
            .with_context(|| format!("Failed to run {:?}", self.ffmpeg_path))?;

        if !status.success() {
            bail!("ffmpeg concat exited with {}", status);
        }
        Ok(())
    }
}

/// Longest run of consecutive indices; ties go to the earliest run
fn longest_contiguous_run(segments: &[Segment]) -> &[Segment] {
    let mut best = 0..0;
    let mut start = 0;

    for i in 0..segments.len() {
        if i > 0 && segments[i].index != segments[i - 1].index + 1 {
            start = i;
        }
        if i + 1 - start > best.len() {
            best = start..i + 1;
        }
    }

    &segments[best]
}

fn format_manifest_entry(segment: &Segment) -> String {
    // Entries are relative to the manifest, which lives beside the segments
    let name = segment
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    format!("file '{}'\n", name.replace('\'', "'\\''"))
}

async fn write_manifest(segment_dir: &Path, segments: &[Segment]) -> Result<PathBuf> {
    let path = segment_dir.join(MANIFEST_NAME);
    let contents: String = segments.iter().map(format_manifest_entry).collect();
    tokio::fs::write(&path, contents)
        .await
        .with_context(|| format!("Failed to write concat manifest {:?}", path))?;
    Ok(path)
}

async fn concat_binary(segments: &[Segment], output: &Path) -> Result<()> {
    let mut out = tokio::fs::File::create(output)
        .await
        .with_context(|| format!("Failed to create {:?}", output))?;

    for segment in segments {
        let mut input = tokio::fs::File::open(&segment.path)
            .await
            .with_context(|| format!("Failed to open segment {:?}", segment.path))?;
        tokio::io::copy(&mut input, &mut out).await?;
    }

    tokio::io::AsyncWriteExt::flush(&mut out).await?;
    Ok(())
}

async fn move_segment(segment: &Path, output: &Path) -> Result<()> {
    remove_quietly(output).await;
    if tokio::fs::rename(segment, output).await.is_err() {
        tokio::fs::copy(segment, output)
            .await
            .with_context(|| format!("Failed to copy {:?} to {:?}", segment, output))?;
    }
    Ok(())
}

async fn remove_quietly(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}
