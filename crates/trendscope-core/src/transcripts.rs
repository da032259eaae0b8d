use std::{
    collections::HashSet,
    io,
    path::{Path, PathBuf},
};

use tokio::fs;

use crate::{
    error::{Result, TrendscopeError},
    format::format_transcript,
    types::VideoRecord,
};

pub const DEFAULT_TRANSCRIPT_DIR: &str = "transcripts";

const TRANSCRIPT_EXT: &str = "txt";

/// Get the transcript file path for a video shortcode
pub fn transcript_path(dir: &Path, shortcode: &str) -> Result<PathBuf> {
    let invalid = shortcode.is_empty()
        || shortcode == "."
        || shortcode == ".."
        || shortcode.contains(['/', '\\']);

    let path = dir.join(format!("{}.{}", shortcode, TRANSCRIPT_EXT));
    if invalid {
        return Err(TrendscopeError::file_io(
            path,
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable video shortcode {:?}", shortcode),
            ),
        ));
    }
    Ok(path)
}

/// Write one video's transcript, replacing any previous file
pub async fn write_transcript(dir: &Path, video: &VideoRecord) -> Result<PathBuf> {
    let path = transcript_path(dir, &video.shortcode)?;

    fs::create_dir_all(dir)
        .await
        .map_err(|e| TrendscopeError::file_io(dir, e))?;
    fs::write(&path, format_transcript(video))
        .await
        .map_err(|e| TrendscopeError::file_io(&path, e))?;

    tracing::debug!(path = %path.display(), segments = video.segments.len(), "Transcript written");
    Ok(path)
}

/// Write every video's transcript in output order.
///
/// Stops at the first failure; files already written stay on disk.
pub async fn materialize_transcripts(dir: &Path, videos: &[VideoRecord]) -> Result<Vec<PathBuf>> {
    materialize_transcripts_with(dir, videos, |_| {}).await
}

/// [`materialize_transcripts`], calling `on_written` after each file lands.
///
/// A shortcode seen earlier in `videos` is skipped with a warning, so the
/// first occurrence owns the file and every returned path is distinct.
pub async fn materialize_transcripts_with<F>(
    dir: &Path,
    videos: &[VideoRecord],
    mut on_written: F,
) -> Result<Vec<PathBuf>>
where
    F: FnMut(&Path),
{
    let mut seen = HashSet::with_capacity(videos.len());
    let mut paths = Vec::with_capacity(videos.len());
    for video in videos {
        if !seen.insert(video.shortcode.as_str()) {
            tracing::warn!(shortcode = %video.shortcode, "Skipping repeated video shortcode");
            continue;
        }
        let path = write_transcript(dir, video).await?;
        on_written(&path);
        paths.push(path);
    }
    Ok(paths)
}

/// Drop videos whose shortcode already appeared, keeping the first.
pub fn dedupe_by_shortcode(videos: Vec<VideoRecord>) -> Vec<VideoRecord> {
    let before = videos.len();
    let mut seen = HashSet::with_capacity(before);
    let unique: Vec<VideoRecord> = videos
        .into_iter()
        .filter(|v| seen.insert(v.shortcode.clone()))
        .collect();
    if unique.len() < before {
        tracing::warn!(
            dropped = before - unique.len(),
            "Job output repeated video shortcodes"
        );
    }
    unique
}

/// Read transcript files back for the analysis stage
pub async fn read_transcripts(paths: &[PathBuf]) -> Result<Vec<(PathBuf, String)>> {
    let mut contents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = fs::read_to_string(path)
            .await
            .map_err(|e| TrendscopeError::file_io(path, e))?;
        contents.push((path.clone(), text));
    }
    Ok(contents)
}
