//! Session-scoped file naming and background music selection.

use std::path::{Path, PathBuf};

use rand::seq::IndexedRandom;
use tokio::fs;
use tracing::{debug, info};

use promo_models::SessionId;

use crate::error::MediaResult;

/// Audio extensions accepted as background music.
pub const MUSIC_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "ogg", "flac"];

/// Resolves every path written during one render under a shared session id.
#[derive(Debug, Clone)]
pub struct AssetResolver {
    work_dir: PathBuf,
    session: SessionId,
}

impl AssetResolver {
    /// Resolver for a fresh session.
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self::with_session(work_dir, SessionId::new())
    }

    pub fn with_session(work_dir: impl Into<PathBuf>, session: SessionId) -> Self {
        Self {
            work_dir: work_dir.into(),
            session,
        }
    }

    pub fn session(&self) -> &SessionId {
        &self.session
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    fn scoped(&self, stem: &str, ext: &str) -> PathBuf {
        self.work_dir
            .join(format!("{}_{}.{}", self.session, stem, ext.trim_start_matches('.')))
    }

    /// Downloaded or generated product image `index`.
    pub fn image_path(&self, index: usize, ext: &str) -> PathBuf {
        self.scoped(&format!("image_{:03}", index), ext)
    }

    /// Narration file for a named variant (e.g. `full`, `short`).
    pub fn voiceover_path(&self, variant: &str) -> PathBuf {
        self.scoped(&format!("voiceover_{}", variant), "mp3")
    }

    pub fn output_video_path(&self) -> PathBuf {
        self.scoped("promo", "mp4")
    }

    pub fn thumbnail_path(&self) -> PathBuf {
        self.scoped("thumb", "jpg")
    }

    pub fn code_image_path(&self) -> PathBuf {
        self.scoped("code", "png")
    }

    /// Files in the work directory that belong to this session.
    pub async fn session_files(&self) -> MediaResult<Vec<PathBuf>> {
        session_files(&self.work_dir, &self.session).await
    }

    /// Delete every file of this session. Returns the number removed.
    pub async fn remove_session_files(&self) -> MediaResult<usize> {
        let files = self.session_files().await?;
        for file in &files {
            fs::remove_file(file).await?;
        }
        debug!(session_id = %self.session, removed = files.len(), "Removed session files");
        Ok(files.len())
    }
}

/// Recover the session id embedded in a file name.
pub fn parse_session_id(path: impl AsRef<Path>) -> Option<SessionId> {
    path.as_ref()
        .file_name()
        .and_then(|name| name.to_str())
        .and_then(SessionId::find_in)
}

/// Files directly under `dir` whose names carry `session`.
pub async fn session_files(dir: &Path, session: &SessionId) -> MediaResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
        Err(e) => return Err(e.into()),
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && parse_session_id(&path).as_ref() == Some(session) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

fn is_music_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| MUSIC_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Pick a random music file from `dir`.
///
/// A missing, unreadable or empty directory disables background music
/// instead of failing the render.
pub async fn select_background_music(dir: impl AsRef<Path>) -> Option<PathBuf> {
    let dir = dir.as_ref();

    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            info!(dir = %dir.display(), error = %e, "Music directory unavailable, background music disabled");
            return None;
        }
    };

    let mut candidates = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        if is_music_file(&path) {
            candidates.push(path);
        }
    }
    candidates.sort();

    let choice = candidates.choose(&mut rand::rng()).cloned();
    match &choice {
        Some(path) => debug!(track = %path.display(), candidates = candidates.len(), "Selected background music"),
        None => info!(dir = %dir.display(), "No music files found, background music disabled"),
    }
    choice
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_share_session_id() {
        let resolver = AssetResolver::new("/tmp/work");
        let session = resolver.session().clone();

        let paths = [
            resolver.image_path(0, "jpg"),
            resolver.image_path(11, ".png"),
            resolver.voiceover_path("full"),
            resolver.output_video_path(),
            resolver.thumbnail_path(),
            resolver.code_image_path(),
        ];
        for path in &paths {
            assert_eq!(parse_session_id(path).as_ref(), Some(&session));
            assert!(path.starts_with("/tmp/work"));
        }
        assert!(resolver.image_path(11, ".png").to_string_lossy().ends_with("_image_011.png"));
    }

    #[test]
    fn test_parse_session_id_rejects_foreign_names() {
        assert!(parse_session_id("/tmp/random_file.mp4").is_none());
        assert!(parse_session_id("/tmp/").is_none());
    }

    #[tokio::test]
    async fn test_session_files_and_cleanup() {
        let dir = TempDir::new().unwrap();
        let ours = AssetResolver::new(dir.path());
        let theirs = AssetResolver::new(dir.path());

        fs::write(ours.image_path(0, "jpg"), b"a").await.unwrap();
        fs::write(ours.output_video_path(), b"b").await.unwrap();
        fs::write(theirs.image_path(0, "jpg"), b"c").await.unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"d").await.unwrap();

        assert_eq!(ours.session_files().await.unwrap().len(), 2);
        assert_eq!(ours.remove_session_files().await.unwrap(), 2);
        assert!(ours.session_files().await.unwrap().is_empty());
        assert_eq!(theirs.session_files().await.unwrap().len(), 1);
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[tokio::test]
    async fn test_select_background_music() {
        let dir = TempDir::new().unwrap();
        assert!(select_background_music(dir.path()).await.is_none());

        fs::write(dir.path().join("notes.txt"), b"x").await.unwrap();
        assert!(select_background_music(dir.path()).await.is_none());

        fs::write(dir.path().join("bed.MP3"), b"x").await.unwrap();
        fs::write(dir.path().join("calm.ogg"), b"x").await.unwrap();
        let picked = select_background_music(dir.path()).await.unwrap();
        assert!(is_music_file(&picked));
    }

    #[tokio::test]
    async fn test_missing_music_dir_disables_feature() {
        assert!(select_background_music("/nonexistent/music").await.is_none());
    }
}
