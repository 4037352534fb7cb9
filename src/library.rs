use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::UNIX_EPOCH;

use tokio::fs;
use tokio::fs::try_exists;
use tracing::{debug, warn};

use crate::constants::IMAGE_EXTENSIONS;
use crate::error::{AppError, Result};
use crate::models::StagedImage;

/// Create the upload folder if it does not exist yet.
pub async fn ensure_upload_dir(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir.as_ref().to_path_buf();
    if !try_exists(&path).await? {
        fs::create_dir_all(&path).await?;
    }
    Ok(path)
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
        .unwrap_or(false)
}

pub fn sanitize_file_name(file_name: &str) -> Option<String> {
    let trimmed = file_name.trim();
    if trimmed.is_empty()
        || trimmed.contains(['/', '\\'])
        || trimmed.contains("..")
        || trimmed.contains('\0')
    {
        return None;
    }

    Some(trimmed.to_string())
}

/// Append `-1`, `-2`, ... before the extension until the name is free in `dir`.
pub async fn ensure_unique_file_name(dir: &Path, original: &str) -> Result<String> {
    if !try_exists(dir.join(original)).await? {
        return Ok(original.to_string());
    }

    let original_path = Path::new(original);
    let stem = original_path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .unwrap_or("image");
    let extension = original_path.extension().and_then(|ext| ext.to_str());

    let mut counter = 1;
    loop {
        let candidate = match extension {
            Some(ext) => format!("{stem}-{counter}.{ext}"),
            None => format!("{stem}-{counter}"),
        };

        if !try_exists(dir.join(&candidate)).await? {
            return Ok(candidate);
        }

        counter += 1;
    }
}

pub fn resolve_mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_raw()
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Copy the selected files into the upload folder. Non-image selections are
/// skipped with a warning; a copy failure aborts the batch but already copied
/// files stay in place.
pub async fn stage_images(dir: &Path, selection: &[PathBuf]) -> Result<Vec<StagedImage>> {
    if selection.is_empty() {
        return Ok(Vec::new());
    }

    ensure_upload_dir(dir).await?;

    let mut staged = Vec::with_capacity(selection.len());
    for source in selection {
        if !is_image_file(source) {
            warn!("Skipping non-image selection: {}", source.display());
            continue;
        }

        let file_name = source
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(sanitize_file_name)
            .ok_or_else(|| AppError::Upload(format!("Invalid file name: {}", source.display())))?;

        let unique_name = ensure_unique_file_name(dir, &file_name).await?;
        let target = dir.join(&unique_name);
        fs::copy(source, &target).await.map_err(|err| {
            AppError::Upload(format!("Failed to copy '{}': {}", source.display(), err))
        })?;
        let size = fs::metadata(&target).await?.len();
        debug!("Staged '{}' as '{}' ({} bytes)", source.display(), unique_name, size);

        staged.push(StagedImage {
            name: unique_name,
            path: target,
            size,
            mime_type: resolve_mime_type(source),
        });
    }

    Ok(staged)
}

/// Everything in the upload folder with an image mime type, newest first.
pub async fn collect_staged_images(dir: &Path) -> Result<Vec<StagedImage>> {
    let mut images_with_timestamp: Vec<(StagedImage, u128)> = Vec::new();

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }

        let path = entry.path();
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };

        let mime_type = resolve_mime_type(&path);
        if !mime_type.starts_with("image/") {
            continue;
        }

        let modified_time = metadata
            .modified()
            .ok()
            .and_then(|time| time.duration_since(UNIX_EPOCH).ok())
            .map(|duration| duration.as_nanos())
            .unwrap_or(0);

        images_with_timestamp.push((
            StagedImage {
                name,
                path,
                size: metadata.len(),
                mime_type,
            },
            modified_time,
        ));
    }

    images_with_timestamp.sort_by(|a, b| b.1.cmp(&a.1));

    Ok(images_with_timestamp
        .into_iter()
        .map(|(image, _)| image)
        .collect())
}

pub fn open_dir(path: &Path) -> std::io::Result<()> {
    if !path.is_dir() {
        warn!(
            "'{}' is not a directory or does not exist.",
            path.display()
        );
        return Ok(());
    }

    #[cfg(target_os = "windows")]
    {
        Command::new("explorer").arg(path).spawn()?;
    }

    #[cfg(target_os = "macos")]
    {
        Command::new("open").arg(path).spawn()?;
    }

    #[cfg(target_os = "linux")]
    {
        Command::new("xdg-open").arg(path).spawn()?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path, contents: &[u8]) {
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn image_extensions_match_case_insensitively() {
        assert!(is_image_file(Path::new("photo.jpg")));
        assert!(is_image_file(Path::new("photo.JPG")));
        assert!(is_image_file(Path::new("scan.tiff")));
        assert!(!is_image_file(Path::new("notes.txt")));
        assert!(!is_image_file(Path::new("no_extension")));
    }

    #[test]
    fn unknown_extensions_resolve_to_octet_stream() {
        assert_eq!(resolve_mime_type(Path::new("photo.png")), "image/png");
        assert_eq!(
            resolve_mime_type(Path::new("mystery.zzz")),
            "application/octet-stream"
        );
        assert_eq!(
            resolve_mime_type(Path::new("no_extension")),
            "application/octet-stream"
        );
    }

    #[test]
    fn sanitize_rejects_path_tricks() {
        assert_eq!(sanitize_file_name("cat.png"), Some("cat.png".to_string()));
        assert_eq!(sanitize_file_name("  cat.png  "), Some("cat.png".to_string()));
        assert_eq!(sanitize_file_name("ünïcode 猫.png"), Some("ünïcode 猫.png".to_string()));
        assert_eq!(sanitize_file_name(""), None);
        assert_eq!(sanitize_file_name("a/b.png"), None);
        assert_eq!(sanitize_file_name("a\\b.png"), None);
        assert_eq!(sanitize_file_name("..png"), None);
        assert_eq!(sanitize_file_name("a\0b.png"), None);
    }

    #[tokio::test]
    async fn unique_names_get_numeric_suffixes() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("cat.png"), b"x");
        touch(&dir.path().join("cat-1.png"), b"x");

        let name = ensure_unique_file_name(dir.path(), "cat.png").await.unwrap();
        assert_eq!(name, "cat-2.png");

        let free = ensure_unique_file_name(dir.path(), "dog.png").await.unwrap();
        assert_eq!(free, "dog.png");
    }

    #[tokio::test]
    async fn staging_copies_into_the_upload_folder() {
        let source_dir = tempfile::tempdir().unwrap();
        let upload_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("cat.png");
        touch(&source, b"png bytes");

        let staged = stage_images(upload_dir.path(), &[source.clone()])
            .await
            .unwrap();

        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].name, "cat.png");
        assert_eq!(staged[0].size, 9);
        assert_eq!(staged[0].mime_type, "image/png");
        assert_eq!(staged[0].path, upload_dir.path().join("cat.png"));
        assert!(staged[0].path.exists());
        // The source is untouched.
        assert!(source.exists());
    }

    #[tokio::test]
    async fn staging_the_same_name_twice_keeps_both_copies() {
        let source_dir = tempfile::tempdir().unwrap();
        let upload_dir = tempfile::tempdir().unwrap();
        let source = source_dir.path().join("cat.png");
        touch(&source, b"png bytes");

        let first = stage_images(upload_dir.path(), &[source.clone()])
            .await
            .unwrap();
        let second = stage_images(upload_dir.path(), &[source]).await.unwrap();

        assert_eq!(first[0].name, "cat.png");
        assert_eq!(second[0].name, "cat-1.png");
        assert!(upload_dir.path().join("cat.png").exists());
        assert!(upload_dir.path().join("cat-1.png").exists());
    }

    #[tokio::test]
    async fn staging_skips_non_image_files() {
        let source_dir = tempfile::tempdir().unwrap();
        let upload_dir = tempfile::tempdir().unwrap();
        let text = source_dir.path().join("notes.txt");
        let image = source_dir.path().join("cat.png");
        touch(&text, b"hi");
        touch(&image, b"png bytes");

        let staged = stage_images(upload_dir.path(), &[text.clone(), image])
            .await
            .unwrap();

        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].name, "cat.png");
        assert!(!upload_dir.path().join("notes.txt").exists());
    }

    #[tokio::test]
    async fn staging_a_missing_source_names_the_file() {
        let upload_dir = tempfile::tempdir().unwrap();
        let missing = PathBuf::from("/definitely/not/here/cat.png");

        let err = stage_images(upload_dir.path(), &[missing]).await.unwrap_err();
        assert!(matches!(err, AppError::Upload(_)));
        assert!(err.to_string().contains("cat.png"));
    }

    #[tokio::test]
    async fn staging_an_empty_selection_is_a_no_op() {
        let upload_dir = tempfile::tempdir().unwrap();
        let staged = stage_images(upload_dir.path(), &[]).await.unwrap();
        assert!(staged.is_empty());
    }

    #[tokio::test]
    async fn collected_images_come_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("older.png"), b"a");
        tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        touch(&dir.path().join("newer.jpg"), b"bb");
        touch(&dir.path().join("skip.txt"), b"not an image");

        let images = collect_staged_images(dir.path()).await.unwrap();
        let names: Vec<&str> = images.iter().map(|image| image.name.as_str()).collect();
        assert_eq!(names, vec!["newer.jpg", "older.png"]);
        assert_eq!(images[0].size, 2);
    }

    #[tokio::test]
    async fn ensure_upload_dir_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");

        let created = ensure_upload_dir(&nested).await.unwrap();
        assert_eq!(created, nested);
        assert!(nested.is_dir());

        // Idempotent on the second call.
        ensure_upload_dir(&nested).await.unwrap();
    }
}
