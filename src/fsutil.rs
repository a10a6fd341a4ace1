use anyhow::Result;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub async fn file_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}

pub async fn dir_exists(path: &Path) -> bool {
    fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

pub async fn ensure_dir(path: &Path) -> Result<()> {
    if !dir_exists(path).await {
        fs::create_dir_all(path).await?;
    }
    Ok(())
}

pub async fn list_files_with_ext(dir: &Path, ext1: &str, ext2: &str) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    if !dir_exists(dir).await {
        return Ok(out);
    }

    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.is_file() {
            if let Some(ext) = path.extension().and_then(OsStr::to_str) {
                let ext_lower = ext.to_ascii_lowercase();
                if ext_lower == ext1.trim_start_matches('.') || ext_lower == ext2.trim_start_matches('.') {
                    out.push(path);
                }
            }
        }
    }

    out.sort();
    Ok(out)
}

/// Remove everything under `dir_path` except the top-level file named
/// `keep_name`, leaving the directory itself.
pub async fn prune_dir_except(dir_path: &Path, keep_name: &str) -> Result<()> {
    if !dir_exists(dir_path).await {
        return Ok(());
    }

    for entry in WalkDir::new(dir_path).min_depth(1).contents_first(true) {
        let entry = entry?;
        let path = entry.path();
        if entry.depth() == 1 && path.file_name().and_then(OsStr::to_str) == Some(keep_name) {
            continue;
        }
        if path.is_dir() {
            fs::remove_dir(path).await.ok();
        } else {
            fs::remove_file(path).await.ok();
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_files_with_ext_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["002.mp3", "001.mp3", "notes.txt", "003.M4A"] {
            fs::write(dir.path().join(name), b"x").await.unwrap();
        }

        let found = list_files_with_ext(dir.path(), ".mp3", ".m4a").await.unwrap();
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["001.mp3", "002.mp3", "003.M4A"]);
    }

    #[tokio::test]
    async fn prune_dir_except_keeps_only_named_file() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("audio");
        fs::create_dir_all(&sub).await.unwrap();
        fs::write(sub.join("001.mp3"), b"x").await.unwrap();
        fs::write(dir.path().join("story.txt"), b"x").await.unwrap();
        fs::write(dir.path().join("job.json"), b"{}").await.unwrap();

        prune_dir_except(dir.path(), "job.json").await.unwrap();

        assert!(dir_exists(dir.path()).await);
        assert!(file_exists(&dir.path().join("job.json")).await);
        assert!(!file_exists(&dir.path().join("story.txt")).await);
        assert!(!dir_exists(&sub).await);
    }
}
