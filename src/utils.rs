use anyhow::Result;
use std::path::{Path, PathBuf};
use url::Url;

/// Derives a destination filename from the last URL path segment, falling
/// back to a generated name when the path carries none.
pub fn filename_from_url(url_str: &str) -> Result<String> {
    let url = Url::parse(url_str)?;

    if let Some(segments) = url.path_segments() {
        if let Some(filename) = segments.last() {
            if !filename.is_empty() {
                return Ok(sanitize_filename(filename));
            }
        }
    }

    Ok(format!("download_{}", uuid::Uuid::new_v4()))
}

pub fn sanitize_filename(filename: &str) -> String {
    filename.replace(|c: char| !c.is_alphanumeric() && c != '.' && c != '-' && c != '_', "_")
}

/// Appends a counter to the stem until the path no longer exists, so a new
/// download never clobbers a finished one.
pub fn unique_filepath(dir: &Path, filename: &str) -> PathBuf {
    let mut path = dir.join(filename);
    let mut counter = 1;

    while path.exists() {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| filename.to_string());
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();

        let next = if extension.is_empty() {
            format!("{}_{}", stem, counter)
        } else {
            format!("{}_{}.{}", stem, counter, extension)
        };

        path = dir.join(next);
        counter += 1;
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_comes_from_last_path_segment() {
        let name = filename_from_url("https://example.com/videos/movie.mp4?token=x").unwrap();
        assert_eq!(name, "movie.mp4");
    }

    #[test]
    fn hostile_characters_are_sanitized() {
        assert_eq!(sanitize_filename("a b/c:d.mp4"), "a_b_c_d.mp4");
    }

    #[test]
    fn bare_host_gets_generated_name() {
        let name = filename_from_url("https://example.com/").unwrap();
        assert!(name.starts_with("download_"));
    }
}
