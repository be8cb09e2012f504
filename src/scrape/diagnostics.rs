//! Debug snapshots for pages that failed to load or were blocked.

use super::PageError;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Writes page snapshots to a debug directory. Never fails the caller.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    dir: Option<PathBuf>,
}

impl Diagnostics {
    pub fn new(dir: Option<PathBuf>) -> Self {
        Self { dir }
    }

    /// Snapshots are dropped.
    pub fn disabled() -> Self {
        Self { dir: None }
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    /// Records `error` for attempt `attempt` (1-based) at page `page` of
    /// `source_label`.
    ///
    /// Rendered HTML is written as `.html`; otherwise the error text goes
    /// into a `.txt` file. Returns the written path.
    pub async fn capture(
        &self,
        source_label: &str,
        page: u32,
        attempt: usize,
        error: &PageError,
    ) -> Option<PathBuf> {
        let dir = self.dir.as_ref()?;

        let (ext, contents) = match error.snapshot() {
            Some(html) => ("html", html.to_string()),
            None => ("txt", error.to_string()),
        };

        let name = format!(
            "{}_{}_p{}_a{}_{}.{}",
            Utc::now().format("%Y%m%dT%H%M%S%.3fZ"),
            slug(source_label),
            page,
            attempt,
            error.kind(),
            ext
        );
        let path = dir.join(name);

        if let Err(e) = tokio::fs::create_dir_all(dir).await {
            warn!("Could not create debug directory {}: {}", dir.display(), e);
            return None;
        }

        match tokio::fs::write(&path, contents).await {
            Ok(()) => {
                debug!("Saved diagnostic snapshot {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not write diagnostic snapshot {}: {}", path.display(), e);
                None
            }
        }
    }
}

/// File-name-safe form of a source label.
fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let out = out.trim_matches('-');
    if out.is_empty() {
        "source".to_string()
    } else {
        out.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_slug() {
        assert_eq!(slug("Placas de Vídeo / GPUs"), "placas-de-v-deo-gpus");
        assert_eq!(slug("  "), "source");
        assert_eq!(slug("mice"), "mice");
    }

    #[tokio::test]
    async fn test_captures_html_snapshot() {
        let dir = TempDir::new().unwrap();
        let diagnostics = Diagnostics::new(Some(dir.path().join("debug")));
        let error = PageError::Captcha { url: "u".into(), html: "<form>captcha</form>".into() };

        let path = diagnostics.capture("GPUs", 3, 2, &error).await.unwrap();
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_gpus_p3_a2_captcha.html"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<form>captcha</form>");
    }

    #[tokio::test]
    async fn test_captures_text_without_html() {
        let dir = TempDir::new().unwrap();
        let diagnostics = Diagnostics::new(Some(dir.path().to_path_buf()));
        let error = PageError::Network { url: "http://x".into(), message: "timed out".into() };

        let path = diagnostics.capture("mice", 1, 1, &error).await.unwrap();
        assert_eq!(path.extension().unwrap(), "txt");
        assert!(std::fs::read_to_string(&path).unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_disabled_writes_nothing() {
        let error = PageError::Blocked { url: "u".into(), status: 403 };
        assert!(Diagnostics::disabled().capture("x", 1, 1, &error).await.is_none());
    }
}
