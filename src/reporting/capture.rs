//! Page capture - renders URLs and local HTML files to PNG
//!
//! The Chrome process is owned by a single capture call and dropped when the
//! call returns, on success or error, so a failed navigation never leaks a
//! browser.

use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    pub viewport: (u32, u32),
    pub user_agent: String,
    pub navigation_timeout: Duration,
    /// Pause after navigation so client-side rendering settles.
    pub settle: Duration,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            viewport: (1920, 1080),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            navigation_timeout: Duration::from_secs(30),
            settle: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("screenshot failed: {0}")]
    Screenshot(String),
    #[error("cannot resolve {path}: {source}")]
    Path {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("capture task panicked")]
    TaskPanicked,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PageCapturer: Send + Sync {
    /// Screenshot of a remote page.
    async fn capture_url(&self, url: &str) -> Result<Vec<u8>, CaptureError>;

    /// Screenshot of a local HTML file.
    async fn capture_file(&self, path: &Path) -> Result<Vec<u8>, CaptureError>;
}

// ─── Headless Chrome ─────────────────────────────────────────────────────────

pub struct HeadlessCapturer {
    options: CaptureOptions,
}

impl HeadlessCapturer {
    pub fn new(options: CaptureOptions) -> Self {
        Self { options }
    }

    async fn capture(&self, url: String) -> Result<Vec<u8>, CaptureError> {
        let options = self.options.clone();
        // headless_chrome is synchronous
        tokio::task::spawn_blocking(move || capture_sync(&url, &options))
            .await
            .map_err(|_| CaptureError::TaskPanicked)?
    }
}

fn capture_sync(url: &str, options: &CaptureOptions) -> Result<Vec<u8>, CaptureError> {
    let launch = LaunchOptions::default_builder()
        .headless(true)
        .window_size(Some(options.viewport))
        .idle_browser_timeout(options.navigation_timeout * 2)
        .build()
        .map_err(|e| CaptureError::Launch(e.to_string()))?;
    let browser = Browser::new(launch).map_err(|e| CaptureError::Launch(e.to_string()))?;

    let tab = browser
        .new_tab()
        .map_err(|e| CaptureError::Launch(e.to_string()))?;
    tab.set_default_timeout(options.navigation_timeout);

    let nav_err = |e: anyhow::Error| CaptureError::Navigation {
        url: url.to_string(),
        reason: e.to_string(),
    };
    tab.set_user_agent(&options.user_agent, None, None)
        .map_err(nav_err)?;
    tab.navigate_to(url).map_err(nav_err)?;
    tab.wait_until_navigated().map_err(nav_err)?;

    std::thread::sleep(options.settle);

    let png = tab
        .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
        .map_err(|e| CaptureError::Screenshot(e.to_string()))?;
    let _ = tab.close(true);

    debug!("[CAPTURE] {} → {} bytes", url, png.len());
    Ok(png)
}

#[async_trait]
impl PageCapturer for HeadlessCapturer {
    async fn capture_url(&self, url: &str) -> Result<Vec<u8>, CaptureError> {
        self.capture(url.to_string()).await
    }

    async fn capture_file(&self, path: &Path) -> Result<Vec<u8>, CaptureError> {
        let absolute = tokio::fs::canonicalize(path)
            .await
            .map_err(|source| CaptureError::Path {
                path: path.to_path_buf(),
                source,
            })?;
        self.capture(format!("file://{}", absolute.display())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let opts = CaptureOptions::default();
        assert_eq!(opts.viewport, (1920, 1080));
        assert_eq!(opts.navigation_timeout, Duration::from_secs(30));
        assert!(opts.user_agent.contains("Chrome"));
    }

    #[tokio::test]
    async fn test_missing_file_fails_before_launch() {
        let capturer = HeadlessCapturer::new(CaptureOptions::default());
        let err = capturer
            .capture_file(Path::new("/definitely/not/here.html"))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Path { .. }));
    }
}
