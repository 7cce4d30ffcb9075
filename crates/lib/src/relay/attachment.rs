//! Attachment retrieval: metadata check, size policy, and the locked-resource download loop.
//!
//! Webex malware-scans uploads asynchronously. Until the scan finishes, downloads answer
//! 423 with a retry-after. The loop retries for as long as the caller lets it run; the
//! host's per-event deadline is what stops a scan that never finishes, unless an attempt
//! cap is configured.

use crate::webex::{Download, Platform, WebexError};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;

/// Hard limit: anything larger is rejected without downloading.
pub const MAX_ATTACHMENT_BYTES: u64 = 100 * 1024 * 1024;
/// Soft limit: larger files get a "this may take a while" notice.
pub const WARN_ATTACHMENT_BYTES: u64 = 50 * 1024 * 1024;

pub const LARGE_FILE_NOTICE: &str = "☣️ Malware scanning can take a while on larger files";

const FALLBACK_FILE_NAME: &str = "attachment";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentPolicy {
    pub max_bytes: u64,
    pub warn_bytes: u64,
    /// `None` retries locked downloads until the host deadline fires.
    pub max_locked_attempts: Option<u32>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            max_bytes: MAX_ATTACHMENT_BYTES,
            warn_bytes: WARN_ATTACHMENT_BYTES,
            max_locked_attempts: None,
        }
    }
}

/// Waits between locked download attempts. Injected so tests don't actually sleep.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Notified when the metadata check finds a file above the soft limit.
#[async_trait]
pub trait RetrievalObserver: Send + Sync {
    async fn large_attachment(&self, size_bytes: u64);
}

/// A downloaded attachment in its own temporary directory. Dropping it deletes the
/// directory and the file, so every exit path after staging cleans up exactly once.
#[derive(Debug)]
pub struct StagedAttachment {
    name: String,
    size_bytes: u64,
    path: PathBuf,
    _dir: TempDir,
}

impl StagedAttachment {
    fn create(name: String, size_bytes: u64) -> std::io::Result<Self> {
        let dir = tempfile::Builder::new().prefix("herald-").tempdir()?;
        let path = dir.path().join(&name);
        Ok(Self {
            name,
            size_bytes,
            path,
            _dir: dir,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StagedAttachment {
    fn drop(&mut self) {
        log::debug!("removing staged attachment {}", self.path.display());
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    #[error("only one file attachment is supported, got {0}")]
    TooManyAttachments(usize),
    #[error("HTTPError 500 - Maximum upload size of {}MB exceeded ({} bytes)", .limit / (1024 * 1024), .size)]
    TooLarge { size: u64, limit: u64 },
    #[error("{0}")]
    Metadata(WebexError),
    #[error("{0}")]
    Download(WebexError),
    #[error("attachment still locked for scanning after {0} attempts")]
    StillLocked(u32),
    #[error("could not stage attachment: {0}")]
    Staging(#[from] std::io::Error),
}

impl RetrievalError {
    /// Text posted back to the admin room.
    pub fn admin_message(&self) -> String {
        match self {
            RetrievalError::TooManyAttachments(_) => {
                "💾 Webex API only supports **1** file attachment.".to_string()
            }
            other => super::api_error(other),
        }
    }
}

/// Explicit states of one retrieval.
#[derive(Debug)]
pub enum RetrievalState {
    Inspecting,
    Downloading {
        staged: StagedAttachment,
        attempt: u32,
    },
    WaitingOnLock {
        staged: StagedAttachment,
        attempt: u32,
        retry_after: Duration,
    },
    Done(StagedAttachment),
    Failed(RetrievalError),
}

/// Zero files: nothing to retrieve. More than one: rejected before any request.
pub fn single_attachment(files: &[String]) -> Result<Option<&str>, RetrievalError> {
    match files {
        [] => Ok(None),
        [url] => Ok(Some(url.as_str())),
        more => Err(RetrievalError::TooManyAttachments(more.len())),
    }
}

/// Pull the file name out of a `content-disposition` value, keeping only the final path component.
pub fn file_name_from_disposition(value: &str) -> Option<String> {
    let start = value.find("filename=")? + "filename=".len();
    let rest = &value[start..];
    let raw = match rest.strip_prefix('"') {
        Some(quoted) => &quoted[..quoted.find('"')?],
        None => rest.split(';').next().unwrap_or("").trim(),
    };
    let name = Path::new(raw).file_name()?.to_str()?.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

pub struct AttachmentRetriever<'a> {
    platform: &'a dyn Platform,
    sleeper: &'a dyn Sleeper,
    policy: AttachmentPolicy,
}

impl<'a> AttachmentRetriever<'a> {
    pub fn new(platform: &'a dyn Platform, sleeper: &'a dyn Sleeper, policy: AttachmentPolicy) -> Self {
        Self {
            platform,
            sleeper,
            policy,
        }
    }

    /// Drive the state machine from `Inspecting` to `Done` or `Failed`.
    pub async fn retrieve(
        &self,
        url: &str,
        observer: &dyn RetrievalObserver,
    ) -> Result<StagedAttachment, RetrievalError> {
        let mut state = RetrievalState::Inspecting;
        loop {
            state = match state {
                RetrievalState::Inspecting => self.inspect(url, observer).await,
                RetrievalState::Downloading { staged, attempt } => {
                    self.download(url, staged, attempt).await
                }
                RetrievalState::WaitingOnLock {
                    staged,
                    attempt,
                    retry_after,
                } => {
                    log::info!(
                        "attachment locked for scanning, retrying in {}s",
                        retry_after.as_secs()
                    );
                    self.sleeper.sleep(retry_after).await;
                    RetrievalState::Downloading {
                        staged,
                        attempt: attempt + 1,
                    }
                }
                RetrievalState::Done(staged) => return Ok(staged),
                RetrievalState::Failed(err) => return Err(err),
            };
        }
    }

    async fn inspect(&self, url: &str, observer: &dyn RetrievalObserver) -> RetrievalState {
        let meta = match self.platform.head_attachment(url).await {
            Ok(meta) => meta,
            Err(e) => return RetrievalState::Failed(RetrievalError::Metadata(e)),
        };
        let size = meta.size_bytes.unwrap_or(0);
        log::info!("attachment size is {} bytes", size);
        if size > self.policy.max_bytes {
            return RetrievalState::Failed(RetrievalError::TooLarge {
                size,
                limit: self.policy.max_bytes,
            });
        }
        if size > self.policy.warn_bytes {
            observer.large_attachment(size).await;
        }
        let name = meta
            .content_disposition
            .as_deref()
            .and_then(file_name_from_disposition)
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());
        match StagedAttachment::create(name, size) {
            Ok(staged) => RetrievalState::Downloading { staged, attempt: 1 },
            Err(e) => RetrievalState::Failed(RetrievalError::Staging(e)),
        }
    }

    async fn download(&self, url: &str, mut staged: StagedAttachment, attempt: u32) -> RetrievalState {
        log::info!("attempting to download and save attachment (attempt {})", attempt);
        match self.platform.download_attachment(url, staged.path()).await {
            Ok(Download::Saved { bytes }) => {
                staged.size_bytes = bytes;
                RetrievalState::Done(staged)
            }
            Ok(Download::Locked { retry_after }) => match self.policy.max_locked_attempts {
                Some(max) if attempt >= max => {
                    RetrievalState::Failed(RetrievalError::StillLocked(attempt))
                }
                _ => RetrievalState::WaitingOnLock {
                    staged,
                    attempt,
                    retry_after,
                },
            },
            Err(e) => RetrievalState::Failed(RetrievalError::Download(e)),
        }
    }
}
