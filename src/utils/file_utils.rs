use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ScrapeDashError, ScrapeDashResult};

/// Numbered names tried after the plain one is taken
const MAX_NAME_SUFFIX: u32 = 1_000;

/// File utility functions
pub struct FileUtils;

impl FileUtils {
    /// Write `bytes` under `path`, or under `name-1.ext`, `name-2.ext`, ...
    /// when that name is already taken, and return the path written.
    ///
    /// Readers never see a partial file and an existing file is never
    /// replaced. `tag` keeps the staging file of concurrent writers apart.
    pub async fn write_new<P: AsRef<Path>>(path: P, bytes: &[u8], tag: &str) -> ScrapeDashResult<PathBuf> {
        let path = path.as_ref();
        let staging = Self::staging_path(path, tag);

        if let Err(source) = tokio::fs::write(&staging, bytes).await {
            return Err(ScrapeDashError::FileWrite {
                path: staging.display().to_string(),
                source,
            });
        }

        let result = Self::link_first_free(&staging, path).await;
        // The staging name goes away whether or not a link was made
        let _ = tokio::fs::remove_file(&staging).await;

        let target = result?;
        debug!("Wrote {} bytes to {}", bytes.len(), target.display());
        Ok(target)
    }

    async fn link_first_free(staging: &Path, path: &Path) -> ScrapeDashResult<PathBuf> {
        for n in 0..=MAX_NAME_SUFFIX {
            let candidate = Self::numbered_path(path, n);
            // hard_link fails instead of replacing an existing target
            match tokio::fs::hard_link(staging, &candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("{} exists, trying the next name", candidate.display());
                }
                Err(source) => {
                    return Err(ScrapeDashError::FileWrite {
                        path: candidate.display().to_string(),
                        source,
                    })
                }
            }
        }

        Err(ScrapeDashError::FileWrite {
            path: path.display().to_string(),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name left"),
        })
    }

    /// `path` itself for 0, otherwise `stem-n.ext` next to it
    fn numbered_path(path: &Path, n: u32) -> PathBuf {
        if n == 0 {
            return path.to_path_buf();
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = match path.extension() {
            Some(ext) => format!("{}-{}.{}", stem, n, ext.to_string_lossy()),
            None => format!("{}-{}", stem, n),
        };
        path.with_file_name(name)
    }

    /// Hidden `.name.tag.part` file next to `path`
    fn staging_path(path: &Path, tag: &str) -> PathBuf {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}.part", name, tag))
    }
}
