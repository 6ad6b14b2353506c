use std::io;
use std::path::{Component, Path, PathBuf};

/// URL prefix under which uploaded business images are referenced.
pub const UPLOADS_PREFIX: &str = "/uploads/";

/// Image files stored on local disk and referenced from business rows.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn ensure_root(&self) -> io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await
    }

    /// Maps `/uploads/<file>` to a path inside the root. Anything that could
    /// escape the root resolves to `None`.
    pub fn resolve(&self, image_url: &str) -> Option<PathBuf> {
        let file_name = image_url.strip_prefix(UPLOADS_PREFIX)?;
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Some(self.root.join(name)),
            _ => None,
        }
    }

    /// Deletes the file behind a stored image reference. Failures are logged
    /// and swallowed; the owning row is already gone by the time this runs.
    pub async fn release(&self, image_url: &str) {
        let Some(path) = self.resolve(image_url) else {
            log::warn!("Ignoring image reference outside uploads: {image_url}");
            return;
        };

        match tokio::fs::remove_file(&path).await {
            Ok(()) => log::info!("Released image {}", path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::debug!("Image {} already gone", path.display())
            }
            Err(err) => log::warn!("Failed to release image {}: {err}", path.display()),
        }
    }
}
