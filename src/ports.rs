use crate::domain::Container;
use crate::errors::{RegistryError, RuntimeError};
use async_trait::async_trait;
use mockall::automock;
use std::collections::HashMap;

/// Container runtime operations the update checker needs.
///
/// Implementations are shared between concurrent checks, so they must be
/// safe to call from several tasks at once. Cancellation is done by
/// dropping the returned future.
#[automock]
#[async_trait]
pub trait RuntimePort: Send + Sync {
    async fn list_containers(&self) -> Result<Vec<Container>, RuntimeError>;

    /// True when the image was built locally and has no registry origin.
    async fn is_local_image(&self, image_ref: &str) -> Result<bool, RuntimeError>;

    /// The concrete version behind an image's tag, usually taken from the
    /// `org.opencontainers.image.version` label. Empty when unknown.
    async fn get_image_version(&self, image_name: &str) -> Result<String, RuntimeError>;

    /// The registry digest of the locally stored image. Empty when unknown.
    async fn get_image_digest(&self, image_name: &str) -> Result<String, RuntimeError>;

    async fn close(&self) -> Result<(), RuntimeError>;
}

/// Image registry operations the update checker needs.
///
/// `image` arguments are repository references without a tag, for
/// example `docker.io/library/nginx`.
#[automock]
#[async_trait]
pub trait RegistryPort: Send + Sync {
    async fn list_tags(&self, image: &str) -> Result<Vec<String>, RegistryError>;

    /// The most recent tag, which by convention is the first one listed.
    async fn get_latest_tag(&self, image: &str) -> Result<String, RegistryError> {
        self.list_tags(image)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RegistryError::NoTags(image.to_string()))
    }

    async fn get_tag_digest(&self, image_ref: &str, tag: &str) -> Result<String, RegistryError>;

    /// Every tag mapped to the digests it resolves to. Tags whose digest
    /// lookup fails are left out.
    async fn list_tags_with_digests(
        &self,
        image_ref: &str,
    ) -> Result<HashMap<String, Vec<String>>, RegistryError> {
        let mut out = HashMap::new();
        for tag in self.list_tags(image_ref).await? {
            if let Ok(digest) = self.get_tag_digest(image_ref, &tag).await {
                out.entry(tag).or_insert_with(Vec::new).push(digest);
            }
        }
        Ok(out)
    }
}
