use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const DEFAULT_REGISTRY: &str = "docker.io";
pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageRefError {
    #[error("Empty image reference")]
    Empty,

    #[error("Image reference '{0}' has no repository")]
    MissingRepository(String),
}

/// A parsed `[registry/]repository[:tag][@digest]` reference.
///
/// `tag` defaults to `latest`, except for references pinned only by
/// digest, where it stays empty.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ImageRef {
    pub registry: String,
    pub repository: String,
    pub tag: String,
    pub digest: Option<String>,
}

impl ImageRef {
    /// `registry/repository` without tag or digest, the form registry
    /// clients take.
    #[must_use]
    pub fn repository_path(&self) -> String {
        format!("{}/{}", self.registry, self.repository)
    }

    /// Images under `localhost/` are what podman assigns to locally built
    /// images that were never pushed anywhere.
    #[must_use]
    pub fn is_localhost(&self) -> bool {
        self.registry == "localhost"
    }
}

impl FromStr for ImageRef {
    type Err = ImageRefError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(ImageRefError::Empty);
        }

        let (name_and_tag, digest) = match raw.split_once('@') {
            Some((name, digest)) => (name, Some(digest.to_string())),
            None => (raw, None),
        };

        // A ':' before the last '/' belongs to a registry port, not a tag.
        let last_slash = name_and_tag.rfind('/').map_or(0, |idx| idx + 1);
        let (name, tag) = match name_and_tag[last_slash..].rfind(':') {
            Some(idx) => {
                let split = last_slash + idx;
                (&name_and_tag[..split], &name_and_tag[split + 1..])
            }
            None => (name_and_tag, ""),
        };

        let (registry, repository) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first.to_string(), rest.to_string())
            }
            _ => (DEFAULT_REGISTRY.to_string(), name.to_string()),
        };

        if repository.is_empty() {
            return Err(ImageRefError::MissingRepository(raw.to_string()));
        }

        let repository = if registry == DEFAULT_REGISTRY && !repository.contains('/') {
            format!("library/{repository}")
        } else {
            repository
        };

        let tag = if tag.is_empty() && digest.is_none() {
            DEFAULT_TAG.to_string()
        } else {
            tag.to_string()
        };

        Ok(Self {
            registry,
            repository,
            tag,
            digest,
        })
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if !self.tag.is_empty() {
            write!(f, ":{}", self.tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}
