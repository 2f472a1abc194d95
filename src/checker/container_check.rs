use crate::compose::extract_service_name;
use crate::domain::image_ref::DEFAULT_TAG;
use crate::domain::{Container, ContainerUpdate, ImageRef};
use crate::errors::RegistryError;
use crate::ports::{RegistryPort, RuntimePort};
use crate::utils::check_logger::CheckLogger;
use crate::version;

/// Check one container against its registry.
///
/// Never returns an error: anything that goes wrong talking to the runtime
/// or the registry becomes a `CheckFailed` row carrying the message.
pub async fn check_container(
    runtime: &dyn RuntimePort,
    registry: &dyn RegistryPort,
    container: &Container,
    logger: &dyn CheckLogger,
) -> ContainerUpdate {
    let row = ContainerUpdate::for_container(container, extract_service_name(container));

    match runtime.is_local_image(&container.image).await {
        Ok(true) => {
            logger.debug(&format!(
                "{}: image {} is local, skipping",
                container.name, container.image
            ));
            return row.skipped();
        }
        Ok(false) => {}
        Err(e) => {
            return row.failed(format!(
                "failed to inspect image {}: {e}",
                container.image
            ));
        }
    }

    let image: ImageRef = match container.image.parse() {
        Ok(image) => image,
        Err(e) => return row.failed(format!("invalid image reference: {e}")),
    };

    let mut row = row;
    row.current_version = image.tag.clone();
    row.current_digest = image.digest.clone().unwrap_or_default();

    match runtime.get_image_version(&container.image).await {
        Ok(resolved) => row.resolved_version = resolved,
        Err(e) => logger.debug(&format!(
            "{}: no resolved version for {}: {e}",
            container.name, container.image
        )),
    }

    if version::TagVersion::parse(&image.tag).is_some() {
        check_versioned_tag(registry, &image, row, logger).await
    } else {
        check_mutable_tag(runtime, registry, container, &image, row, logger).await
    }
}

/// The running tag is a version: look for a newer tag on the same track.
async fn check_versioned_tag(
    registry: &dyn RegistryPort,
    image: &ImageRef,
    mut row: ContainerUpdate,
    logger: &dyn CheckLogger,
) -> ContainerUpdate {
    let repo = image.repository_path();
    let tags = match registry.list_tags(&repo).await {
        Ok(tags) => tags,
        Err(e) => return row.failed(format!("failed to list tags for {repo}: {e}")),
    };
    if tags.is_empty() {
        return row.failed(RegistryError::NoTags(repo).to_string());
    }

    // No other tag on the running tag's track: nothing newer to offer.
    let latest = version::newest_tag(&image.tag, tags.iter().map(String::as_str))
        .unwrap_or_else(|| image.tag.clone());

    match registry.get_tag_digest(&repo, &latest).await {
        Ok(digest) => row.latest_digest = digest,
        Err(e) => logger.debug(&format!("no digest for {repo}:{latest}: {e}")),
    }

    let newer = version::is_newer(&image.tag, &latest);
    row.latest_version = latest;
    if newer { row.update_available() } else { row.up_to_date() }
}

/// The running tag is not a version (`latest`, `stable`, or something
/// unparseable). Compare digests when the local one is known, otherwise
/// compare against the registry's most recent tag. A reference pinned only
/// by digest is compared against `latest`.
async fn check_mutable_tag(
    runtime: &dyn RuntimePort,
    registry: &dyn RegistryPort,
    container: &Container,
    image: &ImageRef,
    mut row: ContainerUpdate,
    logger: &dyn CheckLogger,
) -> ContainerUpdate {
    let repo = image.repository_path();
    let tag = if image.tag.is_empty() {
        DEFAULT_TAG
    } else {
        image.tag.as_str()
    };
    let remote_digest = match registry.get_tag_digest(&repo, tag).await {
        Ok(digest) => digest,
        Err(e) => return row.failed(format!("failed to fetch digest for {repo}:{tag}: {e}")),
    };

    if row.current_digest.is_empty() {
        match runtime.get_image_digest(&container.image).await {
            Ok(digest) => row.current_digest = digest,
            Err(e) => logger.debug(&format!(
                "{}: no local digest for {}: {e}",
                container.name, container.image
            )),
        }
    }

    if !row.current_digest.is_empty() && !remote_digest.is_empty() {
        let changed = row.current_digest != remote_digest;
        row.latest_version = tag.to_string();
        row.latest_digest = remote_digest;
        return if changed { row.update_available() } else { row.up_to_date() };
    }

    let latest = match registry.get_latest_tag(&repo).await {
        Ok(tag) => tag,
        Err(e) => return row.failed(format!("failed to get latest tag for {repo}: {e}")),
    };
    let newer = version::is_newer(tag, &latest);
    row.latest_version = latest;
    row.latest_digest = remote_digest;
    if newer { row.update_available() } else { row.up_to_date() }
}
