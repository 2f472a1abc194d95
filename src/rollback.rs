use crate::domain::{BatchContainerDetail, RollbackStrategy, RollbackTarget};

/// Pick the version a container should be rolled back to.
///
/// Tiers are tried in order and the first one that applies wins:
///
/// 1. the tag changed: roll back to the old tag;
/// 2. the tag stayed but the version it resolved to changed (a mutable tag
///    such as `latest` moved): roll back to the old resolved version;
/// 3. an old digest was recorded: roll back to that digest;
/// 4. nothing usable was recorded.
///
/// A resolved-version change where only the new side was recorded has
/// nothing to roll back to at that tier, so it falls through to the digest.
#[must_use]
pub fn resolve_rollback_version(detail: &BatchContainerDetail) -> RollbackTarget {
    if detail.old_version != detail.new_version {
        return RollbackTarget {
            version: detail.old_version.clone(),
            strategy: RollbackStrategy::Tag,
        };
    }

    if detail.old_resolved_version != detail.new_resolved_version
        && !detail.old_resolved_version.is_empty()
    {
        return RollbackTarget {
            version: detail.old_resolved_version.clone(),
            strategy: RollbackStrategy::Resolved,
        };
    }

    if !detail.old_digest.is_empty() {
        return RollbackTarget {
            version: detail.old_digest.clone(),
            strategy: RollbackStrategy::Digest,
        };
    }

    RollbackTarget::none()
}
