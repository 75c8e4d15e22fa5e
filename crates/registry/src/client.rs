use jmod_cancel::CancelToken;
use jmod_network::ThrottledClient;

use crate::{error::RegistryError, Packument, RegistryVersion, Resolveable};

pub const DEFAULT_REGISTRY: &str = "https://registry.npmjs.org";

fn endpoint(registry: &str, path: &str) -> String {
    format!("{}/{}", registry.trim_end_matches('/'), path)
}

/// Resolve `version_or_tag` (`latest`, `next`, `1.2.3`, …) to a concrete
/// version string via `GET /<name>/<version_or_tag>`.
///
/// A `latest` resolution is returned caret-prefixed so that manifests store
/// a range rather than a pin.
pub async fn get_version(
    http: &ThrottledClient,
    registry: &str,
    name: &str,
    version_or_tag: &str,
) -> Result<String, RegistryError> {
    let url = endpoint(registry, &format!("{name}/{version_or_tag}"));
    let response = http
        .run_with_permit(|client| client.get(&url).header("user-agent", "jmod").send())
        .await?;
    if !response.status().is_success() {
        return Err(RegistryError::BadStatus { status: response.status(), url });
    }
    let version = response.json::<RegistryVersion>().await?;
    Ok(version.serialize_spec(version_or_tag))
}

/// Fetch the packument for `name` and pick the highest version satisfying
/// `range`. Cancellation aborts the in-flight request.
pub async fn resolve(
    http: &ThrottledClient,
    registry: &str,
    cancel: &CancelToken,
    name: &str,
    range: &node_semver::Range,
) -> Result<Resolveable, RegistryError> {
    let url = endpoint(registry, name);
    let request = http.run_with_permit(|client| client.get(&url).header("user-agent", "jmod").send());
    let response = tokio::select! {
        _ = cancel.cancelled() => return Err(RegistryError::Cancelled),
        response = request => response?,
    };
    if !response.status().is_success() {
        return Err(RegistryError::BadStatus { status: response.status(), url });
    }
    let packument = tokio::select! {
        _ = cancel.cancelled() => return Err(RegistryError::Cancelled),
        packument = response.json::<Packument>() => packument?,
    };
    let pinned = packument.pinned_version(range).ok_or_else(|| RegistryError::NoMatchingVersion {
        name: name.to_string(),
        range: range.to_string(),
    })?;
    Ok(Resolveable::Npm(pinned.clone()))
}
