//! Docker Registry v2 digest comparison (§4.2), used by `Start{pullLatest}`
//! to decide whether a container needs recreating under a new image.

use serde::Deserialize;

const AUTH_URL: &str = "https://auth.docker.io/token";
const REGISTRY_URL: &str = "https://registry-1.docker.io";

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
}

/// Thin client over the subset of the Docker Registry v2 HTTPS API needed
/// to read a tag's current digest without pulling it.
pub struct RegistryClient {
    client: reqwest::Client,
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClient {
    /// New client using the default Docker Hub auth/registry endpoints.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Remote manifest digest for `{namespace}/{repo}:{tag}`, or `None` on
    /// any network/auth failure — per §4.2, this never throws.
    pub async fn remote_digest(&self, repository: &str, tag: &str) -> Option<String> {
        let scope = format!("repository:{repository}:pull");
        let token = self
            .client
            .get(AUTH_URL)
            .query(&[("service", "registry.docker.io"), ("scope", scope.as_str())])
            .send()
            .await
            .ok()?
            .json::<TokenResponse>()
            .await
            .ok()?
            .token;

        let manifest_url = format!("{REGISTRY_URL}/v2/{repository}/manifests/{tag}");
        let response = self
            .client
            .get(&manifest_url)
            .bearer_auth(token)
            .header(
                "Accept",
                "application/vnd.docker.distribution.manifest.v2+json, application/vnd.oci.image.manifest.v1+json",
            )
            .send()
            .await
            .ok()?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), %repository, %tag, "registry manifest fetch failed");
            return None;
        }

        response
            .headers()
            .get("Docker-Content-Digest")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }
}

/// "Has update" per §4.2: both digests known and they differ.
pub fn has_update(local_digest: Option<&str>, remote_digest: Option<&str>) -> bool {
    matches!((local_digest, remote_digest), (Some(a), Some(b)) if a != b)
}
