//! Ambient configuration assembled once at startup from the environment
//! variables named in §6. No global config singleton: this struct is built
//! explicitly, and the pieces that only need part of it receive just that
//! part through their own constructors.

/// Inclusive port range the allocator assigns host ports from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortRange {
    /// Lowest assignable port, inclusive.
    pub start: u16,
    /// Highest assignable port, inclusive.
    pub end: u16,
}

impl Default for PortRange {
    fn default() -> Self {
        Self {
            start: 42000,
            end: 42999,
        }
    }
}

/// Naming conventions for engine-owned resources.
#[derive(Debug, Clone)]
pub struct NamingConfig {
    /// Prefix for container names. Default `"forgehook-"`.
    pub container_prefix: String,
    /// Prefix for volume names. Default `"forgehook-vol-"`.
    pub volume_prefix: String,
    /// Docker network name. Default `"forgehook-net"`.
    pub network_name: String,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            container_prefix: "forgehook-".to_string(),
            volume_prefix: "forgehook-vol-".to_string(),
            network_name: "forgehook-net".to_string(),
        }
    }
}

/// How to reach the container engine.
#[derive(Debug, Clone)]
pub enum EngineEndpoint {
    /// `DOCKER_HOST`, e.g. `tcp://localhost:2375`.
    Tcp(String),
    /// `DOCKER_SOCKET`, e.g. `/var/run/docker.sock`.
    Socket(String),
}

impl Default for EngineEndpoint {
    fn default() -> Self {
        Self::Socket("/var/run/docker.sock".to_string())
    }
}

/// Base URLs and credentials for LLM providers, read from environment.
#[derive(Debug, Clone, Default)]
pub struct ProviderEndpoints {
    /// `OLLAMA_URL`.
    pub ollama_url: Option<String>,
    /// `LMSTUDIO_URL`.
    pub lmstudio_url: Option<String>,
    /// `OPENAI_BASE_URL`.
    pub openai_base_url: Option<String>,
    /// `OPENAI_API_KEY`.
    pub openai_api_key: Option<String>,
    /// `ANTHROPIC_API_KEY`.
    pub anthropic_api_key: Option<String>,
    /// `AZURE_OPENAI_ENDPOINT`.
    pub azure_openai_endpoint: Option<String>,
    /// `AZURE_OPENAI_API_KEY`.
    pub azure_openai_api_key: Option<String>,
}

/// Top-level configuration for the host, assembled once at startup.
#[derive(Debug, Clone, Default)]
pub struct ForgehookConfig {
    /// Host port range for the allocator.
    pub port_range: PortRange,
    /// Container/volume/network naming.
    pub naming: NamingConfig,
    /// Engine reachability.
    pub engine_endpoint: Option<EngineEndpoint>,
    /// LLM provider base URLs and credentials.
    pub providers: ProviderEndpoints,
}

impl ForgehookConfig {
    /// Build configuration from process environment variables, applying the
    /// documented defaults for anything unset.
    pub fn from_env() -> Self {
        let port_range = PortRange {
            start: std::env::var("PLUGIN_PORT_RANGE_START")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| PortRange::default().start),
            end: std::env::var("PLUGIN_PORT_RANGE_END")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(|| PortRange::default().end),
        };

        let naming = NamingConfig {
            container_prefix: std::env::var("CONTAINER_PREFIX")
                .unwrap_or_else(|_| NamingConfig::default().container_prefix),
            volume_prefix: std::env::var("VOLUME_PREFIX")
                .unwrap_or_else(|_| NamingConfig::default().volume_prefix),
            network_name: std::env::var("NETWORK_NAME")
                .unwrap_or_else(|_| NamingConfig::default().network_name),
        };

        let engine_endpoint = std::env::var("DOCKER_HOST")
            .map(EngineEndpoint::Tcp)
            .or_else(|_| std::env::var("DOCKER_SOCKET").map(EngineEndpoint::Socket))
            .ok();

        let providers = ProviderEndpoints {
            ollama_url: std::env::var("OLLAMA_URL").ok(),
            lmstudio_url: std::env::var("LMSTUDIO_URL").ok(),
            openai_base_url: std::env::var("OPENAI_BASE_URL").ok(),
            openai_api_key: std::env::var("OPENAI_API_KEY").ok(),
            anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
            azure_openai_endpoint: std::env::var("AZURE_OPENAI_ENDPOINT").ok(),
            azure_openai_api_key: std::env::var("AZURE_OPENAI_API_KEY").ok(),
        };

        Self {
            port_range,
            naming,
            engine_endpoint,
            providers,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_port_range_is_inclusive_and_nonempty() {
        let range = PortRange::default();
        assert!(range.start <= range.end);
    }

    #[test]
    fn default_naming_uses_forgehook_prefix() {
        let naming = NamingConfig::default();
        assert_eq!(naming.container_prefix, "forgehook-");
        assert_eq!(naming.volume_prefix, "forgehook-vol-");
        assert_eq!(naming.network_name, "forgehook-net");
    }
}
