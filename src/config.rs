//! Provider selection and connection configuration
//!
//! The cloud backend is chosen explicitly through [`ClusterConfig`]
//! rather than discovered at runtime: callers pick a [`ProviderKind`]
//! and an optional region at startup, and everything downstream is
//! constructed from that. Credential resolution stays with the AWS
//! config loader (environment, profiles, instance metadata) and is not
//! handled here.

use aws_config::BehaviorVersion;
use aws_sdk_autoscaling::Client as AutoScalingClient;
use aws_sdk_ec2::Client as Ec2Client;
use aws_types::region::Region;
use tracing::debug;

/// Default AWS region
pub const DEFAULT_REGION: &str = "us-east-1";

/// Cloud backends a cluster manager can drive
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Amazon Web Services (EC2 + Auto Scaling)
    #[default]
    Aws,
}

/// Connection configuration for a cluster manager
///
/// One config describes one account/region pairing; multi-region
/// orchestration is out of scope.
#[derive(Debug, Clone, Default)]
pub struct ClusterConfig {
    /// Which cloud backend to drive
    pub provider: ProviderKind,

    /// Region name; [`DEFAULT_REGION`] when unset
    pub region: Option<String>,
}

impl ClusterConfig {
    /// Create a config for the default provider and region
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the region
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Set the provider
    pub fn with_provider(mut self, provider: ProviderKind) -> Self {
        self.provider = provider;
        self
    }

    /// The effective region name
    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    /// Load the ambient SDK configuration for this config's region
    ///
    /// Credentials and endpoints are resolved by the loader from the
    /// usual environment sources.
    pub async fn load_sdk_config(&self) -> aws_config::SdkConfig {
        let region = self.region().to_string();
        debug!("Loading AWS config for region: {}", region);

        aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await
    }
}

/// Create a compute (EC2) session from a loaded SDK config
pub fn connect_compute(config: &aws_config::SdkConfig) -> Ec2Client {
    Ec2Client::new(config)
}

/// Create an Auto Scaling session from a loaded SDK config
pub fn connect_autoscale(config: &aws_config::SdkConfig) -> AutoScalingClient {
    AutoScalingClient::new(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClusterConfig::new();
        assert_eq!(config.provider, ProviderKind::Aws);
        assert_eq!(config.region(), DEFAULT_REGION);
    }

    #[test]
    fn test_config_builder() {
        let config = ClusterConfig::new()
            .with_region("eu-west-1")
            .with_provider(ProviderKind::Aws);

        assert_eq!(config.region(), "eu-west-1");
        assert_eq!(config.region, Some("eu-west-1".to_string()));
    }
}
