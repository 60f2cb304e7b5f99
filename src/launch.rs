//! Launch configuration templates
//!
//! A launch configuration is an immutable instance-creation template: it
//! can only be deleted and recreated, never mutated in place.
//! [`LaunchConfigSpec`] is the write model handed to
//! [`ClusterManager::create_launch_config`](crate::ClusterManager::create_launch_config);
//! [`LaunchConfig`] is what the service reports back.

use aws_sdk_autoscaling::types::{
    BlockDeviceMapping, Ebs, LaunchConfiguration as AwsLaunchConfiguration,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;

/// Template for creating a launch configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LaunchConfigSpec {
    /// Launch configuration name (unique per account/region)
    pub name: String,

    /// AMI ID
    pub image_id: String,

    /// Instance type (e.g. "c4.8xlarge")
    pub instance_type: String,

    /// Key pair name
    pub key_name: Option<String>,

    /// Security groups
    pub security_groups: Vec<String>,

    /// Spot price ceiling in USD per instance-hour; 0 means on-demand
    pub spot_price: f64,

    /// Inline user-data payload; takes precedence over `user_data_file`
    pub user_data: Option<String>,

    /// Path to a file whose full contents become the user-data payload
    pub user_data_file: Option<PathBuf>,

    /// Block device mappings
    pub block_devices: Vec<BlockDeviceSpec>,

    /// Launch EBS-optimized instances
    pub ebs_optimized: bool,
}

impl LaunchConfigSpec {
    /// Create a spec with the required fields
    pub fn new(
        name: impl Into<String>,
        image_id: impl Into<String>,
        instance_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            image_id: image_id.into(),
            instance_type: instance_type.into(),
            ..Default::default()
        }
    }

    /// Set the key pair
    pub fn with_key_pair(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    /// Add a security group
    pub fn with_security_group(mut self, group: impl Into<String>) -> Self {
        self.security_groups.push(group.into());
        self
    }

    /// Set the spot price ceiling
    pub fn with_spot_price(mut self, price: f64) -> Self {
        self.spot_price = price;
        self
    }

    /// Set the inline user-data payload
    pub fn with_user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = Some(user_data.into());
        self
    }

    /// Set the user-data file path
    pub fn with_user_data_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.user_data_file = Some(path.into());
        self
    }

    /// Add a block device mapping
    pub fn with_block_device(mut self, device: BlockDeviceSpec) -> Self {
        self.block_devices.push(device);
        self
    }

    /// Request EBS-optimized instances
    pub fn with_ebs_optimized(mut self, ebs_optimized: bool) -> Self {
        self.ebs_optimized = ebs_optimized;
        self
    }

    /// Resolve the user-data payload
    ///
    /// Inline `user_data` wins; otherwise the file is read in full. With
    /// neither set there is no payload.
    pub async fn resolve_user_data(&self) -> Result<Option<String>> {
        if let Some(data) = &self.user_data {
            return Ok(Some(data.clone()));
        }

        match &self.user_data_file {
            Some(path) => Ok(Some(tokio::fs::read_to_string(path).await?)),
            None => Ok(None),
        }
    }

    /// Spot price request parameter; present only when the ceiling is
    /// above zero (absence means on-demand pricing)
    pub(crate) fn spot_price_param(&self) -> Option<String> {
        (self.spot_price > 0.0).then(|| self.spot_price.to_string())
    }
}

/// Block device mapping for a launch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockDeviceSpec {
    /// Device name (e.g. "/dev/xvda")
    pub device_name: String,

    /// Volume size in GiB
    pub volume_size_gb: i32,

    /// EBS volume type (e.g. "gp3"); service default when unset
    pub volume_type: Option<String>,

    /// Delete the volume when the instance terminates
    pub delete_on_termination: bool,
}

impl BlockDeviceSpec {
    /// Create a mapping that is deleted on termination
    pub fn new(device_name: impl Into<String>, volume_size_gb: i32) -> Self {
        Self {
            device_name: device_name.into(),
            volume_size_gb,
            volume_type: None,
            delete_on_termination: true,
        }
    }

    /// Set the EBS volume type
    pub fn with_volume_type(mut self, volume_type: impl Into<String>) -> Self {
        self.volume_type = Some(volume_type.into());
        self
    }

    /// Keep the volume after the instance terminates
    pub fn keep_on_termination(mut self) -> Self {
        self.delete_on_termination = false;
        self
    }

    /// Convert to the Auto Scaling request shape
    pub(crate) fn to_request(&self) -> Result<BlockDeviceMapping> {
        let mut ebs = Ebs::builder()
            .volume_size(self.volume_size_gb)
            .delete_on_termination(self.delete_on_termination);

        if let Some(volume_type) = &self.volume_type {
            ebs = ebs.volume_type(volume_type);
        }

        Ok(BlockDeviceMapping::builder()
            .device_name(&self.device_name)
            .ebs(ebs.build())
            .build())
    }
}

/// A launch configuration as reported by the service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaunchConfig {
    /// Launch configuration name
    pub name: String,

    /// AMI ID
    pub image_id: String,

    /// Instance type
    pub instance_type: String,

    /// Key pair name
    pub key_name: Option<String>,

    /// Security groups
    pub security_groups: Vec<String>,

    /// Spot price ceiling; `None` means on-demand
    pub spot_price: Option<f64>,

    /// User data, base64-encoded as the service stores it
    pub user_data: Option<String>,

    /// Whether instances launch EBS-optimized
    pub ebs_optimized: bool,

    /// When the configuration was created
    pub created_time: DateTime<Utc>,
}

impl LaunchConfig {
    /// Parse from a `DescribeLaunchConfigurations` response
    pub(crate) fn from_aws(config: &AwsLaunchConfiguration) -> Self {
        Self {
            name: config
                .launch_configuration_name()
                .unwrap_or_default()
                .to_string(),
            image_id: config.image_id().unwrap_or_default().to_string(),
            instance_type: config.instance_type().unwrap_or_default().to_string(),
            key_name: config
                .key_name()
                .filter(|k| !k.is_empty())
                .map(str::to_string),
            security_groups: config.security_groups().to_vec(),
            spot_price: config.spot_price().and_then(|p| p.parse().ok()),
            user_data: config
                .user_data()
                .filter(|u| !u.is_empty())
                .map(str::to_string),
            ebs_optimized: config.ebs_optimized().unwrap_or(false),
            created_time: config
                .created_time()
                .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                .unwrap_or_else(Utc::now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClusterError;

    #[test]
    fn test_spec_builder() {
        let spec = LaunchConfigSpec::new("lc1", "ami-12345", "c4.8xlarge")
            .with_key_pair("ops")
            .with_security_group("sg-1")
            .with_security_group("sg-2")
            .with_spot_price(0.27)
            .with_ebs_optimized(true);

        assert_eq!(spec.name, "lc1");
        assert_eq!(spec.image_id, "ami-12345");
        assert_eq!(spec.instance_type, "c4.8xlarge");
        assert_eq!(spec.key_name.as_deref(), Some("ops"));
        assert_eq!(spec.security_groups, vec!["sg-1", "sg-2"]);
        assert!(spec.ebs_optimized);
    }

    #[test]
    fn test_spot_price_attached_only_when_positive() {
        let on_demand = LaunchConfigSpec::new("lc1", "ami-1", "m4.large");
        assert_eq!(on_demand.spot_price_param(), None);

        let spot = on_demand.clone().with_spot_price(0.27);
        assert_eq!(spot.spot_price_param(), Some("0.27".to_string()));
    }

    #[tokio::test]
    async fn test_user_data_defaults_to_none() {
        let spec = LaunchConfigSpec::new("lc1", "ami-1", "m4.large");
        assert_eq!(spec.resolve_user_data().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_inline_user_data_wins_over_file() {
        // The file path is bogus; precedence means it is never read
        let spec = LaunchConfigSpec::new("lc1", "ami-1", "m4.large")
            .with_user_data("#!/bin/bash\necho hi\n")
            .with_user_data_file("/nonexistent/user-data.sh");

        let payload = spec.resolve_user_data().await.unwrap();
        assert_eq!(payload.as_deref(), Some("#!/bin/bash\necho hi\n"));
    }

    #[tokio::test]
    async fn test_user_data_read_from_file() {
        let path = std::env::temp_dir().join("corral-launch-test-user-data.sh");
        tokio::fs::write(&path, "#!/bin/bash\necho from-file\n")
            .await
            .unwrap();

        let spec =
            LaunchConfigSpec::new("lc1", "ami-1", "m4.large").with_user_data_file(&path);
        let payload = spec.resolve_user_data().await.unwrap();
        assert_eq!(payload.as_deref(), Some("#!/bin/bash\necho from-file\n"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_user_data_file_is_an_error() {
        let spec = LaunchConfigSpec::new("lc1", "ami-1", "m4.large")
            .with_user_data_file("/nonexistent/user-data.sh");

        assert!(matches!(
            spec.resolve_user_data().await,
            Err(ClusterError::Io(_))
        ));
    }

    #[test]
    fn test_block_device_to_request() {
        let mapping = BlockDeviceSpec::new("/dev/xvda", 100)
            .with_volume_type("gp3")
            .to_request()
            .unwrap();

        assert_eq!(mapping.device_name(), Some("/dev/xvda"));
        let ebs = mapping.ebs().unwrap();
        assert_eq!(ebs.volume_size(), Some(100));
        assert_eq!(ebs.volume_type(), Some("gp3"));
        assert_eq!(ebs.delete_on_termination(), Some(true));
    }
}
