//! Cluster lifecycle operations
//!
//! [`ClusterManager`] is a stateless façade over one cloud
//! account/region: placement groups, launch configurations, autoscaling
//! groups, spot-price history, and instance resolution by
//! placement-group membership. Every operation is a direct call-through
//! to the remote API; the manager holds no state between calls and
//! applies no locking, so concurrent creators for the same name race at
//! the remote service.
//!
//! ## Absence vs. error
//!
//! Reads and deletes treat a missing resource as a normal outcome:
//! getters return `None`, deletes log and return. Creating a launch
//! configuration over an existing name without `overwrite` is the one
//! hard conflict and surfaces as
//! [`ClusterError::LaunchConfigExists`]. Placement-group creation is
//! idempotent; autoscale-group creation is deliberately not (it reports
//! `false` and leaves the existing group untouched).

use aws_sdk_autoscaling::types::Tag;
use aws_sdk_autoscaling::Client as AutoScalingClient;
use aws_sdk_ec2::error::ProvideErrorMetadata;
use aws_sdk_ec2::operation::describe_instances::DescribeInstancesOutput;
use aws_sdk_ec2::primitives::DateTime as AwsDateTime;
use aws_sdk_ec2::types::{Filter, InstanceType, PlacementStrategy};
use aws_sdk_ec2::Client as Ec2Client;
use base64::prelude::*;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use tracing::{debug, error, info, warn};

use crate::config::{connect_autoscale, connect_compute, ClusterConfig, ProviderKind};
use crate::error::{ClusterError, Result};
use crate::instance::{Instance, STATE_RUNNING};
use crate::launch::{LaunchConfig, LaunchConfigSpec};
use crate::pricing::{PriceAccumulator, SpotPriceSample, ZonePriceStats};
use crate::scaling::{AutoscaleGroup, PlacementGroup};

/// Default look-back window for spot-price history, in minutes
pub const DEFAULT_SPOT_PRICE_WINDOW_MINUTES: i64 = 60;

/// Error code EC2 returns when a named placement group does not exist
const PLACEMENT_GROUP_UNKNOWN: &str = "InvalidPlacementGroup.Unknown";

/// Stateless façade over the compute and autoscale APIs
///
/// Holds nothing but the two session clients; it can be constructed
/// once and shared, or rebuilt per call site at no meaningful cost.
pub struct ClusterManager {
    ec2: Ec2Client,
    autoscaling: AutoScalingClient,
}

impl ClusterManager {
    /// Create a manager from prebuilt session clients
    ///
    /// This is the injection seam: tests and embedders hand in clients
    /// with whatever credentials, endpoints, or doubles they need.
    pub fn new(ec2: Ec2Client, autoscaling: AutoScalingClient) -> Self {
        Self { ec2, autoscaling }
    }

    /// Create a manager from a loaded SDK config
    pub fn from_config(config: &aws_config::SdkConfig) -> Self {
        Self::new(connect_compute(config), connect_autoscale(config))
    }

    /// Connect to the provider and region selected in `config`
    pub async fn connect(config: &ClusterConfig) -> Self {
        match config.provider {
            ProviderKind::Aws => {
                let sdk_config = config.load_sdk_config().await;
                Self::from_config(&sdk_config)
            }
        }
    }

    // ------------------------------------------------------------------
    // Spot pricing
    // ------------------------------------------------------------------

    /// Per-zone spot-price statistics for an instance type
    ///
    /// Fetches every spot-price record for `instance_type` over the last
    /// `window_minutes` (see [`DEFAULT_SPOT_PRICE_WINDOW_MINUTES`]),
    /// following continuation tokens until the history is exhausted, and
    /// reduces the samples to `{count, min, avg, median, max}` per
    /// availability zone. No samples yields an empty mapping.
    pub async fn get_spot_price(
        &self,
        instance_type: &str,
        window_minutes: i64,
    ) -> Result<HashMap<String, ZonePriceStats>> {
        let end = Utc::now();
        let start = end - Duration::minutes(window_minutes);
        debug!(
            "Fetching spot price history for {} over the last {} minutes",
            instance_type, window_minutes
        );

        let mut accumulator = PriceAccumulator::new();
        let mut next_token: Option<String> = None;

        loop {
            let response = self
                .ec2
                .describe_spot_price_history()
                .instance_types(InstanceType::from(instance_type))
                .start_time(AwsDateTime::from_secs(start.timestamp()))
                .end_time(AwsDateTime::from_secs(end.timestamp()))
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(ClusterError::from_ec2)?;

            let mut page = Vec::new();
            for record in response.spot_price_history() {
                let zone = record.availability_zone().unwrap_or_default();
                let timestamp = record
                    .timestamp()
                    .and_then(|t| chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_else(Utc::now);

                match record.spot_price().map(str::parse::<f64>) {
                    Some(Ok(price)) => page.push(SpotPriceSample {
                        availability_zone: zone.to_string(),
                        price,
                        timestamp,
                    }),
                    _ => warn!("Skipping unparseable spot price record in {}", zone),
                }
            }
            accumulator.extend(page);

            // the service signals exhaustion with an absent or empty token
            match response.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(
            "Collected {} spot price samples for {}",
            accumulator.len(),
            instance_type
        );
        Ok(accumulator.into_stats())
    }

    // ------------------------------------------------------------------
    // Placement groups
    // ------------------------------------------------------------------

    /// Placement groups, optionally filtered to one name
    ///
    /// `None` when zero groups match; a nonexistent name is absence, not
    /// an error.
    pub async fn get_placement_groups(
        &self,
        name: Option<&str>,
    ) -> Result<Option<Vec<PlacementGroup>>> {
        let mut request = self.ec2.describe_placement_groups();
        if let Some(name) = name {
            request = request.group_names(name);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                let err = aws_sdk_ec2::Error::from(err);
                if is_placement_group_missing(err.code()) {
                    debug!("Placement group {} not found", name.unwrap_or("<any>"));
                    return Ok(None);
                }
                return Err(ClusterError::Ec2(err));
            }
        };

        let groups: Vec<PlacementGroup> = response
            .placement_groups()
            .iter()
            .map(PlacementGroup::from_aws)
            .collect();

        if groups.is_empty() {
            return Ok(None);
        }
        Ok(Some(groups))
    }

    /// A single placement group by name, `None` when absent
    pub async fn get_placement_group(&self, name: &str) -> Result<Option<PlacementGroup>> {
        Ok(self
            .get_placement_groups(Some(name))
            .await?
            .and_then(|groups| groups.into_iter().next()))
    }

    /// Create a cluster-strategy placement group
    ///
    /// Idempotent: an existing group of the same name is success.
    pub async fn create_placement_group(&self, name: &str) -> Result<()> {
        if self.get_placement_group(name).await?.is_some() {
            debug!("Placement group {} already exists", name);
            return Ok(());
        }

        self.ec2
            .create_placement_group()
            .group_name(name)
            .strategy(PlacementStrategy::Cluster)
            .send()
            .await
            .map_err(ClusterError::from_ec2)?;

        info!("Created placement group {}", name);
        Ok(())
    }

    /// Delete a placement group; a missing group is a logged no-op
    pub async fn delete_placement_group(&self, name: &str) -> Result<()> {
        if self.get_placement_group(name).await?.is_none() {
            info!("Placement group {} does not exist", name);
            return Ok(());
        }

        self.ec2
            .delete_placement_group()
            .group_name(name)
            .send()
            .await
            .map_err(ClusterError::from_ec2)?;

        info!("Deleted placement group {}", name);
        Ok(())
    }

    /// All `running` instances belonging to a placement group
    ///
    /// One filtered `DescribeInstances` call. Continuation tokens are
    /// not followed, so a group larger than a single response page is
    /// truncated.
    pub async fn get_instances_by_placement_group(&self, name: &str) -> Result<Vec<Instance>> {
        let response = self
            .ec2
            .describe_instances()
            .filters(
                Filter::builder()
                    .name("placement-group-name")
                    .values(name)
                    .build(),
            )
            .filters(
                Filter::builder()
                    .name("instance-state-name")
                    .values(STATE_RUNNING)
                    .build(),
            )
            .send()
            .await
            .map_err(ClusterError::from_ec2)?;

        Ok(collect_instances(&response))
    }

    /// Terminate all `running` instances of a placement group in one batch
    ///
    /// Zero matching instances is a no-op; the empty id list is never
    /// sent to the API (which would reject it).
    pub async fn terminate_by_placement_group(&self, name: &str) -> Result<()> {
        let ids: Vec<String> = self
            .get_instances_by_placement_group(name)
            .await?
            .into_iter()
            .map(|instance| instance.id)
            .collect();

        if ids.is_empty() {
            debug!("No running instances in placement group {}", name);
            return Ok(());
        }

        info!(
            "Terminating {} instances in placement group {}",
            ids.len(),
            name
        );
        self.ec2
            .terminate_instances()
            .set_instance_ids(Some(ids))
            .send()
            .await
            .map_err(ClusterError::from_ec2)?;
        Ok(())
    }

    /// Public DNS names of the `running` instances in a placement group
    pub async fn get_public_hostnames_by_placement_group(
        &self,
        name: &str,
    ) -> Result<Vec<String>> {
        let instances = self.get_instances_by_placement_group(name).await?;
        Ok(instances.into_iter().filter_map(|i| i.public_dns).collect())
    }

    /// Public IPs of the `running` instances in a placement group
    pub async fn get_public_ips_by_placement_group(&self, name: &str) -> Result<Vec<String>> {
        let instances = self.get_instances_by_placement_group(name).await?;
        Ok(instances.into_iter().filter_map(|i| i.public_ip).collect())
    }

    /// Private DNS names of the `running` instances in a placement group
    pub async fn get_private_hostnames_by_placement_group(
        &self,
        name: &str,
    ) -> Result<Vec<String>> {
        let instances = self.get_instances_by_placement_group(name).await?;
        Ok(instances
            .into_iter()
            .filter_map(|i| i.private_dns)
            .collect())
    }

    /// Private IPs of the `running` instances in a placement group
    pub async fn get_private_ips_by_placement_group(&self, name: &str) -> Result<Vec<String>> {
        let instances = self.get_instances_by_placement_group(name).await?;
        Ok(instances.into_iter().filter_map(|i| i.private_ip).collect())
    }

    // ------------------------------------------------------------------
    // Launch configurations
    // ------------------------------------------------------------------

    /// A launch configuration by name, `None` when absent
    pub async fn get_launch_config(&self, name: &str) -> Result<Option<LaunchConfig>> {
        let response = self
            .autoscaling
            .describe_launch_configurations()
            .launch_configuration_names(name)
            .send()
            .await
            .map_err(ClusterError::from_autoscaling)?;

        Ok(response
            .launch_configurations()
            .first()
            .map(LaunchConfig::from_aws))
    }

    /// Create a launch configuration from a template
    ///
    /// An existing configuration of the same name is a hard conflict
    /// unless `overwrite` is set, in which case it is deleted first and
    /// recreated under the same name. User data is resolved per
    /// [`LaunchConfigSpec::resolve_user_data`] and base64-encoded for
    /// the wire; the spot price ceiling, block-device mappings, and the
    /// EBS-optimized flag are attached only when meaningful.
    pub async fn create_launch_config(
        &self,
        spec: &LaunchConfigSpec,
        overwrite: bool,
    ) -> Result<()> {
        if self.get_launch_config(&spec.name).await?.is_some() {
            if overwrite {
                self.autoscaling
                    .delete_launch_configuration()
                    .launch_configuration_name(&spec.name)
                    .send()
                    .await
                    .map_err(ClusterError::from_autoscaling)?;
                info!("Deleted launch config {} to overwrite new config", spec.name);
            } else {
                error!("Launch config {} already exists", spec.name);
                return Err(ClusterError::LaunchConfigExists(spec.name.clone()));
            }
        }

        let user_data = spec.resolve_user_data().await?;

        let mut request = self
            .autoscaling
            .create_launch_configuration()
            .launch_configuration_name(&spec.name)
            .image_id(&spec.image_id)
            .instance_type(&spec.instance_type)
            .set_key_name(spec.key_name.clone())
            .set_security_groups(
                (!spec.security_groups.is_empty()).then(|| spec.security_groups.clone()),
            );

        if let Some(data) = user_data {
            // the Auto Scaling API expects the payload base64-encoded
            request = request.user_data(BASE64_STANDARD.encode(data));
        }

        if let Some(price) = spec.spot_price_param() {
            request = request.spot_price(price);
        }

        if !spec.block_devices.is_empty() {
            let mappings = spec
                .block_devices
                .iter()
                .map(|device| device.to_request())
                .collect::<Result<Vec<_>>>()?;
            request = request.set_block_device_mappings(Some(mappings));
        }

        if spec.ebs_optimized {
            request = request.ebs_optimized(true);
        }

        request
            .send()
            .await
            .map_err(ClusterError::from_autoscaling)?;
        info!("Created launch configuration {}", spec.name);
        Ok(())
    }

    /// Delete a launch configuration; a missing one is a logged no-op
    pub async fn delete_launch_config(&self, name: &str) -> Result<()> {
        if self.get_launch_config(name).await?.is_none() {
            info!("Launch config {} does not exist", name);
            return Ok(());
        }

        self.autoscaling
            .delete_launch_configuration()
            .launch_configuration_name(name)
            .send()
            .await
            .map_err(ClusterError::from_autoscaling)?;

        info!("Deleted launch config {}", name);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Autoscaling groups
    // ------------------------------------------------------------------

    /// An autoscaling group by name, `None` when absent
    pub async fn get_autoscale_group(&self, name: &str) -> Result<Option<AutoscaleGroup>> {
        let response = self
            .autoscaling
            .describe_auto_scaling_groups()
            .auto_scaling_group_names(name)
            .send()
            .await
            .map_err(ClusterError::from_autoscaling)?;

        Ok(response
            .auto_scaling_groups()
            .first()
            .map(AutoscaleGroup::from_aws))
    }

    /// Create an autoscaling group, dormant at zero capacity
    ///
    /// Returns `Ok(false)` and leaves the existing group untouched when
    /// the name is taken; creation here is deliberately not idempotent,
    /// unlike placement groups. `size` caps the group (`max_size`); the
    /// group starts with `desired_capacity = 0` and is scaled
    /// externally. `zones` defaults to every availability zone in the
    /// region. A propagating `Name` tag equal to the group name is
    /// applied to all launched instances.
    pub async fn create_autoscale_group(
        &self,
        name: &str,
        launch_config_name: &str,
        placement_group: &str,
        size: i32,
        zones: Option<Vec<String>>,
    ) -> Result<bool> {
        if self.get_autoscale_group(name).await?.is_some() {
            error!("Autoscale group {} already exists", name);
            return Ok(false);
        }

        let zones = match zones {
            Some(zones) => zones,
            None => self.availability_zones().await?,
        };
        info!("zones: {:?}", zones);

        let name_tag = Tag::builder()
            .key("Name")
            .value(name)
            .propagate_at_launch(true)
            .resource_id(name)
            .build();

        self.autoscaling
            .create_auto_scaling_group()
            .auto_scaling_group_name(name)
            .launch_configuration_name(launch_config_name)
            .placement_group(placement_group)
            .set_availability_zones(Some(zones))
            .desired_capacity(0)
            .min_size(0)
            .max_size(size)
            .tags(name_tag)
            .send()
            .await
            .map_err(ClusterError::from_autoscaling)?;

        info!("Created autoscale group {}", name);
        Ok(true)
    }

    /// Delete an autoscaling group; a missing one is a logged no-op
    ///
    /// With `force`, member instances are terminated along with the
    /// group instead of requiring the group to be empty.
    pub async fn delete_autoscale_group(&self, name: &str, force: bool) -> Result<()> {
        if self.get_autoscale_group(name).await?.is_none() {
            info!("Autoscale group {} does not exist", name);
            return Ok(());
        }

        self.autoscaling
            .delete_auto_scaling_group()
            .auto_scaling_group_name(name)
            .force_delete(force)
            .send()
            .await
            .map_err(ClusterError::from_autoscaling)?;

        info!("Autoscale group {} deleted (forced={})", name, force);
        Ok(())
    }

    /// Instances launched by one autoscale group, or by all groups
    pub async fn get_autoscaled_instances(&self, name: Option<&str>) -> Result<Vec<Instance>> {
        let mut request = self.autoscaling.describe_auto_scaling_groups();
        if let Some(name) = name {
            request = request.auto_scaling_group_names(name);
        }
        let response = request
            .send()
            .await
            .map_err(ClusterError::from_autoscaling)?;

        let ids: Vec<String> = response
            .auto_scaling_groups()
            .iter()
            .flat_map(|group| group.instances())
            .filter_map(|member| member.instance_id().map(str::to_string))
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .ec2
            .describe_instances()
            .set_instance_ids(Some(ids))
            .send()
            .await
            .map_err(ClusterError::from_ec2)?;

        Ok(collect_instances(&response))
    }

    /// Names of the region's availability zones
    pub async fn availability_zones(&self) -> Result<Vec<String>> {
        let response = self
            .ec2
            .describe_availability_zones()
            .send()
            .await
            .map_err(ClusterError::from_ec2)?;

        Ok(response
            .availability_zones()
            .iter()
            .filter_map(|zone| zone.zone_name().map(str::to_string))
            .collect())
    }
}

/// Flatten the reservation nesting of a `DescribeInstances` response
fn collect_instances(response: &DescribeInstancesOutput) -> Vec<Instance> {
    let mut instances = Vec::new();
    for reservation in response.reservations() {
        for instance in reservation.instances() {
            if let Some(parsed) = Instance::from_aws_instance(instance) {
                instances.push(parsed);
            }
        }
    }
    instances
}

/// Check whether a describe error means the named group does not exist
fn is_placement_group_missing(code: Option<&str>) -> bool {
    code == Some(PLACEMENT_GROUP_UNKNOWN)
}
