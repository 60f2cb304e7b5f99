//! Placement group and autoscaling group read models
//!
//! Thin projections of what `DescribePlacementGroups` and
//! `DescribeAutoScalingGroups` report. Both resources are identified by
//! name; "absent" is modeled as `None` at the query sites, never as an
//! error.

use aws_sdk_autoscaling::types::AutoScalingGroup;
use aws_sdk_ec2::types::PlacementGroup as AwsPlacementGroup;
use serde::{Deserialize, Serialize};

/// A placement group as reported by EC2
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacementGroup {
    /// Group name
    pub name: String,

    /// Placement strategy ("cluster" for groups created by this layer)
    pub strategy: Option<String>,

    /// Lifecycle state reported by the service
    pub state: Option<String>,
}

impl PlacementGroup {
    /// Parse from a `DescribePlacementGroups` response
    pub(crate) fn from_aws(group: &AwsPlacementGroup) -> Self {
        Self {
            name: group.group_name().unwrap_or_default().to_string(),
            strategy: group.strategy().map(|s| s.as_str().to_string()),
            state: group.state().map(|s| s.as_str().to_string()),
        }
    }
}

/// An autoscaling group as reported by the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutoscaleGroup {
    /// Group name
    pub name: String,

    /// Name of the launch configuration the group launches from
    pub launch_config_name: Option<String>,

    /// Placement group members are launched into
    pub placement_group: Option<String>,

    /// Current desired capacity
    pub desired_capacity: i32,

    /// Minimum group size
    pub min_size: i32,

    /// Maximum group size
    pub max_size: i32,

    /// Availability zones the group spans
    pub availability_zones: Vec<String>,

    /// IDs of current member instances
    pub instance_ids: Vec<String>,
}

impl AutoscaleGroup {
    /// Parse from a `DescribeAutoScalingGroups` response
    pub(crate) fn from_aws(group: &AutoScalingGroup) -> Self {
        Self {
            name: group
                .auto_scaling_group_name()
                .unwrap_or_default()
                .to_string(),
            launch_config_name: group.launch_configuration_name().map(str::to_string),
            placement_group: group.placement_group().map(str::to_string),
            desired_capacity: group.desired_capacity().unwrap_or(0),
            min_size: group.min_size().unwrap_or(0),
            max_size: group.max_size().unwrap_or(0),
            availability_zones: group.availability_zones().to_vec(),
            instance_ids: group
                .instances()
                .iter()
                .filter_map(|i| i.instance_id().map(str::to_string))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_ec2::types::{PlacementGroupState, PlacementStrategy};

    #[test]
    fn test_parse_placement_group() {
        let aws_group = AwsPlacementGroup::builder()
            .group_name("pg1")
            .strategy(PlacementStrategy::Cluster)
            .state(PlacementGroupState::Available)
            .build();

        let group = PlacementGroup::from_aws(&aws_group);
        assert_eq!(group.name, "pg1");
        assert_eq!(group.strategy.as_deref(), Some("cluster"));
        assert_eq!(group.state.as_deref(), Some("available"));
    }

    #[test]
    fn test_parse_placement_group_minimal() {
        let group = PlacementGroup::from_aws(&AwsPlacementGroup::builder().build());
        assert_eq!(group.name, "");
        assert_eq!(group.strategy, None);
    }
}
