//! Instance models and EC2 response parsing
//!
//! Instances are never launched directly by this layer; they appear as a
//! byproduct of autoscale-group scaling and are queried or terminated by
//! placement-group membership.

use aws_sdk_ec2::types::{Instance as AwsInstance, InstanceStateName};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Filter value selecting instances in the `running` state
pub(crate) const STATE_RUNNING: &str = "running";

/// Instance state tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstanceState {
    /// Instance is pending
    Pending,
    /// Instance is running
    Running,
    /// Instance is stopping
    Stopping,
    /// Instance is stopped
    Stopped,
    /// Instance is shutting down
    ShuttingDown,
    /// Instance is terminated
    Terminated,
}

impl InstanceState {
    /// Check if instance is active (can run workloads)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Pending)
    }
}

impl From<&InstanceStateName> for InstanceState {
    fn from(name: &InstanceStateName) -> Self {
        match name {
            InstanceStateName::Pending => Self::Pending,
            InstanceStateName::Running => Self::Running,
            InstanceStateName::Stopping => Self::Stopping,
            InstanceStateName::Stopped => Self::Stopped,
            InstanceStateName::ShuttingDown => Self::ShuttingDown,
            InstanceStateName::Terminated => Self::Terminated,
            _ => Self::Pending,
        }
    }
}

/// A compute instance as reported by the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    /// Instance ID
    pub id: String,

    /// Public DNS name, if assigned
    pub public_dns: Option<String>,

    /// Public IP address, if assigned
    pub public_ip: Option<String>,

    /// Private DNS name
    pub private_dns: Option<String>,

    /// Private IP address
    pub private_ip: Option<String>,

    /// Placement group the instance belongs to, if any
    pub placement_group: Option<String>,

    /// Current state
    pub state: InstanceState,

    /// Launch time
    pub launch_time: DateTime<Utc>,

    /// Tags (includes the propagated `Name` tag for autoscaled instances)
    pub tags: HashMap<String, String>,
}

impl Instance {
    /// Parse an instance out of a `DescribeInstances` response
    ///
    /// Returns `None` for entries without an instance ID.
    pub fn from_aws_instance(instance: &AwsInstance) -> Option<Self> {
        let id = instance.instance_id()?.to_string();

        let state = instance
            .state()
            .and_then(|s| s.name())
            .map(InstanceState::from)
            .unwrap_or(InstanceState::Pending);

        // EC2 reports empty strings rather than omitting unassigned names
        let public_dns = instance
            .public_dns_name()
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let private_dns = instance
            .private_dns_name()
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let placement_group = instance
            .placement()
            .and_then(|p| p.group_name())
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        let launch_time = instance
            .launch_time()
            .and_then(|t| DateTime::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_else(Utc::now);

        let mut tags = HashMap::new();
        for tag in instance.tags() {
            if let (Some(key), Some(value)) = (tag.key(), tag.value()) {
                tags.insert(key.to_string(), value.to_string());
            }
        }

        Some(Self {
            id,
            public_dns,
            public_ip: instance.public_ip_address().map(str::to_string),
            private_dns,
            private_ip: instance.private_ip_address().map(str::to_string),
            placement_group,
            state,
            launch_time,
            tags,
        })
    }

    /// Check if the instance is in the `running` state
    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }
}
