//! # Corral
//!
//! Cluster lifecycle management for spot compute on AWS.
//!
//! ## Architecture
//!
//! ```text
//! ClusterManager (stateless façade)
//! ├── Placement groups      ──→  EC2
//! ├── Instance queries      ──→  EC2 (by placement-group membership)
//! ├── Spot price statistics ──→  EC2 (paginated history + local aggregation)
//! ├── Launch configurations ──→  Auto Scaling
//! └── Autoscale groups      ──→  Auto Scaling
//! ```
//!
//! Every operation is a call-through to the remote API; the only local
//! computation is the per-zone aggregation of spot-price samples. The
//! manager keeps no state between calls, so each query reflects current
//! remote state.
//!
//! ## Resource model
//!
//! A cluster is built from three named resources: a cluster-strategy
//! placement group for network locality, an immutable launch
//! configuration describing the instances, and an autoscaling group
//! created dormant (`desired_capacity = 0`) that is scaled externally.
//! Instances appear only as a byproduct of scaling and are queried or
//! terminated through their placement-group membership.
//!
//! ```no_run
//! use corral::{ClusterConfig, ClusterManager, LaunchConfigSpec};
//!
//! # async fn example() -> corral::Result<()> {
//! let manager = ClusterManager::connect(&ClusterConfig::new()).await;
//!
//! manager.create_placement_group("pg1").await?;
//! let spec = LaunchConfigSpec::new("lc1", "ami-12345", "c4.8xlarge")
//!     .with_key_pair("ops")
//!     .with_security_group("sg-default")
//!     .with_spot_price(0.27);
//! manager.create_launch_config(&spec, false).await?;
//! manager
//!     .create_autoscale_group("ag1", "lc1", "pg1", 5, None)
//!     .await?;
//!
//! // scaled externally; members resolve through the placement group
//! let ips = manager.get_public_ips_by_placement_group("pg1").await?;
//! # let _ = ips;
//! # Ok(())
//! # }
//! ```
//!
//! Absence is not an error anywhere in the API: getters return `None`,
//! deletes on missing resources log and succeed. See [`ClusterError`]
//! for the conflicts that do surface.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cluster;
pub mod config;
pub mod error;
pub mod instance;
pub mod launch;
pub mod pricing;
pub mod scaling;

// ============================================================================
// Public exports - Cluster lifecycle
// ============================================================================

// The façade and its conventions
pub use cluster::{ClusterManager, DEFAULT_SPOT_PRICE_WINDOW_MINUTES};

// Error handling
pub use error::{ClusterError, Result};

// Connection configuration
pub use config::{connect_autoscale, connect_compute, ClusterConfig, ProviderKind, DEFAULT_REGION};

// ============================================================================
// Public exports - Resource models
// ============================================================================

// Launch configuration templates
pub use launch::{BlockDeviceSpec, LaunchConfig, LaunchConfigSpec};

// Group read models
pub use scaling::{AutoscaleGroup, PlacementGroup};

// Instances
pub use instance::{Instance, InstanceState};

// Spot pricing
pub use pricing::{median, PriceAccumulator, SpotPriceSample, ZonePriceStats};
