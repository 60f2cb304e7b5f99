//! Live integration tests against real EC2 and Auto Scaling APIs.
//!
//! Everything here is `#[ignore]`d: the default test run needs no
//! credentials. Run explicitly with
//!
//! ```text
//! cargo test --test live_cluster -- --ignored
//! ```
//!
//! against an account where creating and deleting placement groups,
//! launch configurations, and autoscaling groups is acceptable. All
//! resources use the `corral-it-` name prefix and are cleaned up on the
//! way out.

use corral::{
    ClusterConfig, ClusterError, ClusterManager, LaunchConfigSpec,
    DEFAULT_SPOT_PRICE_WINDOW_MINUTES,
};

const TEST_AMI: &str = "ami-0c02fb55956c7d316"; // Amazon Linux 2, us-east-1
const TEST_INSTANCE_TYPE: &str = "c5.large";

async fn manager() -> ClusterManager {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "corral=debug".into()),
        )
        .try_init();

    ClusterManager::connect(&ClusterConfig::new()).await
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn spot_price_stats_hold_their_invariants() {
    let manager = manager().await;

    let stats = manager
        .get_spot_price(TEST_INSTANCE_TYPE, DEFAULT_SPOT_PRICE_WINDOW_MINUTES)
        .await
        .unwrap();

    for (zone, zone_stats) in &stats {
        assert!(zone_stats.count > 0, "empty bucket for {zone}");
        assert!(zone_stats.min <= zone_stats.median);
        assert!(zone_stats.median <= zone_stats.max);
        assert!(zone_stats.min <= zone_stats.avg && zone_stats.avg <= zone_stats.max);
    }
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn placement_group_create_is_idempotent() {
    let manager = manager().await;
    let name = "corral-it-pg-idem";

    manager.create_placement_group(name).await.unwrap();
    // second create must succeed without a duplicate error
    manager.create_placement_group(name).await.unwrap();

    let group = manager.get_placement_group(name).await.unwrap().unwrap();
    assert_eq!(group.name, name);
    assert_eq!(group.strategy.as_deref(), Some("cluster"));

    manager.delete_placement_group(name).await.unwrap();
    // deleting what is already gone is a no-op
    manager.delete_placement_group(name).await.unwrap();
    assert!(manager.get_placement_group(name).await.unwrap().is_none());
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn launch_config_conflicts_and_overwrite() {
    let manager = manager().await;
    let spec = LaunchConfigSpec::new("corral-it-lc", TEST_AMI, TEST_INSTANCE_TYPE);

    manager.create_launch_config(&spec, false).await.unwrap();

    // same name again without overwrite is a conflict
    let err = manager.create_launch_config(&spec, false).await.unwrap_err();
    assert!(matches!(err, ClusterError::LaunchConfigExists(_)));

    // overwrite replaces under the same name
    let replacement = spec.clone().with_spot_price(0.10);
    manager
        .create_launch_config(&replacement, true)
        .await
        .unwrap();

    let fetched = manager
        .get_launch_config("corral-it-lc")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(fetched.spot_price, Some(0.10));

    manager.delete_launch_config("corral-it-lc").await.unwrap();
    // missing config deletes as a no-op
    manager.delete_launch_config("corral-it-lc").await.unwrap();
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn terminate_tolerates_an_empty_group() {
    let manager = manager().await;
    let name = "corral-it-pg-empty";

    manager.create_placement_group(name).await.unwrap();
    // zero running instances: must not error on the empty id list
    manager.terminate_by_placement_group(name).await.unwrap();
    manager.delete_placement_group(name).await.unwrap();
}

#[tokio::test]
#[ignore = "requires AWS credentials"]
async fn cluster_end_to_end() {
    let manager = manager().await;
    let (pg, lc, ag) = ("corral-it-pg", "corral-it-lc-e2e", "corral-it-ag");

    manager.create_placement_group(pg).await.unwrap();

    let spec = LaunchConfigSpec::new(lc, TEST_AMI, TEST_INSTANCE_TYPE)
        .with_user_data("#!/bin/bash\necho corral\n");
    manager.create_launch_config(&spec, true).await.unwrap();

    let created = manager
        .create_autoscale_group(ag, lc, pg, 5, None)
        .await
        .unwrap();
    assert!(created);

    // a second create must refuse and leave the group untouched
    let created_again = manager
        .create_autoscale_group(ag, lc, pg, 99, None)
        .await
        .unwrap();
    assert!(!created_again);

    let group = manager.get_autoscale_group(ag).await.unwrap().unwrap();
    assert_eq!(group.name, ag);
    assert_eq!(group.desired_capacity, 0);
    assert_eq!(group.min_size, 0);
    assert_eq!(group.max_size, 5);
    assert_eq!(group.launch_config_name.as_deref(), Some(lc));
    assert_eq!(group.placement_group.as_deref(), Some(pg));

    // dormant group: nothing scaled yet, so nothing resolves
    assert!(manager.get_autoscaled_instances(Some(ag)).await.unwrap().is_empty());
    assert!(manager
        .get_public_ips_by_placement_group(pg)
        .await
        .unwrap()
        .is_empty());

    manager.delete_autoscale_group(ag, true).await.unwrap();

    // force-delete completes asynchronously; the launch config stays
    // referenced until the group is gone
    for _ in 0..60 {
        if manager.get_autoscale_group(ag).await.unwrap().is_none() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
    }

    manager.delete_launch_config(lc).await.unwrap();
    manager.delete_placement_group(pg).await.unwrap();
}
