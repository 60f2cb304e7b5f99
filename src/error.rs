//! Error types for cluster operations

use thiserror::Error;

/// Cluster result type
pub type Result<T> = std::result::Result<T, ClusterError>;

/// Errors that can occur while managing cluster resources
///
/// Absence of a remote resource is never an error: reads and deletes
/// report it as `None`/empty returns. Everything the remote service
/// rejects (auth, validation, throttling) surfaces through the SDK
/// passthrough variants.
#[derive(Error, Debug)]
pub enum ClusterError {
    /// EC2 API error
    #[error("EC2 error: {0}")]
    Ec2(#[from] aws_sdk_ec2::Error),

    /// Auto Scaling API error
    #[error("Auto Scaling error: {0}")]
    AutoScaling(#[from] aws_sdk_autoscaling::Error),

    /// IO error (user-data file reads)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A launch configuration with this name already exists and
    /// overwrite was not requested
    #[error("Launch configuration {0} already exists")]
    LaunchConfigExists(String),

    /// Local request construction failed
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClusterError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Convert from an EC2 SDK operation error
    pub fn from_ec2<E>(err: E) -> Self
    where
        aws_sdk_ec2::Error: From<E>,
    {
        Self::Ec2(aws_sdk_ec2::Error::from(err))
    }

    /// Convert from an Auto Scaling SDK operation error
    pub fn from_autoscaling<E>(err: E) -> Self
    where
        aws_sdk_autoscaling::Error: From<E>,
    {
        Self::AutoScaling(aws_sdk_autoscaling::Error::from(err))
    }
}
