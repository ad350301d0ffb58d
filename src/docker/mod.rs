//! Container lifecycle management over the Docker daemon.
//!
//! This module owns the set of long-lived containers that make up the running
//! Hearth system. It drives them through install, attach, run, stop, update,
//! and remove, keeps the supervisor's view of them reconciled with what the
//! daemon reports, and owns the private bridge network they join.
//!
//! ## Architecture
//!
//! The module is organized into several components:
//!
//! - [`client`]: the daemon seam — the [`DockerBridge`] trait over the bollard
//!   API plus the [`DockerClient`] composite operations built on it
//! - [`interface`]: the stateful lifecycle façade over one named container
//! - [`jobs`]: the execution limiter serializing or rejecting overlapping
//!   lifecycle operations per resource group
//! - [`network`]: the private bridge network with fixed per-role addresses
//! - [`state`]: the pure classifier from raw daemon attributes to
//!   [`ContainerState`]
//! - [`roles`]: configuration records for the well-known supervised containers
//! - [`monitor`]: the state-watch registry and container state event bus
//! - [`trust`]: the content-trust verification seam consumed by install
//! - [`stats`]: resource statistics derived from daemon stats samples

pub mod client;
mod config;
mod interface;
mod jobs;
mod monitor;
mod network;
mod roles;
mod state;
mod stats;
mod trust;

pub use client::{
    BollardBridge, CommandReturn, ContainerSpec, DockerBridge, DockerClient, NetworkSpec,
};
pub use config::{DockerConfig, RegistryAuth};
pub use interface::{DockerContext, DockerInterface, Metadata};
pub use jobs::{ExecutionLimit, JobRegistry, JobSlot};
pub use monitor::{ContainerStateEvent, DockerMonitor};
pub use network::{
    AUDIO_ADDRESS, CLI_ADDRESS, DNS_ADDRESS, DockerNetwork, GATEWAY_ADDRESS, HEARTH_NETWORK,
    NETWORK_IP_RANGE, NETWORK_SUBNET, OBSERVER_ADDRESS, RESERVED_ADDRESS, SUPERVISOR_ADDRESS,
};
pub use roles::{ContainerRole, NetworkRole};
pub use state::{ContainerState, RestartPolicy, classify_state};
pub use stats::DockerStats;
pub use trust::{TrustDisabled, TrustVerdict, TrustVerifier};

/// Label carrying the image version on supervised images and containers.
pub const LABEL_VERSION: &str = "io.hearth.version";
/// Label carrying the CPU architecture on supervised images.
pub const LABEL_ARCH: &str = "io.hearth.arch";
/// Label marking containers managed by this supervisor.
pub const LABEL_MANAGED: &str = "hearth_managed";

/// CPU architecture of a supervised image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CpuArch {
    /// ARMv7 32-bit (linux/arm/v7)
    Armv7,
    /// ARM hard-float 32-bit (linux/arm/v6)
    Armhf,
    /// ARM 64-bit
    Aarch64,
    /// x86 32-bit
    I386,
    /// x86 64-bit
    Amd64,
}

impl CpuArch {
    /// Return the daemon platform string for this architecture.
    pub fn platform(&self) -> &'static str {
        match self {
            CpuArch::Armv7 => "linux/arm/v7",
            CpuArch::Armhf => "linux/arm/v6",
            CpuArch::Aarch64 => "linux/arm64",
            CpuArch::I386 => "linux/386",
            CpuArch::Amd64 => "linux/amd64",
        }
    }
}

impl std::fmt::Display for CpuArch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CpuArch::Armv7 => "armv7",
            CpuArch::Armhf => "armhf",
            CpuArch::Aarch64 => "aarch64",
            CpuArch::I386 => "i386",
            CpuArch::Amd64 => "amd64",
        };
        write!(f, "{}", name)
    }
}

/// Container orchestration errors.
#[derive(Debug, thiserror::Error)]
pub enum DockerError {
    /// The daemon rejected a request
    #[error("Docker API error ({status}): {message}")]
    Api {
        /// HTTP status code returned by the daemon
        status: u16,
        /// Daemon error message
        message: String,
    },

    /// Transport/communication failure reaching the daemon
    #[error("Docker request error: {0}")]
    Request(String),

    /// Image or container absent — often a recoverable, expected condition
    #[error("Not found: {0}")]
    NotFound(String),

    /// Content-trust verification failed or errored
    #[error("Content-trust failure for {image}: {reason}")]
    Trust {
        /// Image reference the verification ran against
        image: String,
        /// What went wrong
        reason: String,
    },

    /// The execution limiter rejected a group-once call
    #[error("Job '{operation}' is already running for group '{group}'")]
    JobConflict {
        /// Operation that was rejected
        operation: String,
        /// Concurrency group holding the slot
        group: String,
    },

    /// The container role does not support the requested operation
    #[error("'{0}' does not support this operation")]
    NotSupported(String),

    /// Catch-all for lifecycle failures that don't fit the above
    #[error("{0}")]
    Lifecycle(String),
}

impl DockerError {
    /// True for the recoverable "target absent" condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, DockerError::NotFound(_))
    }

    /// True when the daemon reported a registry rate limit.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, DockerError::Api { status: 429, .. })
    }
}

impl From<bollard::errors::Error> for DockerError {
    fn from(err: bollard::errors::Error) -> Self {
        match err {
            bollard::errors::Error::DockerResponseServerError {
                status_code: 404,
                message,
            } => DockerError::NotFound(message),
            bollard::errors::Error::DockerResponseServerError {
                status_code,
                message,
            } => DockerError::Api {
                status: status_code,
                message,
            },
            other => DockerError::Request(other.to_string()),
        }
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, DockerError>;
