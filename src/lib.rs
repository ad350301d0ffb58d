//! # Hearth Supervisor — container orchestration layer
//!
//! This crate is the container-runtime orchestration layer of the Hearth
//! home-automation host supervisor. It creates, attaches to, updates, monitors,
//! and tears down the long-lived containers that make up the running system
//! (core application, audio plugin, DNS, CLI, observer), and it owns the
//! private container network those containers join.
//!
//! ## Architecture Overview
//!
//! The system consists of several key components organized into modules:
//!
//! - **[`docker`]**: The container lifecycle manager — the [`docker::DockerInterface`]
//!   façade, the per-resource execution limiter, the container state classifier,
//!   the private network manager, and the image trust-verification flow
//! - **[`resolution`]**: The issue/suggestion reporting seam used to surface
//!   system-level conditions (for example registry rate limiting) to the host
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hearth_supervisor::docker::{
//!     BollardBridge, ContainerRole, CpuArch, DockerConfig, DockerContext, DockerInterface,
//!     TrustDisabled,
//! };
//! use hearth_supervisor::resolution::IssueLog;
//! use semver::Version;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bridge = Arc::new(BollardBridge::connect()?);
//!     let ctx = Arc::new(DockerContext::new(
//!         bridge,
//!         DockerConfig::default(),
//!         Arc::new(TrustDisabled),
//!         Arc::new(IssueLog::default()),
//!         CpuArch::Amd64,
//!     ));
//!
//!     let version = Version::parse("2024.1.0")?;
//!     let audio = DockerInterface::new(ctx, ContainerRole::audio("hearth/audio", version.clone()));
//!
//!     audio.install(&version, None, true, None).await?;
//!     audio.run().await?;
//!     Ok(())
//! }
//! ```

/// Container lifecycle management over the Docker daemon.
///
/// The heart of the supervisor: lifecycle operations, state classification,
/// concurrency control, private networking, and image trust verification.
pub mod docker;

/// Issue and suggestion reporting.
///
/// Small interface through which the orchestration layer surfaces recoverable
/// system conditions with actionable remediations.
pub mod resolution;

// Re-export the main orchestration types
pub use docker::{
    CommandReturn, ContainerRole, ContainerState, ContainerStateEvent, CpuArch, DockerConfig,
    DockerContext, DockerError, DockerInterface, DockerNetwork, ExecutionLimit, RestartPolicy,
    TrustVerdict, TrustVerifier,
};
pub use resolution::{ContextType, Issue, IssueReporter, IssueType, SuggestionType};
