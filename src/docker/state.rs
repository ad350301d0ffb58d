//! Container state classification.
//!
//! Pure mapping from the daemon's raw inspect attributes to the closed set of
//! lifecycle states the supervisor reasons about. The classifier is total:
//! any syntactically valid inspect snapshot maps to exactly one state.

use bollard::models::{
    ContainerState as ContainerStateModel, ContainerStateStatusEnum, HealthStatusEnum,
    RestartPolicyNameEnum,
};

/// Lifecycle state of a supervised container.
///
/// Always derived from the daemon's live attributes, never stored
/// authoritatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerState {
    /// No container known to the daemon
    Unknown,
    /// Container exited with code 0
    Stopped,
    /// Container is running without a declared health check
    Running,
    /// Container is paused
    Paused,
    /// Container is restarting
    Restarting,
    /// Container is being removed
    Removing,
    /// Container is dead
    Dead,
    /// Container is running and its health check reports healthy
    Healthy,
    /// Container is running and its health check reports anything else
    Unhealthy,
    /// Container exited with a non-zero code
    Failed,
}

impl ContainerState {
    /// True while the container process is up (including health-checked states).
    pub fn is_running(&self) -> bool {
        matches!(
            self,
            ContainerState::Running | ContainerState::Healthy | ContainerState::Unhealthy
        )
    }

    /// True for the down states that attach can suppress events for.
    pub fn is_down(&self) -> bool {
        matches!(self, ContainerState::Stopped | ContainerState::Failed)
    }
}

impl std::fmt::Display for ContainerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ContainerState::Unknown => "unknown",
            ContainerState::Stopped => "stopped",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Dead => "dead",
            ContainerState::Healthy => "healthy",
            ContainerState::Unhealthy => "unhealthy",
            ContainerState::Failed => "failed",
        };
        write!(f, "{}", name)
    }
}

/// Restart policy of a container, as reflected from the daemon configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    /// Never restart automatically
    No,
    /// Restart on non-zero exit
    OnFailure,
    /// Always restart
    Always,
    /// Restart unless explicitly stopped
    UnlessStopped,
}

impl Default for RestartPolicy {
    fn default() -> Self {
        RestartPolicy::No
    }
}

impl RestartPolicy {
    /// Parse the daemon's restart policy, defaulting to [`RestartPolicy::No`]
    /// when the name is absent or empty.
    pub fn from_model(policy: &bollard::models::RestartPolicy) -> Self {
        match policy.name {
            Some(RestartPolicyNameEnum::ALWAYS) => RestartPolicy::Always,
            Some(RestartPolicyNameEnum::ON_FAILURE) => RestartPolicy::OnFailure,
            Some(RestartPolicyNameEnum::UNLESS_STOPPED) => RestartPolicy::UnlessStopped,
            _ => RestartPolicy::No,
        }
    }
}

impl std::fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            RestartPolicy::No => "no",
            RestartPolicy::OnFailure => "on-failure",
            RestartPolicy::Always => "always",
            RestartPolicy::UnlessStopped => "unless-stopped",
        };
        write!(f, "{}", name)
    }
}

/// Classify the raw daemon state into a [`ContainerState`].
///
/// Rules, in order: a running container with a health-check result maps to
/// healthy/unhealthy; a running container without one maps to running;
/// paused/restarting/removing/dead pass through; anything else is failed when
/// the exit code is non-zero, stopped otherwise. `None` means no container is
/// known and maps to unknown.
pub fn classify_state(state: Option<&ContainerStateModel>) -> ContainerState {
    let Some(state) = state else {
        return ContainerState::Unknown;
    };

    match state.status {
        Some(ContainerStateStatusEnum::RUNNING) => match &state.health {
            Some(health) => {
                if health.status == Some(HealthStatusEnum::HEALTHY) {
                    ContainerState::Healthy
                } else {
                    ContainerState::Unhealthy
                }
            }
            None => ContainerState::Running,
        },
        Some(ContainerStateStatusEnum::PAUSED) => ContainerState::Paused,
        Some(ContainerStateStatusEnum::RESTARTING) => ContainerState::Restarting,
        Some(ContainerStateStatusEnum::REMOVING) => ContainerState::Removing,
        Some(ContainerStateStatusEnum::DEAD) => ContainerState::Dead,
        _ => {
            if state.exit_code.unwrap_or(0) > 0 {
                ContainerState::Failed
            } else {
                ContainerState::Stopped
            }
        }
    }
}
