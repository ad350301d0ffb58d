//! Container lifecycle façade.
//!
//! A [`DockerInterface`] is the stateful view over one named container/image
//! pair. It drives install, attach, run, stop, update, and remove through the
//! shared [`DockerContext`], keeps a metadata snapshot of the last successful
//! daemon inspection, and routes every state-mutating operation through the
//! execution limiter so overlapping calls on the same container never
//! interleave.
//!
//! Composite operations (update, check_image, run, remove) hold a single
//! limiter slot and call the unlimited `*_inner` functions for their nested
//! steps.

use crate::docker::client::{CommandReturn, DockerBridge, DockerClient};
use crate::docker::jobs::{ExecutionLimit, JobRegistry, JobSlot};
use crate::docker::monitor::{ContainerStateEvent, DockerMonitor};
use crate::docker::roles::ContainerRole;
use crate::docker::state::{ContainerState, RestartPolicy, classify_state};
use crate::docker::stats::DockerStats;
use crate::docker::trust::{TrustVerdict, TrustVerifier};
use crate::docker::{
    CpuArch, DockerConfig, DockerError, LABEL_ARCH, LABEL_VERSION, Result,
};
use crate::resolution::{Issue, IssueReporter};
use bollard::models::{ContainerInspectResponse, ImageInspect, MountPoint};
use semver::Version;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Shared process-wide context for all container interfaces.
///
/// Constructed once at startup and passed explicitly; owns the daemon client,
/// the monitor, the execution limiter, the trust verifier, and the issue
/// reporter.
pub struct DockerContext {
    client: DockerClient,
    monitor: DockerMonitor,
    jobs: JobRegistry,
    trust: Arc<dyn TrustVerifier>,
    issues: Arc<dyn IssueReporter>,
    arch: CpuArch,
}

impl DockerContext {
    pub fn new(
        bridge: Arc<dyn DockerBridge>,
        config: DockerConfig,
        trust: Arc<dyn TrustVerifier>,
        issues: Arc<dyn IssueReporter>,
        arch: CpuArch,
    ) -> Self {
        Self {
            client: DockerClient::new(bridge, config),
            monitor: DockerMonitor::new(),
            jobs: JobRegistry::new(),
            trust,
            issues,
            arch,
        }
    }

    /// The composite daemon operations.
    pub fn client(&self) -> &DockerClient {
        &self.client
    }

    /// The state-watch registry and event bus.
    pub fn monitor(&self) -> &DockerMonitor {
        &self.monitor
    }

    /// The execution limiter.
    pub fn jobs(&self) -> &JobRegistry {
        &self.jobs
    }

    /// The host CPU architecture images are pulled for.
    pub fn arch(&self) -> CpuArch {
        self.arch
    }
}

/// Last-known daemon inspection snapshot of one container or image.
///
/// Replaced wholesale on every successful inspect/run/install, cleared on
/// remove. Projections tolerate anything the daemon omitted.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Daemon container ID, absent when seeded from an image
    pub container_id: Option<String>,
    /// Image reference the snapshot was taken from
    pub image: Option<String>,
    /// Version parsed from the version label
    pub version: Option<Version>,
    /// Architecture label or image architecture
    pub arch: Option<String>,
    /// Label map
    pub labels: HashMap<String, String>,
    /// Restart policy from the daemon host config
    pub restart_policy: RestartPolicy,
    /// Mounts of the inspected container
    pub mounts: Vec<MountPoint>,
    /// Privileged mode of the inspected container
    pub privileged: bool,
}

impl Metadata {
    /// Snapshot from a container inspection.
    pub fn from_container(inspect: &ContainerInspectResponse) -> Self {
        let config = inspect.config.as_ref();
        let host_config = inspect.host_config.as_ref();
        let labels = config
            .and_then(|config| config.labels.clone())
            .unwrap_or_default();

        Self {
            container_id: inspect.id.clone(),
            image: config.and_then(|config| config.image.clone()),
            version: labels
                .get(LABEL_VERSION)
                .and_then(|tag| Version::parse(tag).ok()),
            arch: labels.get(LABEL_ARCH).cloned(),
            labels,
            restart_policy: host_config
                .and_then(|host| host.restart_policy.as_ref())
                .map(RestartPolicy::from_model)
                .unwrap_or(RestartPolicy::No),
            mounts: inspect.mounts.clone().unwrap_or_default(),
            privileged: host_config.and_then(|host| host.privileged).unwrap_or(false),
        }
    }

    /// Snapshot seeded from an image inspection, used when no container
    /// exists yet.
    pub fn from_image(inspect: &ImageInspect) -> Self {
        let labels = inspect
            .config
            .as_ref()
            .and_then(|config| config.labels.clone())
            .unwrap_or_default();

        Self {
            container_id: None,
            image: inspect
                .repo_tags
                .as_ref()
                .and_then(|tags| tags.first().cloned()),
            version: labels
                .get(LABEL_VERSION)
                .and_then(|tag| Version::parse(tag).ok()),
            arch: labels
                .get(LABEL_ARCH)
                .cloned()
                .or_else(|| inspect.architecture.clone()),
            labels,
            restart_policy: RestartPolicy::No,
            mounts: Vec::new(),
            privileged: false,
        }
    }
}

/// The content digest part of an image ID (`sha256:<digest>`).
fn image_checksum(image_id: &str) -> &str {
    image_id
        .split_once(':')
        .map(|(_, digest)| digest)
        .unwrap_or(image_id)
}

/// Platform triple (`os/arch[/variant]`) of an inspected image.
fn image_platform(inspect: &ImageInspect) -> String {
    let os = inspect.os.as_deref().unwrap_or("linux");
    let arch = inspect.architecture.as_deref().unwrap_or_default();
    match inspect.variant.as_deref().filter(|variant| !variant.is_empty()) {
        Some(variant) => format!("{}/{}/{}", os, arch, variant),
        None => format!("{}/{}", os, arch),
    }
}

/// Lifecycle façade over one named container.
pub struct DockerInterface {
    ctx: Arc<DockerContext>,
    role: ContainerRole,
    meta: RwLock<Option<Metadata>>,
}

impl DockerInterface {
    pub fn new(ctx: Arc<DockerContext>, role: ContainerRole) -> Self {
        Self {
            ctx,
            role,
            meta: RwLock::new(None),
        }
    }

    /// Container name this interface manages.
    pub fn name(&self) -> &str {
        &self.role.name
    }

    /// Role configuration of the managed container.
    pub fn role(&self) -> &ContainerRole {
        &self.role
    }

    /// Clone of the current metadata snapshot, if any.
    pub async fn metadata(&self) -> Option<Metadata> {
        self.meta.read().await.clone()
    }

    /// Version of the tracked container/image, falling back to the role's
    /// declared version.
    pub async fn version(&self) -> Version {
        self.meta
            .read()
            .await
            .as_ref()
            .and_then(|meta| meta.version.clone())
            .unwrap_or_else(|| self.role.version.clone())
    }

    async fn acquire(&self, operation: &str, limit: ExecutionLimit) -> Result<JobSlot> {
        self.ctx.jobs.acquire(operation, &self.role.name, limit).await
    }

    /// Serialize image-tag mutations per repository, since several roles may
    /// share one repository.
    async fn acquire_tag_slot(&self, operation: &str, repository: &str) -> Result<JobSlot> {
        self.ctx
            .jobs
            .acquire(operation, repository, ExecutionLimit::GroupWait)
            .await
    }

    // --- install -----------------------------------------------------------

    /// Pull and trust-verify `image:version`, optionally re-tagging it as
    /// `latest`.
    ///
    /// # Errors
    ///
    /// Fails with [`DockerError::Trust`] when verification reports the
    /// content untrusted (the pulled tag is deleted again) or errors. Registry
    /// rate limits surface a system issue before the error propagates.
    pub async fn install(
        &self,
        version: &Version,
        image: Option<&str>,
        latest: bool,
        arch: Option<CpuArch>,
    ) -> Result<()> {
        let _slot = self.acquire("install", ExecutionLimit::GroupOnce).await?;
        self.install_inner(version, image, latest, arch).await
    }

    async fn install_inner(
        &self,
        version: &Version,
        image: Option<&str>,
        latest: bool,
        arch: Option<CpuArch>,
    ) -> Result<()> {
        let image = image.unwrap_or(&self.role.image);
        let arch = arch.unwrap_or(self.ctx.arch);
        let tag = version.to_string();
        info!("Downloading image {} with tag {}", image, tag);

        let inspect = match self.ctx.client.pull(image, &tag, arch.platform()).await {
            Ok(inspect) => inspect,
            Err(err) if err.is_rate_limit() => {
                self.ctx.issues.create_issue(Issue::registry_rate_limit());
                return Err(err);
            }
            Err(err) => {
                return Err(DockerError::Lifecycle(format!(
                    "Can't install {}:{}: {}",
                    image, tag, err
                )));
            }
        };

        self.verify_pulled(image, &tag, &inspect).await?;

        if latest {
            let _tag_slot = self.acquire_tag_slot("tag_latest", image).await?;
            debug!("Tagging {}:{} as latest", image, tag);
            self.bridge()
                .tag_image(&format!("{}:{}", image, tag), image, "latest")
                .await?;
        }

        *self.meta.write().await = Some(Metadata::from_image(&inspect));
        info!("Download of {}:{} done", image, tag);
        Ok(())
    }

    /// Trust-check a freshly pulled image; an untrusted image is removed
    /// again, best effort, before the trust error propagates.
    async fn verify_pulled(&self, image: &str, tag: &str, inspect: &ImageInspect) -> Result<()> {
        let reference = format!("{}:{}", image, tag);
        let image_id = inspect.id.clone().unwrap_or_default();

        match self.ctx.trust.verify(image_checksum(&image_id)).await {
            TrustVerdict::Trusted => Ok(()),
            TrustVerdict::Untrusted => {
                warn!("Image {} is untrusted, removing it again", reference);
                if let Err(err) = self.bridge().remove_image(&reference, true).await {
                    warn!("Can't remove untrusted image {}: {}", reference, err);
                }
                Err(DockerError::Trust {
                    image: reference,
                    reason: "content checksum is not trusted".to_string(),
                })
            }
            TrustVerdict::Error(reason) => Err(DockerError::Trust {
                image: reference,
                reason,
            }),
        }
    }

    // --- attach ------------------------------------------------------------

    /// Attach to an existing container by name, falling back to the local
    /// image when no container exists.
    ///
    /// A successful container attach registers the container with the monitor
    /// and emits a state event, unless the caller suppresses events for down
    /// states (avoids flooding startup with "container is down" notifications
    /// for containers about to be started).
    ///
    /// # Errors
    ///
    /// Fails when neither a container nor the `image:version` image exists.
    pub async fn attach(&self, version: &Version, skip_state_event_if_down: bool) -> Result<()> {
        let _slot = self.acquire("attach", ExecutionLimit::GroupWait).await?;

        match self.bridge().inspect_container(&self.role.name).await {
            Ok(inspect) => {
                let meta = Metadata::from_container(&inspect);
                let container_id = meta.container_id.clone().unwrap_or_default();
                self.ctx.monitor.watch(&self.role.name, &container_id);

                let state = classify_state(inspect.state.as_ref());
                if !(skip_state_event_if_down && state.is_down()) {
                    self.ctx.monitor.fire(ContainerStateEvent {
                        name: self.role.name.clone(),
                        state,
                        container_id,
                        timestamp: chrono::Utc::now().timestamp(),
                    });
                }

                *self.meta.write().await = Some(meta);
                debug!("Attached to container {} ({})", self.role.name, state);
                Ok(())
            }
            // The container lookup is best effort: any failure falls through
            // to the local image
            Err(err) => {
                if !err.is_not_found() {
                    debug!("Can't inspect container {}: {}", self.role.name, err);
                }

                let reference = self.role.image_ref(&version.to_string());
                match self.bridge().inspect_image(&reference).await {
                    Ok(inspect) => {
                        *self.meta.write().await = Some(Metadata::from_image(&inspect));
                        debug!("Attached to image {}", reference);
                        Ok(())
                    }
                    Err(_) => Err(DockerError::Lifecycle(format!(
                        "Can't attach to {}: no container and no image {}",
                        self.role.name, reference
                    ))),
                }
            }
        }
    }

    // --- run / stop / start / restart --------------------------------------

    /// Create and start the container for the role's current version.
    ///
    /// No-op when already running; otherwise any leftover container of the
    /// same name is force-stopped and removed first.
    pub async fn run(&self) -> Result<()> {
        let _slot = self.acquire("run", ExecutionLimit::GroupOnce).await?;
        self.run_inner().await
    }

    async fn run_inner(&self) -> Result<()> {
        if self.current_state_inner().await?.is_running() {
            debug!("Container {} is already running", self.role.name);
            return Ok(());
        }

        self.stop_inner(true).await?;

        let tag = self.role.version.to_string();
        let inspect = self.ctx.client.run(&self.role, &tag).await?;
        let meta = Metadata::from_container(&inspect);
        self.ctx
            .monitor
            .watch(&self.role.name, meta.container_id.as_deref().unwrap_or_default());
        *self.meta.write().await = Some(meta);
        Ok(())
    }

    /// Stop the container, removing it by default.
    ///
    /// An absent container counts as success.
    pub async fn stop(&self, remove_container: bool) -> Result<()> {
        let _slot = self.acquire("stop", ExecutionLimit::GroupOnce).await?;
        self.stop_inner(remove_container).await
    }

    async fn stop_inner(&self, remove_container: bool) -> Result<()> {
        let result = self
            .ctx
            .client
            .stop_container(&self.role.name, self.role.stop_timeout, remove_container)
            .await;

        if remove_container {
            self.ctx.monitor.unwatch(&self.role.name);
        }

        match result {
            Err(err) if err.is_not_found() => Ok(()),
            other => other,
        }
    }

    /// Start an existing, stopped container.
    pub async fn start(&self) -> Result<()> {
        let _slot = self.acquire("start", ExecutionLimit::GroupOnce).await?;
        self.bridge().start_container(&self.role.name).await
    }

    /// Restart the container with the role's stop timeout.
    pub async fn restart(&self) -> Result<()> {
        let _slot = self.acquire("restart", ExecutionLimit::GroupOnce).await?;
        self.bridge()
            .restart_container(&self.role.name, self.role.stop_timeout)
            .await
    }

    // --- remove / update / check_image / cleanup ----------------------------

    /// Stop and remove the container, optionally removing its image.
    ///
    /// Idempotent: calling it on an already-absent container succeeds and
    /// leaves the metadata cleared.
    pub async fn remove(&self, remove_image: bool) -> Result<()> {
        let _slot = self.acquire("remove", ExecutionLimit::GroupOnce).await?;
        self.remove_inner(remove_image).await
    }

    async fn remove_inner(&self, remove_image: bool) -> Result<()> {
        info!("Removing {}", self.role.name);
        if let Err(err) = self.stop_inner(true).await {
            warn!("Can't stop {} during removal: {}", self.role.name, err);
        }

        if remove_image {
            let version = self.version().await;
            match self.ctx.client.remove_image(&self.role.image, &version).await {
                Err(err) if err.is_not_found() => {}
                Err(err) => return Err(err),
                Ok(()) => {}
            }
        }

        *self.meta.write().await = None;
        Ok(())
    }

    /// Install the new version, then stop the running container. Starting the
    /// new one is the caller's responsibility.
    pub async fn update(&self, version: &Version, image: Option<&str>, latest: bool) -> Result<()> {
        let _slot = self.acquire("update", ExecutionLimit::GroupOnce).await?;

        self.install_inner(version, image, latest, None).await?;

        // The new image is installed; a failure to stop the old container
        // must not fail the update
        if let Err(err) = self.stop_inner(true).await {
            warn!("Can't stop {} after update: {}", self.role.name, err);
        }
        Ok(())
    }

    /// Verify the tracked image matches the expected repository and platform;
    /// remove and reinstall it when it doesn't.
    ///
    /// This is the self-healing path for architecture mismatches and
    /// repository changes.
    pub async fn check_image(
        &self,
        version: &Version,
        expected_image: &str,
        expected_arch: Option<CpuArch>,
    ) -> Result<()> {
        let _slot = self.acquire("check_image", ExecutionLimit::GroupOnce).await?;

        let arch = expected_arch.unwrap_or(self.ctx.arch);
        let tracked_image = self
            .meta
            .read()
            .await
            .as_ref()
            .and_then(|meta| meta.image.clone());

        if let Some(tracked) = &tracked_image {
            let (repository, _) = crate::docker::client::split_reference(tracked);
            if repository == expected_image {
                match self.bridge().inspect_image(tracked).await {
                    Ok(inspect) => {
                        if image_platform(&inspect) == arch.platform() {
                            return Ok(());
                        }
                        info!(
                            "Image {} is {} but {} is expected",
                            tracked,
                            image_platform(&inspect),
                            arch.platform()
                        );
                    }
                    // A missing image is healed below; a daemon failure is
                    // no reason to throw a healthy image away
                    Err(err) if err.is_not_found() => {}
                    Err(err) => {
                        return Err(DockerError::Lifecycle(format!(
                            "Can't inspect {} for image check: {}",
                            tracked, err
                        )));
                    }
                }
            } else {
                info!(
                    "Image {} does not match expected repository {}",
                    tracked, expected_image
                );
            }
        }

        if let Err(err) = self.remove_inner(true).await {
            warn!("Can't remove {} during image check: {}", self.role.name, err);
        }
        self.install_inner(version, Some(expected_image), false, Some(arch))
            .await
    }

    /// Remove locally cached images of the repository other than the wanted
    /// version. `old_image` names a legacy repository to sweep as well.
    pub async fn cleanup(
        &self,
        old_image: Option<&str>,
        image: Option<&str>,
        version: Option<&Version>,
    ) -> Result<()> {
        let _slot = self.acquire("cleanup", ExecutionLimit::GroupWait).await?;

        let image = image.unwrap_or(&self.role.image);
        let version = match version {
            Some(version) => version.clone(),
            None => self.version().await,
        };
        let old_images =
            old_image.map(|old| HashSet::from([old.to_string()]));

        self.ctx
            .client
            .cleanup_old_images(image, &version, old_images.as_ref())
            .await
    }

    // --- command execution --------------------------------------------------

    /// Run a command in a fresh, throwaway container of this role's image.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::NotSupported`] for roles without one-shot
    /// command support.
    pub async fn execute_command(&self, command: &str) -> Result<CommandReturn> {
        let _slot = self
            .acquire("execute_command", ExecutionLimit::GroupOnce)
            .await?;

        if !self.role.one_shot {
            return Err(DockerError::NotSupported(self.role.name.clone()));
        }

        let version = self.version().await;
        let reference = self.role.image_ref(&version.to_string());
        self.ctx.client.run_command(&reference, command).await
    }

    /// Execute a command inside the running container.
    pub async fn run_inside(&self, command: &str) -> Result<CommandReturn> {
        let _slot = self.acquire("run_inside", ExecutionLimit::GroupOnce).await?;

        self.bridge()
            .exec_in_container(
                &self.role.name,
                vec![
                    "/bin/sh".to_string(),
                    "-c".to_string(),
                    command.to_string(),
                ],
            )
            .await
    }

    // --- image bookkeeping --------------------------------------------------

    /// Highest parseable version among the local tags of this role's image.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::NotFound`] when no tag parses as a version, and
    /// a request error when the daemon cannot be reached.
    pub async fn get_latest_version(&self) -> Result<Version> {
        let images = self.bridge().list_images(Some(&self.role.image)).await?;

        images
            .iter()
            .flat_map(|image| image.repo_tags.iter())
            .filter_map(|tag| Version::parse(crate::docker::client::split_reference(tag).1).ok())
            .max()
            .ok_or_else(|| {
                DockerError::NotFound(format!("No version tag found for {}", self.role.image))
            })
    }

    /// True when `image:version` is present locally. Errors are suppressed.
    pub async fn exists(&self) -> bool {
        let version = self.version().await;
        let reference = self.role.image_ref(&version.to_string());
        self.bridge().inspect_image(&reference).await.is_ok()
    }

    /// Re-tag the tracked container's current image as the role's version and
    /// as `latest`.
    ///
    /// Used on the self-management path after an in-place update.
    pub async fn retag(&self) -> Result<()> {
        let _slot = self.acquire("retag", ExecutionLimit::GroupWait).await?;
        let _tag_slot = self.acquire_tag_slot("retag", &self.role.image).await?;

        let inspect = self.bridge().inspect_container(&self.role.name).await?;
        let image_id = inspect.image.ok_or_else(|| {
            DockerError::Lifecycle(format!("Container {} has no image ID", self.role.name))
        })?;

        let tag = self.role.version.to_string();
        self.bridge()
            .tag_image(&image_id, &self.role.image, &tag)
            .await?;
        self.bridge()
            .tag_image(&image_id, &self.role.image, "latest")
            .await?;
        info!("Retagged {} as {}:{} and latest", image_id, self.role.image, tag);
        Ok(())
    }

    /// Point the start tag of the tracked container's image at `version`.
    ///
    /// The start tag is whatever tag the running container was created from
    /// (typically `latest`), so the next start picks up the new version.
    ///
    /// # Errors
    ///
    /// Surfaces [`DockerError::NotFound`] when the container or the new
    /// version's image is absent.
    pub async fn update_start_tag(&self, image: &str, version: &Version) -> Result<()> {
        let _slot = self
            .acquire("update_start_tag", ExecutionLimit::GroupWait)
            .await?;
        let _tag_slot = self.acquire_tag_slot("update_start_tag", image).await?;

        let inspect = self.bridge().inspect_container(&self.role.name).await?;
        let current_reference = inspect
            .config
            .and_then(|config| config.image)
            .ok_or_else(|| {
                DockerError::Lifecycle(format!(
                    "Container {} has no image reference",
                    self.role.name
                ))
            })?;
        let (_, start_tag) = crate::docker::client::split_reference(&current_reference);

        let new_reference = format!("{}:{}", image, version);
        let new_id = self
            .bridge()
            .inspect_image(&new_reference)
            .await?
            .id
            .ok_or_else(|| DockerError::NotFound(new_reference.clone()))?;

        debug!("Tagging {} as {}:{}", new_id, image, start_tag);
        self.bridge().tag_image(&new_id, image, start_tag).await
    }

    // --- trust -------------------------------------------------------------

    /// Re-run trust verification against the tracked image without
    /// reinstalling. A missing image returns without error.
    pub async fn check_trust(&self) -> Result<()> {
        let _slot = self.acquire("check_trust", ExecutionLimit::GroupOnce).await?;

        let version = self.version().await;
        let reference = self.role.image_ref(&version.to_string());
        let inspect = match self.bridge().inspect_image(&reference).await {
            Ok(inspect) => inspect,
            Err(err) if err.is_not_found() => return Ok(()),
            Err(err) => return Err(err),
        };

        let image_id = inspect.id.unwrap_or_default();
        match self.ctx.trust.verify(image_checksum(&image_id)).await {
            TrustVerdict::Trusted => Ok(()),
            TrustVerdict::Untrusted => Err(DockerError::Trust {
                image: reference,
                reason: "content checksum is not trusted".to_string(),
            }),
            TrustVerdict::Error(reason) => Err(DockerError::Trust {
                image: reference,
                reason,
            }),
        }
    }

    // --- read-only queries --------------------------------------------------

    /// Classified state of the container, `Unknown` when absent.
    pub async fn current_state(&self) -> Result<ContainerState> {
        self.current_state_inner().await
    }

    async fn current_state_inner(&self) -> Result<ContainerState> {
        match self.bridge().inspect_container(&self.role.name).await {
            Ok(inspect) => Ok(classify_state(inspect.state.as_ref())),
            Err(err) if err.is_not_found() => Ok(ContainerState::Unknown),
            Err(err) => Err(err),
        }
    }

    /// True while the container process is up.
    pub async fn is_running(&self) -> Result<bool> {
        Ok(self.current_state_inner().await?.is_running())
    }

    /// True only when the container exited with a non-zero code.
    pub async fn is_failed(&self) -> Result<bool> {
        Ok(self.current_state_inner().await? == ContainerState::Failed)
    }

    /// Tail of the container log. Errors are suppressed to empty output.
    pub async fn logs(&self) -> String {
        self.bridge()
            .container_logs(&self.role.name, true, true, Some("100"))
            .await
            .unwrap_or_default()
    }

    /// One resource usage sample of the running container.
    pub async fn stats(&self) -> Result<DockerStats> {
        let sample = self.bridge().container_stats(&self.role.name).await?;
        Ok(DockerStats::from_sample(&sample))
    }

    fn bridge(&self) -> &Arc<dyn DockerBridge> {
        self.ctx.client.bridge()
    }
}
