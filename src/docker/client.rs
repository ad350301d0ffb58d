//! Docker daemon seam.
//!
//! [`DockerBridge`] is the thin, mockable trait over the bollard API; every
//! daemon call in this crate goes through it. [`DockerClient`] layers the
//! composite operations (pull with credentials, run with network attachment,
//! stop-and-remove, image cleanup, one-shot commands) on top of the bridge.

use crate::docker::network::DockerNetwork;
use crate::docker::roles::ContainerRole;
use crate::docker::{DockerConfig, DockerError, Result};
use async_trait::async_trait;
use bollard::Docker;
use bollard::auth::DockerCredentials;
use bollard::exec::{CreateExecOptions, StartExecResults};
use bollard::models::{ContainerInspectResponse, ContainerStatsResponse, ImageInspect, Network};
use bollard::service::{HostConfig, Mount, ResourcesUlimits};
use futures::stream::StreamExt;
use semver::Version;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of one command executed inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReturn {
    /// Captured standard output
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
    /// Process exit code
    pub exit_code: i64,
}

impl CommandReturn {
    /// True when the command exited with code 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Everything the daemon needs to create one container.
#[derive(Debug, Clone, Default)]
pub struct ContainerSpec {
    /// Image reference (`repository:tag`)
    pub image: String,
    /// Container hostname
    pub hostname: Option<String>,
    /// Command override
    pub cmd: Option<Vec<String>>,
    /// Environment in `KEY=value` form
    pub env: Vec<String>,
    /// Container labels
    pub labels: HashMap<String, String>,
    /// Run an init process as PID 1
    pub init: bool,
    /// Network mode override (for example `host`)
    pub network_mode: Option<String>,
    /// Extra `/etc/hosts` entries in `host:ip` form
    pub extra_hosts: Vec<String>,
    /// Bind/volume mounts
    pub mounts: Vec<Mount>,
    /// Added Linux capabilities
    pub cap_add: Vec<String>,
    /// Security options
    pub security_opt: Vec<String>,
    /// Resource ulimits
    pub ulimits: Vec<ResourcesUlimits>,
    /// Device cgroup rules
    pub device_cgroup_rules: Vec<String>,
    /// CPU real-time runtime limit in microseconds
    pub cpu_rt_runtime: Option<i64>,
    /// Privileged mode
    pub privileged: bool,
}

/// Parameters for creating the private network.
#[derive(Debug, Clone)]
pub struct NetworkSpec {
    /// Network name
    pub name: String,
    /// Subnet in CIDR form
    pub subnet: String,
    /// Gateway address
    pub gateway: String,
    /// Address allocation range in CIDR form
    pub ip_range: String,
}

/// Split an image reference into repository and tag.
///
/// Registry hosts with ports are handled; a reference without a tag defaults
/// to `latest`.
pub(crate) fn split_reference(reference: &str) -> (&str, &str) {
    match reference.rsplit_once(':') {
        Some((repo, tag)) if !tag.contains('/') => (repo, tag),
        _ => (reference, "latest"),
    }
}

/// Thin, mockable surface over the daemon API.
///
/// Production code uses [`BollardBridge`]; tests drive the orchestration layer
/// with an in-memory implementation.
#[async_trait]
pub trait DockerBridge: Send + Sync {
    /// Verify daemon connectivity.
    async fn ping(&self) -> Result<()>;

    /// Pull `image:tag` for a platform, optionally authenticating.
    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        platform: &str,
        credentials: Option<DockerCredentials>,
    ) -> Result<()>;
    /// Inspect a local image by reference or ID.
    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect>;
    /// Remove a local image by reference or ID.
    async fn remove_image(&self, reference: &str, force: bool) -> Result<()>;
    /// List local images, optionally filtered by repository reference.
    async fn list_images(&self, repository: Option<&str>) -> Result<Vec<bollard::models::ImageSummary>>;
    /// Add a `repo:tag` alias to an existing image.
    async fn tag_image(&self, reference: &str, repo: &str, tag: &str) -> Result<()>;

    /// Create a container; returns its daemon ID.
    async fn create_container(&self, name: &str, spec: ContainerSpec) -> Result<String>;
    /// Inspect a container by name or ID.
    async fn inspect_container(&self, name: &str) -> Result<ContainerInspectResponse>;
    /// Start a container.
    async fn start_container(&self, name: &str) -> Result<()>;
    /// Stop a container with a timeout in seconds.
    async fn stop_container(&self, name: &str, timeout: i64) -> Result<()>;
    /// Restart a container with a timeout in seconds.
    async fn restart_container(&self, name: &str, timeout: i64) -> Result<()>;
    /// Remove a container.
    async fn remove_container(&self, name: &str, force: bool) -> Result<()>;
    /// Wait for a container to exit; returns its exit code.
    async fn wait_container(&self, name: &str) -> Result<i64>;
    /// Collect container logs.
    async fn container_logs(
        &self,
        name: &str,
        stdout: bool,
        stderr: bool,
        tail: Option<&str>,
    ) -> Result<String>;
    /// Take one resource statistics sample.
    async fn container_stats(&self, name: &str) -> Result<ContainerStatsResponse>;
    /// Execute a command inside a running container.
    async fn exec_in_container(&self, name: &str, cmd: Vec<String>) -> Result<CommandReturn>;

    /// Inspect a network by name.
    async fn inspect_network(&self, name: &str) -> Result<Network>;
    /// Create a network; returns its daemon ID.
    async fn create_network(&self, spec: NetworkSpec) -> Result<String>;
    /// Connect a container to a network.
    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        aliases: Vec<String>,
        ipv4: Option<Ipv4Addr>,
    ) -> Result<()>;
    /// Disconnect a container from a network.
    async fn disconnect_network(&self, network: &str, container: &str, force: bool) -> Result<()>;
}

/// Production [`DockerBridge`] over the bollard client.
#[derive(Clone)]
pub struct BollardBridge {
    docker: Docker,
}

impl BollardBridge {
    /// Connect to the daemon via local defaults (Unix socket or `DOCKER_HOST`).
    ///
    /// # Errors
    ///
    /// Returns a request error if no daemon connection can be established.
    pub fn connect() -> Result<Self> {
        debug!("Connecting to Docker daemon via local defaults");
        let docker = Docker::connect_with_local_defaults()
            .map_err(|err| DockerError::Request(format!("Can't connect to Docker: {}", err)))?;
        Ok(Self { docker })
    }

    /// Wrap an existing bollard client.
    pub fn with_docker(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl DockerBridge for BollardBridge {
    async fn ping(&self) -> Result<()> {
        self.docker.ping().await?;
        debug!("Docker daemon ping successful");
        Ok(())
    }

    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        platform: &str,
        credentials: Option<DockerCredentials>,
    ) -> Result<()> {
        let options = bollard::image::CreateImageOptions {
            from_image: image.to_string(),
            tag: tag.to_string(),
            platform: platform.to_string(),
            ..Default::default()
        };

        let mut stream = self.docker.create_image(Some(options), None, credentials);
        while let Some(result) = stream.next().await {
            let progress = result?;
            if let Some(error) = progress.error {
                return Err(DockerError::Request(format!("Pull failed: {}", error)));
            }
            if let Some(status) = progress.status {
                debug!("Pull {}:{}: {}", image, tag, status);
            }
        }
        Ok(())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect> {
        Ok(self.docker.inspect_image(reference).await?)
    }

    async fn remove_image(&self, reference: &str, force: bool) -> Result<()> {
        self.docker
            .remove_image(
                reference,
                Some(bollard::image::RemoveImageOptions {
                    force,
                    ..Default::default()
                }),
                None,
            )
            .await?;
        Ok(())
    }

    async fn list_images(
        &self,
        repository: Option<&str>,
    ) -> Result<Vec<bollard::models::ImageSummary>> {
        let mut filters = HashMap::new();
        if let Some(repository) = repository {
            filters.insert("reference".to_string(), vec![repository.to_string()]);
        }

        Ok(self
            .docker
            .list_images(Some(bollard::image::ListImagesOptions::<String> {
                all: true,
                filters,
                ..Default::default()
            }))
            .await?)
    }

    async fn tag_image(&self, reference: &str, repo: &str, tag: &str) -> Result<()> {
        self.docker
            .tag_image(
                reference,
                Some(bollard::image::TagImageOptions::<String> {
                    repo: repo.to_string(),
                    tag: tag.to_string(),
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn create_container(&self, name: &str, spec: ContainerSpec) -> Result<String> {
        let options = bollard::container::CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        };

        let host_config = HostConfig {
            init: Some(spec.init),
            mounts: (!spec.mounts.is_empty()).then_some(spec.mounts),
            cap_add: (!spec.cap_add.is_empty()).then_some(spec.cap_add),
            security_opt: (!spec.security_opt.is_empty()).then_some(spec.security_opt),
            ulimits: (!spec.ulimits.is_empty()).then_some(spec.ulimits),
            device_cgroup_rules: (!spec.device_cgroup_rules.is_empty())
                .then_some(spec.device_cgroup_rules),
            cpu_realtime_runtime: spec.cpu_rt_runtime,
            network_mode: spec.network_mode,
            extra_hosts: (!spec.extra_hosts.is_empty()).then_some(spec.extra_hosts),
            privileged: Some(spec.privileged),
            ..Default::default()
        };

        let config = bollard::container::Config::<String> {
            image: Some(spec.image),
            hostname: spec.hostname,
            cmd: spec.cmd,
            env: (!spec.env.is_empty()).then_some(spec.env),
            labels: (!spec.labels.is_empty()).then_some(spec.labels),
            host_config: Some(host_config),
            ..Default::default()
        };

        let response = self.docker.create_container(Some(options), config).await?;
        Ok(response.id)
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerInspectResponse> {
        Ok(self
            .docker
            .inspect_container(
                name,
                None::<bollard::query_parameters::InspectContainerOptions>,
            )
            .await?)
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.docker
            .start_container(name, None::<bollard::container::StartContainerOptions<String>>)
            .await?;
        Ok(())
    }

    async fn stop_container(&self, name: &str, timeout: i64) -> Result<()> {
        self.docker
            .stop_container(
                name,
                Some(bollard::container::StopContainerOptions { t: timeout }),
            )
            .await?;
        Ok(())
    }

    async fn restart_container(&self, name: &str, timeout: i64) -> Result<()> {
        self.docker
            .restart_container(
                name,
                Some(bollard::container::RestartContainerOptions {
                    t: timeout as isize,
                }),
            )
            .await?;
        Ok(())
    }

    async fn remove_container(&self, name: &str, force: bool) -> Result<()> {
        self.docker
            .remove_container(
                name,
                Some(bollard::container::RemoveContainerOptions {
                    force,
                    v: true,
                    ..Default::default()
                }),
            )
            .await?;
        Ok(())
    }

    async fn wait_container(&self, name: &str) -> Result<i64> {
        let mut stream = self
            .docker
            .wait_container(name, None::<bollard::container::WaitContainerOptions<String>>);

        match stream.next().await {
            Some(Ok(response)) => Ok(response.status_code),
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => Ok(code),
            Some(Err(err)) => Err(err.into()),
            None => Err(DockerError::Request(format!(
                "Wait on {} ended without a result",
                name
            ))),
        }
    }

    async fn container_logs(
        &self,
        name: &str,
        stdout: bool,
        stderr: bool,
        tail: Option<&str>,
    ) -> Result<String> {
        let mut stream = self.docker.logs(
            name,
            Some(bollard::container::LogsOptions {
                stdout,
                stderr,
                tail: tail.unwrap_or("all").to_string(),
                ..Default::default()
            }),
        );

        let mut output = String::new();
        while let Some(result) = stream.next().await {
            output.push_str(&result?.to_string());
        }
        Ok(output)
    }

    async fn container_stats(&self, name: &str) -> Result<ContainerStatsResponse> {
        let mut stream = self.docker.stats(
            name,
            Some(bollard::container::StatsOptions {
                stream: false,
                one_shot: false,
            }),
        );

        match stream.next().await {
            Some(sample) => Ok(sample?),
            None => Err(DockerError::Request(format!(
                "No stats available for {}",
                name
            ))),
        }
    }

    async fn exec_in_container(&self, name: &str, cmd: Vec<String>) -> Result<CommandReturn> {
        debug!("Executing {:?} inside {}", cmd, name);

        let exec = self
            .docker
            .create_exec(
                name,
                CreateExecOptions::<String> {
                    cmd: Some(cmd),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let mut stdout = String::new();
        let mut stderr = String::new();

        match self.docker.start_exec(&exec.id, None).await? {
            StartExecResults::Attached { mut output, .. } => {
                while let Some(result) = output.next().await {
                    let log = result?;
                    let text = log.to_string();
                    match log {
                        bollard::container::LogOutput::StdOut { .. } => stdout.push_str(&text),
                        bollard::container::LogOutput::StdErr { .. } => stderr.push_str(&text),
                        _ => {}
                    }
                }
            }
            StartExecResults::Detached => {
                return Err(DockerError::Request(
                    "Unexpected detached execution".to_string(),
                ));
            }
        }

        let inspect = self.docker.inspect_exec(&exec.id).await?;
        Ok(CommandReturn {
            stdout,
            stderr,
            exit_code: inspect.exit_code.unwrap_or_default(),
        })
    }

    async fn inspect_network(&self, name: &str) -> Result<Network> {
        Ok(self
            .docker
            .inspect_network(
                name,
                None::<bollard::network::InspectNetworkOptions<String>>,
            )
            .await?)
    }

    async fn create_network(&self, spec: NetworkSpec) -> Result<String> {
        let ipam = bollard::models::Ipam {
            driver: Some("default".to_string()),
            config: Some(vec![bollard::models::IpamConfig {
                subnet: Some(spec.subnet),
                gateway: Some(spec.gateway),
                ip_range: Some(spec.ip_range),
                ..Default::default()
            }]),
            ..Default::default()
        };

        let mut options = HashMap::new();
        options.insert(
            "com.docker.network.bridge.name".to_string(),
            spec.name.clone(),
        );

        let response = self
            .docker
            .create_network(bollard::network::CreateNetworkOptions {
                name: spec.name,
                driver: "bridge".to_string(),
                ipam,
                enable_ipv6: false,
                options,
                ..Default::default()
            })
            .await?;
        Ok(response.id)
    }

    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        aliases: Vec<String>,
        ipv4: Option<Ipv4Addr>,
    ) -> Result<()> {
        let endpoint_config = bollard::models::EndpointSettings {
            aliases: (!aliases.is_empty()).then_some(aliases),
            ipam_config: ipv4.map(|address| bollard::models::EndpointIpamConfig {
                ipv4_address: Some(address.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        };

        self.docker
            .connect_network(
                network,
                bollard::network::ConnectNetworkOptions {
                    container: container.to_string(),
                    endpoint_config,
                },
            )
            .await?;
        Ok(())
    }

    async fn disconnect_network(&self, network: &str, container: &str, force: bool) -> Result<()> {
        self.docker
            .disconnect_network(
                network,
                bollard::network::DisconnectNetworkOptions {
                    container: container.to_string(),
                    force,
                },
            )
            .await?;
        Ok(())
    }
}

/// Composite daemon operations shared by all container interfaces.
///
/// Owns the registry credential store and the private network manager; one
/// instance lives for the process lifetime inside the
/// [`DockerContext`](crate::docker::DockerContext).
pub struct DockerClient {
    bridge: Arc<dyn DockerBridge>,
    config: DockerConfig,
    network: DockerNetwork,
}

impl DockerClient {
    /// Create a client over a bridge with its credential store.
    pub fn new(bridge: Arc<dyn DockerBridge>, config: DockerConfig) -> Self {
        let network = DockerNetwork::new(bridge.clone());
        Self {
            bridge,
            config,
            network,
        }
    }

    /// The raw daemon seam.
    pub fn bridge(&self) -> &Arc<dyn DockerBridge> {
        &self.bridge
    }

    /// The registry credential store.
    pub fn config(&self) -> &DockerConfig {
        &self.config
    }

    /// The private network manager.
    pub fn network(&self) -> &DockerNetwork {
        &self.network
    }

    /// Pull `image:tag` for a platform, resolving registry credentials from
    /// the store, and return the pulled image's inspection.
    ///
    /// # Errors
    ///
    /// Daemon and transport errors propagate, including the rate-limit API
    /// error callers inspect via [`DockerError::is_rate_limit`].
    pub async fn pull(&self, image: &str, tag: &str, platform: &str) -> Result<ImageInspect> {
        let credentials = self.config.credentials_for(image).map(|resolved| {
            DockerCredentials {
                username: Some(resolved.username),
                password: Some(resolved.password),
                serveraddress: Some(resolved.registry),
                ..Default::default()
            }
        });

        self.bridge
            .pull_image(image, tag, platform, credentials)
            .await?;
        self.bridge
            .inspect_image(&format!("{}:{}", image, tag))
            .await
    }

    /// Create and start a container for a role, joining it to the private
    /// network when the role declares a network position.
    ///
    /// # Errors
    ///
    /// A missing image surfaces as [`DockerError::NotFound`]; network and
    /// daemon errors propagate.
    pub async fn run(&self, role: &ContainerRole, tag: &str) -> Result<ContainerInspectResponse> {
        let spec = role.container_spec(tag);
        debug!("Creating container {} from {}", role.name, spec.image);
        self.bridge.create_container(&role.name, spec).await?;

        if let Some(network_role) = role.network_role {
            self.network
                .attach(&role.name, &role.aliases, Some(network_role.address()))
                .await?;
            self.network.detach_default_bridge(&role.name).await?;
        }

        self.bridge.start_container(&role.name).await?;
        info!("Started container {} with tag {}", role.name, tag);

        self.bridge.inspect_container(&role.name).await
    }

    /// Stop a container, optionally removing it afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::NotFound`] when no such container exists;
    /// callers that treat that as success suppress it.
    pub async fn stop_container(&self, name: &str, timeout: i64, remove: bool) -> Result<()> {
        let inspect = self.bridge.inspect_container(name).await?;
        let running = inspect
            .state
            .as_ref()
            .and_then(|state| state.running)
            .unwrap_or(false);

        if running {
            debug!("Stopping container {}", name);
            self.bridge.stop_container(name, timeout).await?;
        }

        if remove {
            debug!("Cleaning container {}", name);
            match self.bridge.remove_container(name, true).await {
                Err(err) if err.is_not_found() => {}
                other => other?,
            }
        }
        Ok(())
    }

    /// Remove `image:version`, plus a `latest` tag still pointing at the same
    /// content.
    ///
    /// # Errors
    ///
    /// Returns [`DockerError::NotFound`] when the versioned tag is absent.
    pub async fn remove_image(&self, image: &str, version: &Version) -> Result<()> {
        let reference = format!("{}:{}", image, version);
        info!("Removing image {}", reference);

        let id = self.bridge.inspect_image(&reference).await?.id;
        self.bridge.remove_image(&reference, true).await?;

        let latest = format!("{}:latest", image);
        if let Ok(inspect) = self.bridge.inspect_image(&latest).await {
            if id.is_some() && inspect.id == id {
                if let Err(err) = self.bridge.remove_image(&latest, true).await {
                    warn!("Can't remove stale tag {}: {}", latest, err);
                }
            }
        }
        Ok(())
    }

    /// Remove locally cached images of the same repository other than the
    /// currently wanted version. `old_images` names legacy repositories to
    /// sweep as well.
    ///
    /// # Errors
    ///
    /// Fails when the wanted image cannot be resolved or the image list is
    /// unavailable; per-image removal failures are logged and skipped.
    pub async fn cleanup_old_images(
        &self,
        image: &str,
        version: &Version,
        old_images: Option<&HashSet<String>>,
    ) -> Result<()> {
        let wanted = format!("{}:{}", image, version);
        let current = self.bridge.inspect_image(&wanted).await.map_err(|err| {
            DockerError::Lifecycle(format!("Can't find {} for cleanup: {}", wanted, err))
        })?;
        let current_id = current.id.unwrap_or_default();

        let mut keep: HashSet<&str> = HashSet::from([image]);
        if let Some(old_images) = old_images {
            keep.extend(old_images.iter().map(String::as_str));
        }

        for candidate in self.bridge.list_images(None).await? {
            if candidate.id == current_id {
                continue;
            }
            let repositories: HashSet<&str> = candidate
                .repo_tags
                .iter()
                .map(|tag| split_reference(tag).0)
                .collect();
            if repositories.is_disjoint(&keep) {
                continue;
            }

            info!("Cleanup images: {:?}", candidate.repo_tags);
            if let Err(err) = self.bridge.remove_image(&candidate.id, true).await {
                warn!("Can't cleanup image {}: {}", candidate.id, err);
            }
        }
        Ok(())
    }

    /// Run a command in a fresh, throwaway container of `image_ref` and
    /// collect its output. The container is removed again on every path.
    ///
    /// # Errors
    ///
    /// Fails when the container cannot be created or the command cannot be
    /// awaited; cleanup failures are logged, not surfaced.
    pub async fn run_command(&self, image_ref: &str, command: &str) -> Result<CommandReturn> {
        let name = format!("hearth-exec-{}", uuid::Uuid::new_v4());
        info!("Running command '{}' on {}", command, image_ref);

        let spec = ContainerSpec {
            image: image_ref.to_string(),
            cmd: Some(vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                command.to_string(),
            ]),
            ..Default::default()
        };
        self.bridge.create_container(&name, spec).await?;

        let result = self.run_command_steps(&name).await;

        if let Err(err) = self.bridge.remove_container(&name, true).await {
            warn!("Can't cleanup command container {}: {}", name, err);
        }
        result
    }

    async fn run_command_steps(&self, name: &str) -> Result<CommandReturn> {
        self.bridge.start_container(name).await?;
        let exit_code = self.bridge.wait_container(name).await?;

        let stdout = self
            .bridge
            .container_logs(name, true, false, None)
            .await
            .unwrap_or_default();
        let stderr = self
            .bridge
            .container_logs(name, false, true, None)
            .await
            .unwrap_or_default();

        Ok(CommandReturn {
            stdout,
            stderr,
            exit_code,
        })
    }
}
