//! Shared test support: an in-memory daemon bridge.
//!
//! `FakeBridge` implements the daemon seam over plain hash maps so the
//! orchestration layer can be exercised end-to-end without a running daemon.
//! Real-daemon behavior it models: missing targets answer with not-found,
//! containers carry a classified state, networks track their endpoints.

#![allow(dead_code)]

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::models::{
    ContainerConfig, ContainerInspectResponse, ContainerStatsResponse, HostConfig, ImageInspect,
    ImageSummary, Network, NetworkContainer,
};
use hearth_supervisor::docker::{
    CommandReturn, ContainerSpec, DockerBridge, DockerError, LABEL_VERSION, NetworkSpec,
    Result, TrustVerdict, TrustVerifier,
};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct FakeImage {
    pub id: String,
    pub labels: HashMap<String, String>,
    pub os: String,
    pub architecture: String,
    pub variant: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeContainer {
    pub id: String,
    pub image_ref: String,
    pub running: bool,
    pub exit_code: i64,
    pub logs: String,
}

#[derive(Debug, Clone, Default)]
pub struct FakeNetwork {
    /// endpoint key -> container name
    pub endpoints: HashMap<String, String>,
}

/// In-memory daemon used by the integration tests.
#[derive(Default)]
pub struct FakeBridge {
    images: Mutex<HashMap<String, FakeImage>>,
    containers: Mutex<HashMap<String, FakeContainer>>,
    networks: Mutex<HashMap<String, FakeNetwork>>,
    calls: Mutex<Vec<String>>,
    counter: AtomicU64,
    pull_error: Mutex<Option<(u16, String)>>,
    container_inspect_error: Mutex<Option<String>>,
    image_inspect_error: Mutex<Option<String>>,
    disconnect_error: Mutex<Option<(u16, String)>>,
    stop_delay: Mutex<Option<Duration>>,
}

impl FakeBridge {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().unwrap().push(call.into());
    }

    /// All bridge calls made so far, as `operation name` strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(operation))
            .count()
    }

    fn next_id(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.counter.fetch_add(1, Ordering::SeqCst))
    }

    /// Seed a local image for `reference` (and index it by ID).
    pub fn add_image(&self, reference: &str, architecture: &str) -> String {
        let id = format!("sha256:{}", self.next_id("img"));
        let (_, tag) = reference.rsplit_once(':').unwrap_or((reference, "latest"));
        let mut labels = HashMap::new();
        labels.insert(LABEL_VERSION.to_string(), tag.to_string());
        self.images.lock().unwrap().insert(
            reference.to_string(),
            FakeImage {
                id: id.clone(),
                labels,
                os: "linux".to_string(),
                architecture: architecture.to_string(),
                variant: None,
            },
        );
        id
    }

    /// Seed an existing container.
    pub fn add_container(&self, name: &str, image_ref: &str, running: bool, exit_code: i64) {
        let id = self.next_id("ctr");
        self.containers.lock().unwrap().insert(
            name.to_string(),
            FakeContainer {
                id,
                image_ref: image_ref.to_string(),
                running,
                exit_code,
                logs: String::new(),
            },
        );
    }

    pub fn set_container_logs(&self, name: &str, logs: &str) {
        if let Some(container) = self.containers.lock().unwrap().get_mut(name) {
            container.logs = logs.to_string();
        }
    }

    /// Seed a network with a leftover endpoint under `name`.
    pub fn add_stale_network_entry(&self, network: &str, endpoint_key: &str, name: &str) {
        self.networks
            .lock()
            .unwrap()
            .entry(network.to_string())
            .or_default()
            .endpoints
            .insert(endpoint_key.to_string(), name.to_string());
    }

    /// Make every subsequent pull fail with a daemon API error.
    pub fn set_pull_error(&self, status: u16, message: &str) {
        *self.pull_error.lock().unwrap() = Some((status, message.to_string()));
    }

    /// Make every subsequent container inspection fail with a transport error.
    pub fn set_container_inspect_error(&self, message: &str) {
        *self.container_inspect_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make every subsequent image inspection fail with a transport error.
    pub fn set_image_inspect_error(&self, message: &str) {
        *self.image_inspect_error.lock().unwrap() = Some(message.to_string());
    }

    /// Make every subsequent network disconnect fail with a daemon API error.
    pub fn set_disconnect_error(&self, status: u16, message: &str) {
        *self.disconnect_error.lock().unwrap() = Some((status, message.to_string()));
    }

    /// Delay stop calls, to widen concurrency windows in tests.
    pub fn set_stop_delay(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = Some(delay);
    }

    pub fn has_image(&self, reference: &str) -> bool {
        self.images.lock().unwrap().contains_key(reference)
    }

    pub fn has_container(&self, name: &str) -> bool {
        self.containers.lock().unwrap().contains_key(name)
    }

    pub fn network_endpoints(&self, network: &str) -> HashMap<String, String> {
        self.networks
            .lock()
            .unwrap()
            .get(network)
            .map(|network| network.endpoints.clone())
            .unwrap_or_default()
    }

    fn image_by_ref_or_id(&self, key: &str) -> Option<(String, FakeImage)> {
        let images = self.images.lock().unwrap();
        images
            .iter()
            .find(|(reference, image)| reference.as_str() == key || image.id == key)
            .map(|(reference, image)| (reference.clone(), image.clone()))
    }

    fn not_found(what: &str) -> DockerError {
        DockerError::NotFound(format!("No such {}", what))
    }
}

#[async_trait]
impl DockerBridge for FakeBridge {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn pull_image(
        &self,
        image: &str,
        tag: &str,
        platform: &str,
        _credentials: Option<DockerCredentials>,
    ) -> Result<()> {
        self.record(format!("pull_image {}:{}", image, tag));
        if let Some((status, message)) = self.pull_error.lock().unwrap().clone() {
            return Err(DockerError::Api { status, message });
        }

        let architecture = platform.split('/').nth(1).unwrap_or("amd64").to_string();
        let id = format!("sha256:{}", self.next_id("pulled"));
        let mut labels = HashMap::new();
        labels.insert(LABEL_VERSION.to_string(), tag.to_string());
        self.images.lock().unwrap().insert(
            format!("{}:{}", image, tag),
            FakeImage {
                id,
                labels,
                os: "linux".to_string(),
                architecture,
                variant: None,
            },
        );
        Ok(())
    }

    async fn inspect_image(&self, reference: &str) -> Result<ImageInspect> {
        if let Some(message) = self.image_inspect_error.lock().unwrap().clone() {
            return Err(DockerError::Request(message));
        }
        let (found_ref, image) = self
            .image_by_ref_or_id(reference)
            .ok_or_else(|| Self::not_found("image"))?;
        Ok(ImageInspect {
            id: Some(image.id.clone()),
            repo_tags: Some(vec![found_ref]),
            os: Some(image.os.clone()),
            architecture: Some(image.architecture.clone()),
            variant: image.variant.clone(),
            config: Some(bollard::models::ImageConfig {
                labels: Some(image.labels.clone()),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    async fn remove_image(&self, reference: &str, _force: bool) -> Result<()> {
        self.record(format!("remove_image {}", reference));
        let mut images = self.images.lock().unwrap();
        let keys: Vec<String> = images
            .iter()
            .filter(|(key, image)| key.as_str() == reference || image.id == reference)
            .map(|(key, _)| key.clone())
            .collect();
        if keys.is_empty() {
            return Err(Self::not_found("image"));
        }
        for key in keys {
            images.remove(&key);
        }
        Ok(())
    }

    async fn list_images(&self, repository: Option<&str>) -> Result<Vec<ImageSummary>> {
        let images = self.images.lock().unwrap();
        let mut by_id: HashMap<String, Vec<String>> = HashMap::new();
        for (reference, image) in images.iter() {
            let repo = reference
                .rsplit_once(':')
                .map(|(repo, _)| repo)
                .unwrap_or(reference);
            if repository.is_none_or(|wanted| wanted == repo) {
                by_id.entry(image.id.clone()).or_default().push(reference.clone());
            }
        }

        Ok(by_id
            .into_iter()
            .map(|(id, repo_tags)| ImageSummary {
                id,
                repo_tags,
                ..Default::default()
            })
            .collect())
    }

    async fn tag_image(&self, reference: &str, repo: &str, tag: &str) -> Result<()> {
        self.record(format!("tag_image {} {}:{}", reference, repo, tag));
        let (_, image) = self
            .image_by_ref_or_id(reference)
            .ok_or_else(|| Self::not_found("image"))?;
        self.images
            .lock()
            .unwrap()
            .insert(format!("{}:{}", repo, tag), image);
        Ok(())
    }

    async fn create_container(&self, name: &str, spec: ContainerSpec) -> Result<String> {
        self.record(format!("create_container {}", name));
        if !self.images.lock().unwrap().contains_key(&spec.image) {
            return Err(Self::not_found("image"));
        }

        let id = self.next_id("ctr");
        self.containers.lock().unwrap().insert(
            name.to_string(),
            FakeContainer {
                id: id.clone(),
                image_ref: spec.image,
                running: false,
                exit_code: 0,
                logs: String::new(),
            },
        );
        Ok(id)
    }

    async fn inspect_container(&self, name: &str) -> Result<ContainerInspectResponse> {
        if let Some(message) = self.container_inspect_error.lock().unwrap().clone() {
            return Err(DockerError::Request(message));
        }
        let container = self
            .containers
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| Self::not_found("container"))?;
        let image_id = self
            .image_by_ref_or_id(&container.image_ref)
            .map(|(_, image)| image.id);
        let labels = self
            .image_by_ref_or_id(&container.image_ref)
            .map(|(_, image)| image.labels)
            .unwrap_or_default();

        let status = if container.running {
            bollard::models::ContainerStateStatusEnum::RUNNING
        } else {
            bollard::models::ContainerStateStatusEnum::EXITED
        };

        Ok(ContainerInspectResponse {
            id: Some(container.id.clone()),
            image: image_id,
            config: Some(ContainerConfig {
                image: Some(container.image_ref.clone()),
                labels: Some(labels),
                ..Default::default()
            }),
            host_config: Some(HostConfig::default()),
            state: Some(bollard::models::ContainerState {
                status: Some(status),
                running: Some(container.running),
                exit_code: Some(container.exit_code),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    async fn start_container(&self, name: &str) -> Result<()> {
        self.record(format!("start_container {}", name));
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| Self::not_found("container"))?;
        container.running = true;
        Ok(())
    }

    async fn stop_container(&self, name: &str, _timeout: i64) -> Result<()> {
        self.record(format!("stop_container {}", name));
        let delay = *self.stop_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| Self::not_found("container"))?;
        container.running = false;
        Ok(())
    }

    async fn restart_container(&self, name: &str, _timeout: i64) -> Result<()> {
        self.record(format!("restart_container {}", name));
        let mut containers = self.containers.lock().unwrap();
        let container = containers
            .get_mut(name)
            .ok_or_else(|| Self::not_found("container"))?;
        container.running = true;
        Ok(())
    }

    async fn remove_container(&self, name: &str, _force: bool) -> Result<()> {
        self.record(format!("remove_container {}", name));
        self.containers
            .lock()
            .unwrap()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| Self::not_found("container"))
    }

    async fn wait_container(&self, name: &str) -> Result<i64> {
        let containers = self.containers.lock().unwrap();
        containers
            .get(name)
            .map(|container| container.exit_code)
            .ok_or_else(|| Self::not_found("container"))
    }

    async fn container_logs(
        &self,
        name: &str,
        _stdout: bool,
        _stderr: bool,
        _tail: Option<&str>,
    ) -> Result<String> {
        let containers = self.containers.lock().unwrap();
        containers
            .get(name)
            .map(|container| container.logs.clone())
            .ok_or_else(|| Self::not_found("container"))
    }

    async fn container_stats(&self, name: &str) -> Result<ContainerStatsResponse> {
        if !self.containers.lock().unwrap().contains_key(name) {
            return Err(Self::not_found("container"));
        }
        Ok(ContainerStatsResponse::default())
    }

    async fn exec_in_container(&self, name: &str, cmd: Vec<String>) -> Result<CommandReturn> {
        self.record(format!("exec_in_container {} {:?}", name, cmd));
        if !self.containers.lock().unwrap().contains_key(name) {
            return Err(Self::not_found("container"));
        }
        Ok(CommandReturn {
            stdout: String::new(),
            stderr: String::new(),
            exit_code: 0,
        })
    }

    async fn inspect_network(&self, name: &str) -> Result<Network> {
        let networks = self.networks.lock().unwrap();
        let network = networks.get(name).ok_or_else(|| Self::not_found("network"))?;
        let containers = network
            .endpoints
            .iter()
            .map(|(key, container_name)| {
                (
                    key.clone(),
                    NetworkContainer {
                        name: Some(container_name.clone()),
                        ..Default::default()
                    },
                )
            })
            .collect();
        Ok(Network {
            name: Some(name.to_string()),
            containers: Some(containers),
            ..Default::default()
        })
    }

    async fn create_network(&self, spec: NetworkSpec) -> Result<String> {
        self.record(format!("create_network {}", spec.name));
        self.networks
            .lock()
            .unwrap()
            .insert(spec.name.clone(), FakeNetwork::default());
        Ok(self.next_id("net"))
    }

    async fn connect_network(
        &self,
        network: &str,
        container: &str,
        _aliases: Vec<String>,
        _ipv4: Option<Ipv4Addr>,
    ) -> Result<()> {
        self.record(format!("connect_network {} {}", network, container));
        let mut networks = self.networks.lock().unwrap();
        let network = networks
            .get_mut(network)
            .ok_or_else(|| Self::not_found("network"))?;
        network
            .endpoints
            .insert(container.to_string(), container.to_string());
        Ok(())
    }

    async fn disconnect_network(&self, network: &str, container: &str, _force: bool) -> Result<()> {
        self.record(format!("disconnect_network {} {}", network, container));
        if let Some((status, message)) = self.disconnect_error.lock().unwrap().clone() {
            return Err(DockerError::Api { status, message });
        }
        let mut networks = self.networks.lock().unwrap();
        let entry = networks
            .get_mut(network)
            .ok_or_else(|| Self::not_found("network"))?;
        let keys: Vec<String> = entry
            .endpoints
            .iter()
            .filter(|(key, name)| key.as_str() == container || name.as_str() == container)
            .map(|(key, _)| key.clone())
            .collect();
        if keys.is_empty() {
            return Err(Self::not_found("endpoint"));
        }
        for key in keys {
            entry.endpoints.remove(&key);
        }
        Ok(())
    }
}

/// Trust verifier with a programmable verdict.
pub struct FakeTrust {
    verdict: Mutex<TrustVerdict>,
}

impl FakeTrust {
    pub fn new(verdict: TrustVerdict) -> Self {
        Self {
            verdict: Mutex::new(verdict),
        }
    }

    pub fn set_verdict(&self, verdict: TrustVerdict) {
        *self.verdict.lock().unwrap() = verdict;
    }
}

#[async_trait]
impl TrustVerifier for FakeTrust {
    async fn verify(&self, _checksum: &str) -> TrustVerdict {
        self.verdict.lock().unwrap().clone()
    }
}
