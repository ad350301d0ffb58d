//! Role configuration for the supervised containers.
//!
//! A role is a plain data record describing one managed container: its name,
//! image repository, runtime settings, and (when it joins the private network)
//! its fixed address and aliases. The well-known plugin roles are built by the
//! constructors below; custom workloads use [`ContainerRole::new`] and adjust
//! fields directly.

use crate::docker::client::ContainerSpec;
use crate::docker::network::{
    AUDIO_ADDRESS, CLI_ADDRESS, DNS_ADDRESS, OBSERVER_ADDRESS, SUPERVISOR_ADDRESS,
};
use crate::docker::{LABEL_MANAGED, LABEL_VERSION};
use bollard::service::{Mount, MountTypeEnum, ResourcesUlimits};
use semver::Version;
use std::collections::HashMap;
use std::net::Ipv4Addr;

const DEFAULT_STOP_TIMEOUT: i64 = 10;

/// Fixed position of a container on the private network.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkRole {
    Supervisor,
    Dns,
    Audio,
    Cli,
    Observer,
}

impl NetworkRole {
    /// The role's fixed address on the private network.
    pub fn address(&self) -> Ipv4Addr {
        match self {
            NetworkRole::Supervisor => SUPERVISOR_ADDRESS,
            NetworkRole::Dns => DNS_ADDRESS,
            NetworkRole::Audio => AUDIO_ADDRESS,
            NetworkRole::Cli => CLI_ADDRESS,
            NetworkRole::Observer => OBSERVER_ADDRESS,
        }
    }
}

/// Everything that distinguishes one supervised container from another.
#[derive(Debug, Clone)]
pub struct ContainerRole {
    /// Container name
    pub name: String,
    /// Image repository (without tag)
    pub image: String,
    /// Currently wanted version
    pub version: Version,
    /// Container hostname
    pub hostname: Option<String>,
    /// Extra environment in `KEY=value` form
    pub env: Vec<String>,
    /// Bind mounts
    pub mounts: Vec<Mount>,
    /// Added Linux capabilities
    pub capabilities: Vec<String>,
    /// Security options
    pub security_opt: Vec<String>,
    /// Resource ulimits
    pub ulimits: Vec<ResourcesUlimits>,
    /// Device cgroup rules
    pub device_cgroup_rules: Vec<String>,
    /// CPU real-time runtime limit in microseconds
    pub cpu_rt_runtime: Option<i64>,
    /// Fixed position on the private network, when the role joins it
    pub network_role: Option<NetworkRole>,
    /// DNS aliases on the private network
    pub aliases: Vec<String>,
    /// Network mode override (for example `host`)
    pub network_mode: Option<String>,
    /// Extra `/etc/hosts` entries in `host:ip` form
    pub extra_hosts: Vec<String>,
    /// Run an init process as PID 1
    pub init: bool,
    /// Privileged mode
    pub privileged: bool,
    /// The container runs to completion instead of serving
    pub one_shot: bool,
    /// Stop timeout in seconds
    pub stop_timeout: i64,
    /// Command override
    pub cmd: Option<Vec<String>>,
}

fn bind_mount(source: &str, target: &str, read_only: bool) -> Mount {
    Mount {
        typ: Some(MountTypeEnum::BIND),
        source: Some(source.to_string()),
        target: Some(target.to_string()),
        read_only: Some(read_only),
        ..Default::default()
    }
}

impl ContainerRole {
    /// A role with neutral defaults. Containers get an init process and the
    /// unconfined seccomp profile unless overridden.
    pub fn new(name: &str, image: &str, version: Version) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            version,
            hostname: None,
            env: Vec::new(),
            mounts: Vec::new(),
            capabilities: Vec::new(),
            security_opt: vec!["seccomp=unconfined".to_string()],
            ulimits: Vec::new(),
            device_cgroup_rules: Vec::new(),
            cpu_rt_runtime: None,
            network_role: None,
            aliases: Vec::new(),
            network_mode: None,
            extra_hosts: Vec::new(),
            init: true,
            privileged: false,
            one_shot: false,
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            cmd: None,
        }
    }

    /// The core application. Runs on the host network so it can reach
    /// link-local integrations directly.
    pub fn core(image: &str, version: Version) -> Self {
        let mut role = Self::new("hearth_core", image, version);
        role.hostname = Some("hearth".to_string());
        role.network_mode = Some("host".to_string());
        role.init = false;
        role.mounts = vec![
            bind_mount("/run/dbus", "/run/dbus", true),
            bind_mount("/run/udev", "/run/udev", true),
        ];
        role.stop_timeout = 260;
        role
    }

    /// The audio plugin. Needs realtime scheduling headroom and access to the
    /// host sound devices.
    pub fn audio(image: &str, version: Version) -> Self {
        let mut role = Self::new("hearth_audio", image, version);
        role.hostname = Some("hearth-audio".to_string());
        role.network_role = Some(NetworkRole::Audio);
        role.aliases = vec!["audio".to_string()];
        role.capabilities = vec!["SYS_NICE".to_string(), "SYS_RESOURCE".to_string()];
        role.ulimits = vec![ResourcesUlimits {
            name: Some("rtprio".to_string()),
            soft: Some(10),
            hard: Some(10),
        }];
        role.device_cgroup_rules = vec![
            // Sound devices (char major 116)
            "c 116:* rwm".to_string(),
        ];
        role.mounts = vec![
            bind_mount("/dev", "/dev", true),
            bind_mount("/run/dbus", "/run/dbus", true),
            bind_mount("/run/udev", "/run/udev", true),
        ];
        role
    }

    /// The DNS plugin, serving name resolution to all managed containers.
    pub fn dns(image: &str, version: Version) -> Self {
        let mut role = Self::new("hearth_dns", image, version);
        role.hostname = Some("hearth-dns".to_string());
        role.network_role = Some(NetworkRole::Dns);
        role.aliases = vec!["dns".to_string()];
        role.capabilities = vec!["NET_BIND_SERVICE".to_string()];
        role
    }

    /// The CLI plugin.
    pub fn cli(image: &str, version: Version) -> Self {
        let mut role = Self::new("hearth_cli", image, version);
        role.hostname = Some("hearth-cli".to_string());
        role.network_role = Some(NetworkRole::Cli);
        role.aliases = vec!["cli".to_string()];
        role
    }

    /// The observer plugin. Watches the supervisor from outside, so it talks
    /// to the daemon directly.
    pub fn observer(image: &str, version: Version) -> Self {
        let mut role = Self::new("hearth_observer", image, version);
        role.hostname = Some("hearth-observer".to_string());
        role.network_role = Some(NetworkRole::Observer);
        role.aliases = vec!["observer".to_string()];
        role.mounts = vec![bind_mount("/run/docker.sock", "/run/docker.sock", true)];
        role
    }

    /// The multicast plugin. Runs on the host network to relay mDNS traffic.
    pub fn multicast(image: &str, version: Version) -> Self {
        let mut role = Self::new("hearth_multicast", image, version);
        role.hostname = Some("hearth-multicast".to_string());
        role.network_mode = Some("host".to_string());
        role.capabilities = vec!["NET_ADMIN".to_string()];
        role
    }

    /// Full image reference for a tag.
    pub fn image_ref(&self, tag: &str) -> String {
        format!("{}:{}", self.image, tag)
    }

    /// Build the daemon container spec for this role at a tag.
    pub fn container_spec(&self, tag: &str) -> ContainerSpec {
        let mut labels = HashMap::new();
        labels.insert(LABEL_MANAGED.to_string(), "true".to_string());
        labels.insert(LABEL_VERSION.to_string(), tag.to_string());

        ContainerSpec {
            image: self.image_ref(tag),
            hostname: self.hostname.clone(),
            cmd: self.cmd.clone(),
            env: self.env.clone(),
            labels,
            init: self.init,
            network_mode: self.network_mode.clone(),
            extra_hosts: self.extra_hosts.clone(),
            mounts: self.mounts.clone(),
            cap_add: self.capabilities.clone(),
            security_opt: self.security_opt.clone(),
            ulimits: self.ulimits.clone(),
            device_cgroup_rules: self.device_cgroup_rules.clone(),
            cpu_rt_runtime: self.cpu_rt_runtime,
            privileged: self.privileged,
        }
    }
}
