//! Devfile resource compiler
//!
//! Turns a processed devfile into the workload resources of a workspace: one
//! Deployment, a Service for the exposed endpoints and a claim per volume
//! component. Problems that make the whole set unusable yield an empty list;
//! the caller treats that as "nothing to apply".

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

#[cfg(test)]
use mockall::automock;

use crate::domain::resource::{LabelSelector, ObjectMeta, Resource, StringMap};
use crate::error::{Error, Result};

/// Label selecting the pods of one workspace
pub const INSTANCE_LABEL: &str = "app.kubernetes.io/instance";

/// Where file variables are mounted inside every container
pub const FILE_VARIABLES_PATH: &str = "/.workspace-data/variables/file";

/// Environment variable exposing the host template to the workspace
pub const DOMAIN_TEMPLATE_ENV: &str = "GL_WORKSPACE_DOMAIN_TEMPLATE";

const FILE_VARIABLES_VOLUME: &str = "gl-workspace-variables";
const DEFAULT_VOLUME_SIZE: &str = "15Gi";
/// 0774
const FILE_VARIABLES_MODE: u32 = 508;

/// Inputs of one compilation
#[derive(Debug, Clone, PartialEq)]
pub struct CompileParams {
    pub processed_devfile: String,
    pub name: String,
    pub namespace: String,
    pub replicas: u32,
    pub domain_template: String,
    pub labels: StringMap,
    pub annotations: StringMap,
    pub env_secret_names: Vec<String>,
    pub file_secret_names: Vec<String>,
}

/// Compiles a processed devfile into Kubernetes workload resources
#[cfg_attr(test, automock)]
pub trait DevfileCompiler: Send + Sync {
    /// Returns an empty list when no usable resource set can be produced.
    /// Recoverable problems are logged and skipped.
    fn compile(&self, params: &CompileParams) -> Vec<Resource>;
}

// ==================== Devfile model ====================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Devfile {
    pub schema_version: String,
    #[serde(default)]
    pub components: Vec<Component>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Component {
    pub name: String,
    #[serde(default)]
    pub container: Option<ContainerComponent>,
    #[serde(default)]
    pub volume: Option<VolumeComponent>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerComponent {
    pub image: String,
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<DevfileEnv>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub volume_mounts: Vec<DevfileVolumeMount>,
    pub memory_limit: Option<String>,
    pub memory_request: Option<String>,
    pub cpu_limit: Option<String>,
    pub cpu_request: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevfileEnv {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub name: String,
    pub target_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DevfileVolumeMount {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VolumeComponent {
    pub size: Option<String>,
}

/// Parse a processed devfile document and check that it can be compiled:
/// a 2.x schema, at least one container, and only mounts of declared volumes.
pub fn parse_devfile(document: &str) -> Result<Devfile> {
    let devfile: Devfile =
        serde_yaml::from_str(document).map_err(|e| Error::InvalidDevfile(e.to_string()))?;

    if !devfile.schema_version.starts_with("2.") {
        return Err(Error::InvalidDevfile(format!(
            "unsupported schemaVersion {}",
            devfile.schema_version
        )));
    }

    if !devfile
        .components
        .iter()
        .any(|component| component.container.is_some())
    {
        return Err(Error::InvalidDevfile(
            "devfile has no container component".to_string(),
        ));
    }

    let volume_names: Vec<&str> = devfile
        .components
        .iter()
        .filter(|c| c.volume.is_some())
        .map(|c| c.name.as_str())
        .collect();
    for component in &devfile.components {
        let Some(container) = &component.container else {
            continue;
        };
        if let Some(mount) = container
            .volume_mounts
            .iter()
            .find(|m| !volume_names.contains(&m.name.as_str()))
        {
            return Err(Error::InvalidDevfile(format!(
                "component {} mounts undefined volume {}",
                component.name, mount.name
            )));
        }
    }

    Ok(devfile)
}

// ==================== Kubernetes manifests ====================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Manifest<S: Serialize> {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: S,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeploymentSpec {
    replicas: u32,
    selector: LabelSelector,
    strategy: DeploymentStrategy,
    template: PodTemplate,
}

#[derive(Debug, Serialize)]
struct DeploymentStrategy {
    #[serde(rename = "type")]
    strategy_type: &'static str,
}

#[derive(Debug, Serialize)]
struct PodTemplate {
    metadata: PodTemplateMeta,
    spec: PodSpec,
}

#[derive(Debug, Serialize)]
struct PodTemplateMeta {
    labels: StringMap,
    annotations: StringMap,
}

#[derive(Debug, Serialize)]
struct PodSpec {
    containers: Vec<Container>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volumes: Vec<PodVolume>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Container {
    name: String,
    image: String,
    image_pull_policy: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    command: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    args: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvVar>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env_from: Vec<EnvFromSource>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<ContainerPort>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    volume_mounts: Vec<VolumeMount>,
    #[serde(skip_serializing_if = "ResourceRequirements::is_empty")]
    resources: ResourceRequirements,
}

#[derive(Debug, Serialize)]
struct EnvVar {
    name: String,
    value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EnvFromSource {
    secret_ref: NameRef,
}

#[derive(Debug, Serialize)]
struct NameRef {
    name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerPort {
    name: String,
    container_port: u16,
    protocol: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VolumeMount {
    name: String,
    mount_path: String,
}

#[derive(Debug, Default, Serialize)]
struct ResourceRequirements {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    limits: BTreeMap<&'static str, String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    requests: BTreeMap<&'static str, String>,
}

impl ResourceRequirements {
    fn is_empty(&self) -> bool {
        self.limits.is_empty() && self.requests.is_empty()
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PodVolume {
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    persistent_volume_claim: Option<ClaimRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    projected: Option<ProjectedVolume>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimRef {
    claim_name: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ProjectedVolume {
    default_mode: u32,
    sources: Vec<ProjectionSource>,
}

#[derive(Debug, Serialize)]
struct ProjectionSource {
    secret: NameRef,
}

#[derive(Debug, Serialize)]
struct ServiceSpec {
    #[serde(rename = "type")]
    service_type: &'static str,
    selector: StringMap,
    ports: Vec<ServicePort>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ServicePort {
    name: String,
    port: u16,
    target_port: u16,
    protocol: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClaimSpec {
    access_modes: Vec<&'static str>,
    resources: ClaimResources,
}

#[derive(Debug, Serialize)]
struct ClaimResources {
    requests: BTreeMap<&'static str, String>,
}

// ==================== Compiler ====================

/// Default compiler for devfile 2.x documents
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultDevfileCompiler;

impl DevfileCompiler for DefaultDevfileCompiler {
    fn compile(&self, params: &CompileParams) -> Vec<Resource> {
        let devfile = match parse_devfile(&params.processed_devfile) {
            Ok(devfile) => devfile,
            Err(e) => {
                warn!(workspace = %params.name, error = %e, "Could not parse devfile");
                return Vec::new();
            }
        };

        match compile_devfile(&devfile, params) {
            Ok(resources) => resources,
            Err(e) => {
                warn!(workspace = %params.name, error = %e, "Could not compile devfile");
                Vec::new()
            }
        }
    }
}

fn claim_name(workspace_name: &str, volume_name: &str) -> String {
    format!("{}-{}", workspace_name, volume_name)
}

fn compile_devfile(devfile: &Devfile, params: &CompileParams) -> Result<Vec<Resource>> {
    let mut pod_labels = params.labels.clone();
    pod_labels.insert(INSTANCE_LABEL.to_string(), params.name.clone());
    let selector = LabelSelector::single(INSTANCE_LABEL, &params.name);

    let volume_names: Vec<&str> = devfile
        .components
        .iter()
        .filter(|c| c.volume.is_some())
        .map(|c| c.name.as_str())
        .collect();

    let mut containers = Vec::new();
    let mut service_ports = Vec::new();

    for component in &devfile.components {
        let Some(container) = &component.container else {
            if component.volume.is_none() {
                warn!(
                    workspace = %params.name,
                    component = %component.name,
                    "Skipping devfile component with unsupported type"
                );
            }
            continue;
        };

        let mut volume_mounts: Vec<VolumeMount> = container
            .volume_mounts
            .iter()
            .map(|mount| VolumeMount {
                name: mount.name.clone(),
                mount_path: mount.path.clone(),
            })
            .collect();
        if !params.file_secret_names.is_empty() {
            volume_mounts.push(VolumeMount {
                name: FILE_VARIABLES_VOLUME.to_string(),
                mount_path: FILE_VARIABLES_PATH.to_string(),
            });
        }

        let mut resources = ResourceRequirements::default();
        if let Some(memory) = &container.memory_limit {
            resources.limits.insert("memory", memory.clone());
        }
        if let Some(cpu) = &container.cpu_limit {
            resources.limits.insert("cpu", cpu.clone());
        }
        if let Some(memory) = &container.memory_request {
            resources.requests.insert("memory", memory.clone());
        }
        if let Some(cpu) = &container.cpu_request {
            resources.requests.insert("cpu", cpu.clone());
        }

        let ports: Vec<ContainerPort> = container
            .endpoints
            .iter()
            .map(|endpoint| ContainerPort {
                name: endpoint.name.clone(),
                container_port: endpoint.target_port,
                protocol: "TCP",
            })
            .collect();
        service_ports.extend(container.endpoints.iter().map(|endpoint| ServicePort {
            name: endpoint.name.clone(),
            port: endpoint.target_port,
            target_port: endpoint.target_port,
            protocol: "TCP",
        }));

        containers.push(Container {
            name: component.name.clone(),
            image: container.image.clone(),
            image_pull_policy: "IfNotPresent",
            command: container.command.clone(),
            args: container.args.clone(),
            env: container
                .env
                .iter()
                .map(|e| EnvVar {
                    name: e.name.clone(),
                    value: e.value.clone(),
                })
                .chain(std::iter::once(EnvVar {
                    name: DOMAIN_TEMPLATE_ENV.to_string(),
                    value: params.domain_template.clone(),
                }))
                .collect(),
            env_from: params
                .env_secret_names
                .iter()
                .map(|name| EnvFromSource {
                    secret_ref: NameRef { name: name.clone() },
                })
                .collect(),
            ports,
            volume_mounts,
            resources,
        });
    }

    let mut volumes: Vec<PodVolume> = volume_names
        .iter()
        .map(|volume| PodVolume {
            name: volume.to_string(),
            persistent_volume_claim: Some(ClaimRef {
                claim_name: claim_name(&params.name, volume),
            }),
            projected: None,
        })
        .collect();
    if !params.file_secret_names.is_empty() {
        volumes.push(PodVolume {
            name: FILE_VARIABLES_VOLUME.to_string(),
            persistent_volume_claim: None,
            projected: Some(ProjectedVolume {
                default_mode: FILE_VARIABLES_MODE,
                sources: params
                    .file_secret_names
                    .iter()
                    .map(|name| ProjectionSource {
                        secret: NameRef { name: name.clone() },
                    })
                    .collect(),
            }),
        });
    }

    let metadata = ObjectMeta::new(
        &params.name,
        &params.namespace,
        &params.labels,
        &params.annotations,
    );

    let mut resources = vec![Resource::from_manifest(&Manifest {
        api_version: "apps/v1",
        kind: "Deployment",
        metadata: metadata.clone(),
        spec: DeploymentSpec {
            replicas: params.replicas,
            selector: selector.clone(),
            strategy: DeploymentStrategy {
                strategy_type: "Recreate",
            },
            template: PodTemplate {
                metadata: PodTemplateMeta {
                    labels: pod_labels,
                    annotations: params.annotations.clone(),
                },
                spec: PodSpec {
                    containers,
                    volumes,
                },
            },
        },
    })?];

    if !service_ports.is_empty() {
        resources.push(Resource::from_manifest(&Manifest {
            api_version: "v1",
            kind: "Service",
            metadata,
            spec: ServiceSpec {
                service_type: "ClusterIP",
                selector: selector.match_labels,
                ports: service_ports,
            },
        })?);
    }

    for component in &devfile.components {
        let Some(volume) = &component.volume else {
            continue;
        };
        let mut requests = BTreeMap::new();
        requests.insert(
            "storage",
            volume
                .size
                .clone()
                .unwrap_or_else(|| DEFAULT_VOLUME_SIZE.to_string()),
        );
        resources.push(Resource::from_manifest(&Manifest {
            api_version: "v1",
            kind: "PersistentVolumeClaim",
            metadata: ObjectMeta::new(
                claim_name(&params.name, &component.name),
                &params.namespace,
                &params.labels,
                &params.annotations,
            ),
            spec: ClaimSpec {
                access_modes: vec!["ReadWriteOnce"],
                resources: ClaimResources { requests },
            },
        })?);
    }

    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::desired_config::context::tests::SAMPLE_DEVFILE;
    use serde_json::json;

    fn params(devfile: &str, replicas: u32) -> CompileParams {
        let mut labels = StringMap::new();
        labels.insert("agent.gitlab.com/id".to_string(), "1".to_string());
        let mut annotations = StringMap::new();
        annotations.insert(
            "config.k8s.io/owning-inventory".to_string(),
            "ws1-workspace-inventory".to_string(),
        );
        CompileParams {
            processed_devfile: devfile.to_string(),
            name: "ws1".to_string(),
            namespace: "ns1".to_string(),
            replicas,
            domain_template: "{{.port}}-ws1.example.com".to_string(),
            labels,
            annotations,
            env_secret_names: vec!["ws1-env-var".to_string()],
            file_secret_names: vec!["ws1-file".to_string()],
        }
    }

    #[test]
    fn test_compile_sample_devfile() {
        let resources = DefaultDevfileCompiler.compile(&params(SAMPLE_DEVFILE, 1));

        let kinds: Vec<_> = resources.iter().map(|r| r.kind().unwrap()).collect();
        assert_eq!(kinds, vec!["Deployment", "Service", "PersistentVolumeClaim"]);
        assert_eq!(resources[0].name(), Some("ws1"));
        assert_eq!(resources[2].name(), Some("ws1-gl-workspace-data"));

        for resource in &resources {
            assert_eq!(
                resource.annotation("config.k8s.io/owning-inventory"),
                Some("ws1-workspace-inventory")
            );
            assert_eq!(resource.label("agent.gitlab.com/id"), Some("1"));
        }
    }

    #[test]
    fn test_deployment_carries_replicas() {
        let running = DefaultDevfileCompiler.compile(&params(SAMPLE_DEVFILE, 1));
        assert_eq!(running[0].pointer("/spec/replicas"), Some(&json!(1)));

        let stopped = DefaultDevfileCompiler.compile(&params(SAMPLE_DEVFILE, 0));
        assert_eq!(stopped[0].pointer("/spec/replicas"), Some(&json!(0)));
    }

    #[test]
    fn test_secrets_are_wired_into_containers() {
        let resources = DefaultDevfileCompiler.compile(&params(SAMPLE_DEVFILE, 1));
        let container = resources[0]
            .pointer("/spec/template/spec/containers/0")
            .unwrap();

        assert_eq!(container["envFrom"], json!([{"secretRef": {"name": "ws1-env-var"}}]));
        assert_eq!(
            container["volumeMounts"],
            json!([
                {"name": "gl-workspace-data", "mountPath": "/projects"},
                {"name": "gl-workspace-variables", "mountPath": FILE_VARIABLES_PATH}
            ])
        );
        assert_eq!(container["ports"][0]["containerPort"], json!(60001));
        assert_eq!(
            container["env"],
            json!([
                {"name": "EDITOR_PORT", "value": "60001"},
                {"name": DOMAIN_TEMPLATE_ENV, "value": "{{.port}}-ws1.example.com"}
            ])
        );
        assert_eq!(container["resources"]["limits"]["memory"], json!("1Gi"));

        let volumes = resources[0].pointer("/spec/template/spec/volumes").unwrap();
        assert_eq!(
            volumes[1]["projected"]["sources"],
            json!([{"secret": {"name": "ws1-file"}}])
        );
    }

    #[test]
    fn test_pods_are_selected_by_workspace_name() {
        let resources = DefaultDevfileCompiler.compile(&params(SAMPLE_DEVFILE, 1));
        assert_eq!(
            resources[0].pointer("/spec/selector/matchLabels"),
            Some(&json!({INSTANCE_LABEL: "ws1"}))
        );
        assert_eq!(
            resources[0].pointer("/spec/template/metadata/labels/app.kubernetes.io~1instance"),
            Some(&json!("ws1"))
        );
        assert_eq!(
            resources[1].pointer("/spec/selector"),
            Some(&json!({INSTANCE_LABEL: "ws1"}))
        );
    }

    #[test]
    fn test_unparseable_devfile_yields_nothing() {
        assert!(DefaultDevfileCompiler
            .compile(&params("components: [unclosed", 1))
            .is_empty());
    }

    #[test]
    fn test_devfile_without_containers_yields_nothing() {
        let devfile = "schemaVersion: 2.2.0\ncomponents:\n  - name: data\n    volume: {}\n";
        assert!(DefaultDevfileCompiler.compile(&params(devfile, 1)).is_empty());
        assert!(matches!(
            parse_devfile(devfile),
            Err(Error::InvalidDevfile(_))
        ));
    }

    #[test]
    fn test_undefined_volume_mount_yields_nothing() {
        let devfile = r#"
schemaVersion: 2.2.0
components:
  - name: tooling
    container:
      image: alpine
      volumeMounts:
        - name: missing
          path: /data
"#;
        assert!(DefaultDevfileCompiler.compile(&params(devfile, 1)).is_empty());
        assert!(matches!(
            parse_devfile(devfile),
            Err(Error::InvalidDevfile(message)) if message.contains("missing")
        ));
    }

    #[test]
    fn test_unsupported_schema_version_is_rejected() {
        let devfile = "schemaVersion: 1.0.0\ncomponents:\n  - name: tooling\n    container:\n      image: alpine\n";
        assert!(matches!(
            parse_devfile(devfile),
            Err(Error::InvalidDevfile(_))
        ));
    }

    #[test]
    fn test_no_endpoints_means_no_service() {
        let devfile = "schemaVersion: 2.2.0\ncomponents:\n  - name: tooling\n    container:\n      image: alpine\n";
        let resources = DefaultDevfileCompiler.compile(&params(devfile, 1));
        let kinds: Vec<_> = resources.iter().map(|r| r.kind().unwrap()).collect();
        assert_eq!(kinds, vec!["Deployment"]);
    }
}
