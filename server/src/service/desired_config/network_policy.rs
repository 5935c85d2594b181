//! Workspace NetworkPolicy
//!
//! Ingress is only allowed from the workspaces proxy. Egress is allowed to the
//! public internet but not to private address ranges, with DNS to kube-system
//! carved out since cluster DNS lives in a private range.

use serde::Serialize;

use crate::domain::resource::{LabelSelector, ObjectMeta, Resource, StringMap};
use crate::error::Result;

/// Label of the namespace name set by Kubernetes on every namespace
const NAMESPACE_NAME_LABEL: &str = "kubernetes.io/metadata.name";

/// Label the workspaces proxy pods carry
const APP_NAME_LABEL: &str = "app.kubernetes.io/name";
const PROXY_APP_NAME: &str = "gitlab-workspaces-proxy";

/// Address ranges workspaces must not reach
pub const PRIVATE_CIDRS: [&str; 3] = ["10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];

const ANY_CIDR: &str = "0.0.0.0/0";
const DNS_PORT: u16 = 53;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkPolicy {
    api_version: &'static str,
    kind: &'static str,
    metadata: ObjectMeta,
    spec: NetworkPolicySpec,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkPolicySpec {
    pod_selector: LabelSelector,
    policy_types: Vec<&'static str>,
    ingress: Vec<IngressRule>,
    egress: Vec<EgressRule>,
}

#[derive(Debug, Serialize)]
struct IngressRule {
    from: Vec<PolicyPeer>,
}

#[derive(Debug, Serialize)]
struct EgressRule {
    to: Vec<PolicyPeer>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    ports: Vec<PolicyPort>,
}

#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
struct PolicyPeer {
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace_selector: Option<LabelSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pod_selector: Option<LabelSelector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ip_block: Option<IpBlock>,
}

#[derive(Debug, Serialize)]
struct IpBlock {
    cidr: &'static str,
    except: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct PolicyPort {
    port: u16,
    protocol: &'static str,
}

/// Build the NetworkPolicy for a workspace.
pub fn build(
    name: &str,
    namespace: &str,
    labels: &StringMap,
    annotations: &StringMap,
    proxy_namespace: &str,
) -> Result<Resource> {
    let from_proxy = PolicyPeer {
        namespace_selector: Some(LabelSelector::single(NAMESPACE_NAME_LABEL, proxy_namespace)),
        pod_selector: Some(LabelSelector::single(APP_NAME_LABEL, PROXY_APP_NAME)),
        ..Default::default()
    };

    let public_internet = EgressRule {
        to: vec![PolicyPeer {
            ip_block: Some(IpBlock {
                cidr: ANY_CIDR,
                except: PRIVATE_CIDRS.to_vec(),
            }),
            ..Default::default()
        }],
        ports: Vec::new(),
    };

    let dns = EgressRule {
        to: vec![PolicyPeer {
            namespace_selector: Some(LabelSelector::single(NAMESPACE_NAME_LABEL, "kube-system")),
            ..Default::default()
        }],
        ports: vec![
            PolicyPort {
                port: DNS_PORT,
                protocol: "TCP",
            },
            PolicyPort {
                port: DNS_PORT,
                protocol: "UDP",
            },
        ],
    };

    Resource::from_manifest(&NetworkPolicy {
        api_version: "networking.k8s.io/v1",
        kind: "NetworkPolicy",
        metadata: ObjectMeta::new(name, namespace, labels, annotations),
        spec: NetworkPolicySpec {
            pod_selector: LabelSelector::all(),
            policy_types: vec!["Ingress", "Egress"],
            ingress: vec![IngressRule {
                from: vec![from_proxy],
            }],
            egress: vec![public_internet, dns],
        },
    })
}
