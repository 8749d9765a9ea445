//! Predicates over fetched objects.
//!
//! Every check looks at explicitly declared fields and reports a
//! [`ProbeResult`]; fetching is left to [`crate::cluster`].

use std::collections::BTreeMap;

use converge::ProbeResult;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::api::core::v1::PodSpec;
use serde_json::Value;

use crate::resources::mco::McoView;

/// Topology keys the operator spreads replicas across.
pub const ANTI_AFFINITY_TOPOLOGY_KEYS: [&str; 2] =
    ["topology.kubernetes.io/zone", "kubernetes.io/hostname"];

/// Workloads exposing replica counts and a pod template.
pub trait ReplicaStatus {
    const KIND: &'static str;

    fn name(&self) -> &str;
    fn ready_replicas(&self) -> i32;
    fn spec_replicas(&self) -> Option<i32>;
    fn pod_spec(&self) -> Option<&PodSpec>;
}

impl ReplicaStatus for Deployment {
    const KIND: &'static str = "deployment";

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn ready_replicas(&self) -> i32 {
        self.status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0)
    }

    fn spec_replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref().and_then(|s| s.template.spec.as_ref())
    }
}

impl ReplicaStatus for StatefulSet {
    const KIND: &'static str = "statefulset";

    fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or_default()
    }

    fn ready_replicas(&self) -> i32 {
        self.status
            .as_ref()
            .and_then(|s| s.ready_replicas)
            .unwrap_or(0)
    }

    fn spec_replicas(&self) -> Option<i32> {
        self.spec.as_ref().and_then(|s| s.replicas)
    }

    fn pod_spec(&self) -> Option<&PodSpec> {
        self.spec.as_ref().and_then(|s| s.template.spec.as_ref())
    }
}

pub fn ready_replicas<W: ReplicaStatus>(workload: &W, expected: i32) -> ProbeResult {
    let ready = workload.ready_replicas();
    ProbeResult::from_check(
        ready == expected,
        format_args!(
            "{} {}: expect {expected} but got {ready} ready replicas",
            W::KIND,
            workload.name()
        ),
    )
}

pub fn spec_replicas<W: ReplicaStatus>(workload: &W, expected: i32) -> ProbeResult {
    match workload.spec_replicas() {
        Some(replicas) if replicas == expected => ProbeResult::Success,
        replicas => ProbeResult::retryable(format!(
            "{} {}: expect {expected} but got {replicas:?} spec replicas",
            W::KIND,
            workload.name()
        )),
    }
}

/// `arg` appears among the first container's arguments.
pub fn container_arg<W: ReplicaStatus>(workload: &W, arg: &str) -> ProbeResult {
    let found = workload
        .pod_spec()
        .and_then(|spec| spec.containers.first())
        .and_then(|container| container.args.as_ref())
        .is_some_and(|args| args.iter().any(|a| a == arg));
    ProbeResult::from_check(
        found,
        format_args!("{} {}: argument {arg} not found", W::KIND, workload.name()),
    )
}

/// The first volume claim template requests `size` of storage.
pub fn claim_storage(statefulset: &StatefulSet, size: &str) -> ProbeResult {
    let requested = statefulset
        .spec
        .as_ref()
        .and_then(|s| s.volume_claim_templates.as_ref())
        .and_then(|templates| templates.first())
        .and_then(|claim| claim.spec.as_ref())
        .and_then(|spec| spec.resources.as_ref())
        .and_then(|resources| resources.requests.as_ref())
        .and_then(|requests| requests.get("storage"))
        .map(|quantity| quantity.0.as_str());

    ProbeResult::from_check(
        requested == Some(size),
        format_args!(
            "statefulset {}: expect storage {size} but got {}",
            statefulset.name(),
            requested.unwrap_or("none")
        ),
    )
}

pub fn has_condition(view: &McoView, type_: &str) -> ProbeResult {
    ProbeResult::from_check(
        view.has_condition(type_),
        format_args!(
            "MCO has no {type_} condition yet, status: {}",
            view.condition_summary()
        ),
    )
}

pub fn pod_count(pods: &[Pod], expected: usize) -> ProbeResult {
    ProbeResult::from_check(
        pods.len() == expected,
        format_args!("expect {expected} pods but found {}", pods.len()),
    )
}

pub fn pods_running(pods: &[Pod]) -> ProbeResult {
    for pod in pods {
        let phase = pod.status.as_ref().and_then(|s| s.phase.as_deref());
        if phase != Some("Running") {
            return ProbeResult::retryable(format!(
                "pod {} is in phase {}",
                pod_name(pod),
                phase.unwrap_or("Unknown")
            ));
        }
    }
    ProbeResult::Success
}

/// Every pod carries all of `selector` in its node selector.
pub fn pods_have_node_selector(pods: &[Pod], selector: &BTreeMap<String, String>) -> ProbeResult {
    if pods.is_empty() {
        return ProbeResult::retryable("no pods found to check the node selector on");
    }
    for pod in pods {
        let actual = pod.spec.as_ref().and_then(|s| s.node_selector.as_ref());
        let matches = selector
            .iter()
            .all(|(key, value)| actual.and_then(|a| a.get(key)) == Some(value));
        if !matches {
            return ProbeResult::retryable(format!(
                "pod {} has node selector {actual:?}, expect {selector:?}",
                pod_name(pod)
            ));
        }
    }
    ProbeResult::Success
}

/// Every pod prefers spreading across zones and hosts.
pub fn pods_have_anti_affinity(pods: &[Pod]) -> ProbeResult {
    if pods.is_empty() {
        return ProbeResult::retryable("no pods found to check pod anti-affinity on");
    }
    for pod in pods {
        let keys: Vec<&str> = pod
            .spec
            .as_ref()
            .and_then(|s| s.affinity.as_ref())
            .and_then(|a| a.pod_anti_affinity.as_ref())
            .and_then(|a| a.preferred_during_scheduling_ignored_during_execution.as_ref())
            .map(|terms| {
                terms
                    .iter()
                    .map(|t| t.pod_affinity_term.topology_key.as_str())
                    .collect()
            })
            .unwrap_or_default();

        if let Some(missing) = ANTI_AFFINITY_TOPOLOGY_KEYS
            .iter()
            .find(|key| !keys.contains(*key))
        {
            return ProbeResult::retryable(format!(
                "pod {} has no pod anti-affinity on {missing}",
                pod_name(pod)
            ));
        }
    }
    ProbeResult::Success
}

/// The `spec` of `actual` equals the `spec` of the golden document.
pub fn spec_matches(golden: &Value, actual: &Value) -> ProbeResult {
    let expected = &golden["spec"];
    let found = &actual["spec"];
    if expected.is_null() {
        return ProbeResult::fatal("golden document has no spec");
    }
    ProbeResult::from_check(
        expected == found,
        format_args!("converted spec differs from golden: expect {expected} but got {found}"),
    )
}

/// `spec.enableMetrics` of an ObservabilityAddon, which defaults to enabled.
pub fn addon_enable_metrics(addon: &Value, expected: bool) -> ProbeResult {
    let enabled = addon["spec"]["enableMetrics"].as_bool().unwrap_or(true);
    ProbeResult::from_check(
        enabled == expected,
        format_args!("observability addon: expect enableMetrics {expected} but got {enabled}"),
    )
}

/// Fold several results into one: any fatal wins, then the first retryable.
pub fn combine(results: impl IntoIterator<Item = ProbeResult>) -> ProbeResult {
    let mut first_retryable = None;
    for result in results {
        match result {
            ProbeResult::Fatal(_) => return result,
            ProbeResult::Retryable(_) if first_retryable.is_none() => {
                first_retryable = Some(result)
            }
            _ => {}
        }
    }
    first_retryable.unwrap_or(ProbeResult::Success)
}

fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or("<unnamed>")
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::apps::v1::DeploymentStatus;
    use k8s_openapi::api::apps::v1::StatefulSetSpec;
    use k8s_openapi::api::core::v1::Affinity;
    use k8s_openapi::api::core::v1::Container;
    use k8s_openapi::api::core::v1::PersistentVolumeClaim;
    use k8s_openapi::api::core::v1::PersistentVolumeClaimSpec;
    use k8s_openapi::api::core::v1::PodAffinityTerm;
    use k8s_openapi::api::core::v1::PodAntiAffinity;
    use k8s_openapi::api::core::v1::PodStatus;
    use k8s_openapi::api::core::v1::PodTemplateSpec;
    use k8s_openapi::api::core::v1::WeightedPodAffinityTerm;
    use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use serde_json::json;
    use similar_asserts::assert_eq;

    use super::*;

    fn meta(name: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        }
    }

    fn compact(args: &[&str], storage: &str) -> StatefulSet {
        let mut claim_spec = PersistentVolumeClaimSpec::default();
        let mut resources = claim_spec.resources.take().unwrap_or_default();
        resources.requests = Some(BTreeMap::from([(
            "storage".to_string(),
            Quantity(storage.to_string()),
        )]));
        claim_spec.resources = Some(resources);

        StatefulSet {
            metadata: meta("observability-thanos-compact"),
            spec: Some(StatefulSetSpec {
                replicas: Some(1),
                template: PodTemplateSpec {
                    spec: Some(PodSpec {
                        containers: vec![Container {
                            name: "thanos-compact".to_string(),
                            args: Some(args.iter().map(|a| a.to_string()).collect()),
                            ..Default::default()
                        }],
                        ..Default::default()
                    }),
                    ..Default::default()
                },
                volume_claim_templates: Some(vec![PersistentVolumeClaim {
                    metadata: meta("data"),
                    spec: Some(claim_spec),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn pod(name: &str, phase: &str, topology_keys: &[&str]) -> Pod {
        let terms = topology_keys
            .iter()
            .map(|key| WeightedPodAffinityTerm {
                weight: 30,
                pod_affinity_term: PodAffinityTerm {
                    topology_key: key.to_string(),
                    ..Default::default()
                },
            })
            .collect();

        Pod {
            metadata: meta(name),
            spec: Some(PodSpec {
                node_selector: Some(BTreeMap::from([(
                    "kubernetes.io/os".to_string(),
                    "linux".to_string(),
                )])),
                affinity: Some(Affinity {
                    pod_anti_affinity: Some(PodAntiAffinity {
                        preferred_during_scheduling_ignored_during_execution: Some(terms),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            }),
            status: Some(PodStatus {
                phase: Some(phase.to_string()),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn missing_status_counts_as_zero_ready() {
        let deployment = Deployment {
            metadata: meta("observability-thanos-query"),
            ..Default::default()
        };
        assert_eq!(
            ready_replicas(&deployment, 2),
            ProbeResult::Retryable(
                "deployment observability-thanos-query: expect 2 but got 0 ready replicas"
                    .to_string()
            )
        );

        let deployment = Deployment {
            status: Some(DeploymentStatus {
                ready_replicas: Some(2),
                ..Default::default()
            }),
            ..deployment
        };
        assert_eq!(ready_replicas(&deployment, 2), ProbeResult::Success);
    }

    #[test]
    fn retention_argument_is_found_in_first_container() {
        let sts = compact(&["compact", "--retention.resolution-raw=3d"], "1Gi");
        assert!(container_arg(&sts, "--retention.resolution-raw=3d").is_success());
        assert!(!container_arg(&sts, "--retention.resolution-raw=5d").is_success());
        assert_eq!(spec_replicas(&sts, 1), ProbeResult::Success);
    }

    #[test]
    fn claim_storage_compares_first_template() {
        let sts = compact(&[], "2Gi");
        assert!(claim_storage(&sts, "2Gi").is_success());
        assert_eq!(
            claim_storage(&sts, "4Gi"),
            ProbeResult::Retryable(
                "statefulset observability-thanos-compact: expect storage 4Gi but got 2Gi"
                    .to_string()
            )
        );
    }

    #[test]
    fn pod_checks_name_the_offending_pod() {
        let keys = ANTI_AFFINITY_TOPOLOGY_KEYS;
        let pods = vec![
            pod("grafana-0", "Running", &keys),
            pod("alertmanager-0", "Pending", &keys[..1]),
        ];

        assert!(pod_count(&pods, 2).is_success());
        assert_eq!(
            pods_running(&pods),
            ProbeResult::Retryable("pod alertmanager-0 is in phase Pending".to_string())
        );
        assert_eq!(
            pods_have_anti_affinity(&pods),
            ProbeResult::Retryable(
                "pod alertmanager-0 has no pod anti-affinity on kubernetes.io/hostname"
                    .to_string()
            )
        );

        let selector = BTreeMap::from([("kubernetes.io/os".to_string(), "linux".to_string())]);
        assert!(pods_have_node_selector(&pods, &selector).is_success());
        let selector = BTreeMap::from([("zone".to_string(), "a".to_string())]);
        assert!(!pods_have_node_selector(&pods, &selector).is_success());
    }

    #[test]
    fn empty_namespace_does_not_satisfy_placement_checks() {
        let selector = BTreeMap::from([("kubernetes.io/os".to_string(), "linux".to_string())]);
        assert_eq!(
            pods_have_node_selector(&[], &selector),
            ProbeResult::retryable("no pods found to check the node selector on")
        );
        assert_eq!(
            pods_have_anti_affinity(&[]),
            ProbeResult::retryable("no pods found to check pod anti-affinity on")
        );
        assert!(pods_running(&[]).is_success());
        assert!(!pod_count(&[], 1).is_success());
    }

    #[test]
    fn golden_spec_comparison() {
        let golden = json!({ "spec": { "retentionResolutionRaw": "5d" } });
        let converted = json!({ "spec": { "retentionResolutionRaw": "5d" }, "status": {} });
        assert!(spec_matches(&golden, &converted).is_success());
        assert!(matches!(
            spec_matches(&golden, &json!({ "spec": {} })),
            ProbeResult::Retryable(_)
        ));
        assert!(spec_matches(&json!({}), &golden).is_fatal());
    }

    #[test]
    fn addon_metrics_default_to_enabled() {
        assert!(addon_enable_metrics(&json!({ "spec": {} }), true).is_success());
        assert_eq!(
            addon_enable_metrics(&json!({ "spec": { "enableMetrics": true } }), false),
            ProbeResult::retryable("observability addon: expect enableMetrics false but got true")
        );
        assert!(addon_enable_metrics(&json!({ "spec": { "enableMetrics": false } }), false)
            .is_success());
    }

    #[test]
    fn combine_prefers_fatal_then_first_retryable() {
        assert_eq!(
            combine([ProbeResult::Success, ProbeResult::Success]),
            ProbeResult::Success
        );
        assert_eq!(
            combine([
                ProbeResult::retryable("a"),
                ProbeResult::retryable("b"),
            ]),
            ProbeResult::retryable("a")
        );
        assert_eq!(
            combine([ProbeResult::retryable("a"), ProbeResult::fatal("boom")]),
            ProbeResult::fatal("boom")
        );
    }
}
