//! Namespaces, names and labels of the objects the operator manages.

pub const MCO_OPERATOR_NAMESPACE: &str = "open-cluster-management";
pub const MCO_NAMESPACE: &str = "open-cluster-management-observability";
pub const MCO_ADDON_NAMESPACE: &str = "open-cluster-management-addon-observability";
pub const MCO_CR_NAME: &str = "observability";
pub const MCO_LABEL: &str = "name=multicluster-observability-operator";
pub const MCO_PULL_SECRET_NAME: &str = "multiclusterhub-operator-pull-secret";
pub const OBJ_SECRET_NAME: &str = "thanos-object-storage";
pub const MCO_GROUP: &str = "observability.open-cluster-management.io";

pub const METRICS_COLLECTOR_LABEL: &str = "component=metrics-collector";
pub const CLUSTER_MANAGEMENT_ADDON_NAME: &str = "observability-controller";
pub const PLACEMENT_RULE_NAME: &str = "observability";
pub const CUSTOM_ALLOWLIST_NAME: &str = "observability-metrics-custom-allowlist";
/// Per-cluster addon object, kept in the managed cluster's namespace on the hub.
pub const OBSERVABILITY_ADDON_NAME: &str = "observability-addon";

pub const REQUIRED_CRDS: [&str; 3] = [
    "multiclusterobservabilities.observability.open-cluster-management.io",
    "observatoria.core.observatorium.io",
    "observabilityaddons.observability.open-cluster-management.io",
];

/// Name of an operator-owned workload derived from the CR name.
pub fn component(suffix: &str) -> String {
    format!("{MCO_CR_NAME}-{suffix}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet,
}

/// A workload the operator must run, with its ready replica count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpectedWorkload {
    pub kind: WorkloadKind,
    pub name: &'static str,
    pub replicas: i32,
}

const fn deployment(name: &'static str, replicas: i32) -> ExpectedWorkload {
    ExpectedWorkload {
        kind: WorkloadKind::Deployment,
        name,
        replicas,
    }
}

const fn statefulset(name: &'static str, replicas: i32) -> ExpectedWorkload {
    ExpectedWorkload {
        kind: WorkloadKind::StatefulSet,
        name,
        replicas,
    }
}

const BASIC_MODE: &[ExpectedWorkload] = &[
    deployment("grafana", 1),
    deployment("observability-observatorium-api", 1),
    deployment("observability-thanos-query", 1),
    deployment("observability-thanos-query-frontend", 1),
    deployment("observability-thanos-receive-controller", 1),
    deployment("observatorium-operator", 1),
    deployment("rbac-query-proxy", 1),
    statefulset("observability-alertmanager", 1),
    statefulset("observability-thanos-compact", 1),
    statefulset("observability-thanos-receive-default", 1),
    statefulset("observability-thanos-rule", 1),
    statefulset("observability-thanos-store-memcached", 1),
    statefulset("observability-thanos-store-shard-0", 1),
    statefulset("observability-thanos-store-shard-1", 1),
    statefulset("observability-thanos-store-shard-2", 1),
];

const HIGH_MODE: &[ExpectedWorkload] = &[
    deployment("grafana", 2),
    deployment("observability-observatorium-api", 2),
    deployment("observability-thanos-query", 2),
    deployment("observability-thanos-query-frontend", 2),
    deployment("observability-thanos-receive-controller", 1),
    deployment("observatorium-operator", 1),
    deployment("rbac-query-proxy", 2),
    statefulset("observability-alertmanager", 3),
    statefulset("observability-thanos-compact", 1),
    statefulset("observability-thanos-receive-default", 3),
    statefulset("observability-thanos-rule", 3),
    statefulset("observability-thanos-store-memcached", 3),
    statefulset("observability-thanos-store-shard-0", 1),
    statefulset("observability-thanos-store-shard-1", 1),
    statefulset("observability-thanos-store-shard-2", 1),
];

/// `spec.availabilityConfig` of the MCO CR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvailabilityMode {
    Basic,
    High,
}

impl AvailabilityMode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "Basic",
            Self::High => "High",
        }
    }

    pub const fn workloads(self) -> &'static [ExpectedWorkload] {
        match self {
            Self::Basic => BASIC_MODE,
            Self::High => HIGH_MODE,
        }
    }
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn modes_cover_the_same_workloads() {
        let basic: Vec<_> = AvailabilityMode::Basic
            .workloads()
            .iter()
            .map(|w| (w.kind, w.name))
            .collect();
        let high: Vec<_> = AvailabilityMode::High
            .workloads()
            .iter()
            .map(|w| (w.kind, w.name))
            .collect();
        assert_eq!(basic, high);
        assert!(AvailabilityMode::Basic
            .workloads()
            .iter()
            .all(|w| w.replicas == 1));
    }

    #[test]
    fn component_names_follow_cr_name() {
        assert_eq!(component("thanos-compact"), "observability-thanos-compact");
        let high = AvailabilityMode::High.workloads();
        assert!(high
            .iter()
            .any(|w| w.name == component("alertmanager") && w.replicas == 3));
    }
}
