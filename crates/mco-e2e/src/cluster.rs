//! Probes that observe a live cluster.
//!
//! Each probe makes one round of API calls and evaluates a check from
//! [`crate::checks`]. Request failures are classified instead of returned, so
//! the probes plug straight into a poll loop.

use std::collections::BTreeMap;
use std::fmt::Debug;

use converge::ProbeResult;
use futures::future::join_all;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::apps::v1::StatefulSet;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::NamespaceResourceScope;
use kube::api::ListParams;
use kube::core::DynamicObject;
use kube::Api;
use kube::Client;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::checks;
use crate::checks::ReplicaStatus;
use crate::classify::classify;
use crate::classify::is_not_found;
use crate::resources::mco;
use crate::resources::mco::McoVersion;
use crate::resources::mco::McoView;
use crate::resources::names::AvailabilityMode;
use crate::resources::names::WorkloadKind;
use crate::resources::names::CLUSTER_MANAGEMENT_ADDON_NAME;
use crate::resources::names::MCO_LABEL;
use crate::resources::names::MCO_NAMESPACE;
use crate::resources::names::MCO_OPERATOR_NAMESPACE;
use crate::resources::names::OBSERVABILITY_ADDON_NAME;
use crate::resources::names::PLACEMENT_RULE_NAME;
use crate::resources::ocm;

/// Evaluate `check` on a fetched value, or classify the fetch failure.
fn evaluate<T>(fetched: Result<T, kube::Error>, check: impl FnOnce(T) -> ProbeResult) -> ProbeResult {
    match fetched {
        Ok(value) => check(value),
        Err(err) => {
            debug!(error = %err, "Probe request failed");
            classify(&err)
        }
    }
}

/// Probes bound to one cluster's client.
#[derive(Clone)]
pub struct ClusterProbes {
    client: Client,
}

impl ClusterProbes {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    async fn get_namespaced<K>(&self, namespace: &str, name: &str) -> Result<K, kube::Error>
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        Api::<K>::namespaced(self.client.clone(), namespace)
            .get(name)
            .await
    }

    async fn list_pods(&self, namespace: &str, selector: Option<&str>) -> Result<Vec<Pod>, kube::Error> {
        let params = match selector {
            Some(selector) => ListParams::default().labels(selector),
            None => ListParams::default(),
        };
        let pods: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(pods.list(&params).await?.items)
    }

    pub async fn crds_exist(&self, names: &[&str]) -> ProbeResult {
        let crds: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        let results = join_all(names.iter().map(|name| {
            let crds = crds.clone();
            async move { evaluate(crds.get(name).await, |_| ProbeResult::Success) }
        }))
        .await;
        checks::combine(results)
    }

    /// Exactly one operator pod, in phase Running.
    pub async fn operator_running(&self) -> ProbeResult {
        evaluate(
            self.list_pods(MCO_OPERATOR_NAMESPACE, Some(MCO_LABEL)).await,
            |pods| checks::pod_count(&pods, 1).and_then(|| checks::pods_running(&pods)),
        )
    }

    pub async fn mco_condition(&self, version: McoVersion, condition: &str) -> ProbeResult {
        evaluate(mco::fetch(&self.client, version).await, |object| {
            match McoView::from_object(&object) {
                Ok(view) => checks::has_condition(&view, condition),
                Err(err) => ProbeResult::fatal(format!("MCO object does not decode: {err}")),
            }
        })
    }

    /// The v1beta2 rendering of the CR carries the golden `spec`.
    pub async fn mco_converted(&self, golden: &Value) -> ProbeResult {
        evaluate(mco::fetch(&self.client, McoVersion::V1beta2).await, |object| {
            checks::spec_matches(golden, &object.data)
        })
    }

    pub async fn mco_gone(&self) -> ProbeResult {
        match mco::fetch(&self.client, McoVersion::V1beta2).await {
            Ok(_) => ProbeResult::retryable("MCO instance still exists"),
            Err(err) if is_not_found(&err) => ProbeResult::Success,
            Err(err) => classify(&err),
        }
    }

    async fn workload_ready<K>(&self, name: &str, replicas: i32) -> ProbeResult
    where
        K: Resource<Scope = NamespaceResourceScope, DynamicType = ()>
            + ReplicaStatus
            + Clone
            + DeserializeOwned
            + Debug,
    {
        evaluate(
            self.get_namespaced::<K>(MCO_NAMESPACE, name).await,
            |workload| checks::ready_replicas(&workload, replicas),
        )
    }

    pub async fn deployment_ready(&self, name: &str, replicas: i32) -> ProbeResult {
        self.workload_ready::<Deployment>(name, replicas).await
    }

    pub async fn statefulset_ready(&self, name: &str, replicas: i32) -> ProbeResult {
        self.workload_ready::<StatefulSet>(name, replicas).await
    }

    pub async fn deployment_spec_replicas(&self, name: &str, replicas: i32) -> ProbeResult {
        evaluate(
            self.get_namespaced::<Deployment>(MCO_NAMESPACE, name).await,
            |deployment| checks::spec_replicas(&deployment, replicas),
        )
    }

    pub async fn statefulset_arg(&self, name: &str, arg: &str) -> ProbeResult {
        evaluate(
            self.get_namespaced::<StatefulSet>(MCO_NAMESPACE, name).await,
            |statefulset| checks::container_arg(&statefulset, arg),
        )
    }

    pub async fn storage_resized(&self, name: &str, size: &str) -> ProbeResult {
        evaluate(
            self.get_namespaced::<StatefulSet>(MCO_NAMESPACE, name).await,
            |statefulset| checks::claim_storage(&statefulset, size),
        )
    }

    /// Every workload of `mode` reports its expected ready replicas.
    pub async fn components_ready(&self, mode: AvailabilityMode) -> ProbeResult {
        let results = join_all(mode.workloads().iter().map(|workload| async move {
            match workload.kind {
                WorkloadKind::Deployment => {
                    self.deployment_ready(workload.name, workload.replicas).await
                }
                WorkloadKind::StatefulSet => {
                    self.statefulset_ready(workload.name, workload.replicas).await
                }
            }
        }))
        .await;
        checks::combine(results)
    }

    pub async fn placement_rule_exists(&self) -> ProbeResult {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), MCO_NAMESPACE, &ocm::placement_rule());
        evaluate(api.get(PLACEMENT_RULE_NAME).await, |_| ProbeResult::Success)
    }

    pub async fn cluster_management_addon_exists(&self) -> ProbeResult {
        let api: Api<DynamicObject> =
            Api::all_with(self.client.clone(), &ocm::cluster_management_addon());
        evaluate(api.get(CLUSTER_MANAGEMENT_ADDON_NAME).await, |_| {
            ProbeResult::Success
        })
    }

    /// The ObservabilityAddon of `cluster` reports `enableMetrics == enabled`.
    pub async fn addon_metrics_enabled(&self, cluster: &str, enabled: bool) -> ProbeResult {
        let api: Api<DynamicObject> =
            Api::namespaced_with(self.client.clone(), cluster, &ocm::observability_addon());
        evaluate(api.get(OBSERVABILITY_ADDON_NAME).await, |addon| {
            checks::addon_enable_metrics(&addon.data, enabled)
        })
    }

    pub async fn pod_count(&self, namespace: &str, selector: &str, expected: usize) -> ProbeResult {
        evaluate(self.list_pods(namespace, Some(selector)).await, |pods| {
            checks::pod_count(&pods, expected)
        })
    }

    pub async fn pods_have_node_selector(&self, selector: &BTreeMap<String, String>) -> ProbeResult {
        evaluate(self.list_pods(MCO_NAMESPACE, None).await, |pods| {
            checks::pods_have_node_selector(&pods, selector)
        })
    }

    pub async fn pods_have_anti_affinity(&self) -> ProbeResult {
        evaluate(self.list_pods(MCO_NAMESPACE, None).await, |pods| {
            checks::pods_have_anti_affinity(&pods)
        })
    }

    /// Pod names with their phase, for failure diagnostics.
    pub async fn pod_phases(&self, namespace: &str) -> Result<Vec<(String, String)>, kube::Error> {
        let pods = self.list_pods(namespace, None).await?;
        Ok(pods
            .into_iter()
            .map(|pod| {
                let phase = pod
                    .status
                    .and_then(|s| s.phase)
                    .unwrap_or_else(|| "Unknown".to_string());
                (pod.metadata.name.unwrap_or_default(), phase)
            })
            .collect())
    }
}
