use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ConfigMap;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DeleteParams;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use tracing::error;

use crate::resources::names::CUSTOM_ALLOWLIST_NAME;
use crate::resources::names::MCO_NAMESPACE;

/// Key under which the operator reads the custom metrics allowlist.
pub const ALLOWLIST_KEY: &str = "metrics_list.yaml";

pub async fn create_configmap(client: &Client, configmap: &ConfigMap) -> Result<ConfigMap, kube::Error> {
    let namespace = configmap.metadata.namespace.as_deref().unwrap_or("default");
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    api.create(&PostParams::default(), configmap).await
}

pub async fn get_configmap(
    client: &Client,
    name: &str,
    namespace: &str,
) -> Result<ConfigMap, kube::Error> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    api.get(name).await.inspect_err(|err| {
        error!("Failed to get configmap {name} in namespace {namespace} due to {err}")
    })
}

pub async fn delete_configmap(client: &Client, name: &str, namespace: &str) -> Result<(), kube::Error> {
    let api: Api<ConfigMap> = Api::namespaced(client.clone(), namespace);
    api.delete(name, &DeleteParams::default())
        .await
        .map(|_| ())
        .inspect_err(|err| {
            error!("Failed to delete configmap {name} in namespace {namespace} due to {err}")
        })
}

/// Custom allowlist adding `metrics` to the collected metric names.
pub fn custom_allowlist(metrics: &[&str]) -> ConfigMap {
    let mut list = String::from("names:\n");
    for metric in metrics {
        list.push_str("  - ");
        list.push_str(metric);
        list.push('\n');
    }

    ConfigMap {
        metadata: ObjectMeta {
            name: Some(CUSTOM_ALLOWLIST_NAME.to_string()),
            namespace: Some(MCO_NAMESPACE.to_string()),
            ..Default::default()
        },
        data: Some(BTreeMap::from([(ALLOWLIST_KEY.to_string(), list)])),
        ..Default::default()
    }
}

/// Metric names listed in an allowlist ConfigMap.
pub fn allowlisted_metrics(configmap: &ConfigMap) -> Vec<String> {
    #[derive(serde::Deserialize)]
    struct Allowlist {
        #[serde(default)]
        names: Vec<String>,
    }

    configmap
        .data
        .as_ref()
        .and_then(|data| data.get(ALLOWLIST_KEY))
        .and_then(|content| serde_yaml::from_str::<Allowlist>(content).ok())
        .map(|allowlist| allowlist.names)
        .unwrap_or_default()
}
