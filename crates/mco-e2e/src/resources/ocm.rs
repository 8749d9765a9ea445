//! Open Cluster Management resources the operator creates next to the MCO CR.

use kube::api::Patch;
use kube::api::PatchParams;
use kube::core::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::Api;
use kube::Client;
use serde_json::json;
use serde_json::Value;

use crate::resources::names::MCO_GROUP;
use crate::resources::names::MCO_NAMESPACE;
use crate::resources::names::PLACEMENT_RULE_NAME;

pub fn observability_addon() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(MCO_GROUP, "v1beta1", "ObservabilityAddon"),
        "observabilityaddons",
    )
}

pub fn cluster_management_addon() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk(
            "addon.open-cluster-management.io",
            "v1alpha1",
            "ClusterManagementAddOn",
        ),
        "clustermanagementaddons",
    )
}

pub fn placement_rule() -> ApiResource {
    ApiResource::from_gvk_with_plural(
        &GroupVersionKind::gvk("apps.open-cluster-management.io", "v1", "PlacementRule"),
        "placementrules",
    )
}

/// Status patch placing the observability rule on `clusters`.
pub fn placement_decisions(clusters: &[String]) -> Value {
    let decisions: Vec<Value> = clusters
        .iter()
        .map(|name| json!({ "clusterName": name, "clusterNamespace": name }))
        .collect();
    json!({ "status": { "decisions": decisions } })
}

/// Write placement decisions into the observability placement rule status.
pub async fn patch_placement_rule(
    client: &Client,
    clusters: &[String],
) -> Result<DynamicObject, kube::Error> {
    let api: Api<DynamicObject> =
        Api::namespaced_with(client.clone(), MCO_NAMESPACE, &placement_rule());
    let patch = placement_decisions(clusters);
    api.patch_status(PLACEMENT_RULE_NAME, &PatchParams::default(), &Patch::Merge(&patch))
        .await
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn decisions_name_cluster_and_namespace() {
        let patch = placement_decisions(&["local-cluster".to_string(), "spoke-1".to_string()]);
        assert_eq!(
            patch,
            json!({
                "status": {
                    "decisions": [
                        { "clusterName": "local-cluster", "clusterNamespace": "local-cluster" },
                        { "clusterName": "spoke-1", "clusterNamespace": "spoke-1" }
                    ]
                }
            })
        );
    }

    #[test]
    fn resources_carry_group_versions() {
        assert_eq!(
            cluster_management_addon().api_version,
            "addon.open-cluster-management.io/v1alpha1"
        );
        assert_eq!(placement_rule().plural, "placementrules");
        assert_eq!(observability_addon().kind, "ObservabilityAddon");
    }
}
