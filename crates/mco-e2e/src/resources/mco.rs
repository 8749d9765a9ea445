//! MultiClusterObservability adapter.
//!
//! The CR is read as a [`DynamicObject`] and decoded into [`McoView`], which
//! declares only the fields the scenarios look at. Changes go out as JSON
//! merge patches built by [`McoPatch`].

use std::collections::BTreeMap;

use kube::api::Patch;
use kube::api::PatchParams;
use kube::core::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::ApiResource;
use kube::Api;
use kube::Client;
use serde::Deserialize;
use serde_json::json;
use serde_json::Map;
use serde_json::Value;

use crate::resources::names::AvailabilityMode;
use crate::resources::names::MCO_CR_NAME;
use crate::resources::names::MCO_GROUP;

pub const MCO_KIND: &str = "MultiClusterObservability";
pub const MCO_PLURAL: &str = "multiclusterobservabilities";

/// Served API versions of the MCO CRD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McoVersion {
    V1beta1,
    V1beta2,
}

impl McoVersion {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::V1beta1 => "v1beta1",
            Self::V1beta2 => "v1beta2",
        }
    }

    pub fn api_resource(self) -> ApiResource {
        let gvk = GroupVersionKind::gvk(MCO_GROUP, self.as_str(), MCO_KIND);
        ApiResource::from_gvk_with_plural(&gvk, MCO_PLURAL)
    }
}

/// Cluster-scoped API for the MCO CR at `version`.
pub fn api(client: &Client, version: McoVersion) -> Api<DynamicObject> {
    Api::all_with(client.clone(), &version.api_resource())
}

pub async fn fetch(client: &Client, version: McoVersion) -> Result<DynamicObject, kube::Error> {
    api(client, version).get(MCO_CR_NAME).await
}

pub async fn apply_patch(client: &Client, patch: &McoPatch) -> Result<DynamicObject, kube::Error> {
    api(client, McoVersion::V1beta2)
        .patch(
            MCO_CR_NAME,
            &PatchParams::default(),
            &Patch::Merge(patch.as_value()),
        )
        .await
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct StatusCondition {
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McoStatus {
    #[serde(default)]
    pub conditions: Vec<StatusCondition>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionConfig {
    #[serde(default)]
    pub retention_resolution_raw: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedConfig {
    #[serde(default)]
    pub retention_config: Option<RetentionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageConfig {
    #[serde(default)]
    pub alertmanager_storage_size: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddonSpec {
    #[serde(default)]
    pub enable_metrics: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McoSpec {
    #[serde(default)]
    pub availability_config: Option<String>,
    #[serde(default)]
    pub node_selector: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub advanced: Option<AdvancedConfig>,
    #[serde(default)]
    pub storage_config: Option<StorageConfig>,
    #[serde(default)]
    pub observability_addon_spec: Option<AddonSpec>,
}

/// Fields of the MCO CR the scenarios inspect.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct McoView {
    #[serde(default)]
    pub spec: McoSpec,
    #[serde(default)]
    pub status: McoStatus,
}

impl McoView {
    pub fn from_object(object: &DynamicObject) -> Result<Self, serde_json::Error> {
        serde_json::from_value(object.data.clone())
    }

    /// Whether a condition of `type_` is present.
    ///
    /// The operator replaces the condition list on every transition, so
    /// presence alone marks the current state.
    pub fn has_condition(&self, type_: &str) -> bool {
        self.status.conditions.iter().any(|c| c.type_ == type_)
    }

    /// One-line rendering of the conditions for failure reasons and logs.
    pub fn condition_summary(&self) -> String {
        if self.status.conditions.is_empty() {
            return "no status conditions".to_string();
        }
        self.status
            .conditions
            .iter()
            .map(|c| {
                format!(
                    "{}({}): {}",
                    c.type_,
                    c.reason.as_deref().unwrap_or("-"),
                    c.message.as_deref().unwrap_or("")
                )
            })
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// JSON merge patch against the MCO CR `spec`.
#[derive(Debug, Clone, PartialEq)]
pub struct McoPatch(Value);

impl Default for McoPatch {
    fn default() -> Self {
        Self(json!({ "spec": {} }))
    }
}

impl McoPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn retention_resolution_raw(self, value: &str) -> Self {
        self.set(&["advanced", "retentionConfig", "retentionResolutionRaw"], json!(value))
    }

    pub fn alertmanager_storage_size(self, size: &str) -> Self {
        self.set(&["storageConfig", "alertmanagerStorageSize"], json!(size))
    }

    /// Set the node selector, or remove it with `None`.
    pub fn node_selector(self, selector: Option<&BTreeMap<String, String>>) -> Self {
        let value = match selector {
            Some(selector) => json!(selector),
            None => Value::Null,
        };
        self.set(&["nodeSelector"], value)
    }

    /// Replicas of a component under `spec.advanced`, e.g. `query`.
    pub fn component_replicas(self, component: &str, replicas: i32) -> Self {
        self.set(&["advanced", component, "replicas"], json!(replicas))
    }

    /// Toggle metrics collection by the addon on every managed cluster.
    pub fn enable_metrics(self, enabled: bool) -> Self {
        self.set(&["observabilityAddonSpec", "enableMetrics"], json!(enabled))
    }

    pub fn availability_config(self, mode: AvailabilityMode) -> Self {
        self.set(&["availabilityConfig"], json!(mode.as_str()))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn set(mut self, path: &[&str], value: Value) -> Self {
        let Some((last, parents)) = path.split_last() else {
            return self;
        };
        let mut node = &mut self.0["spec"];
        for key in parents {
            if !node.is_object() {
                *node = Value::Object(Map::new());
            }
            node = &mut node[*key];
        }
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node[*last] = value;
        self
    }
}

#[cfg(test)]
mod tests {
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
    use similar_asserts::assert_eq;

    use super::*;

    fn mco_object(data: Value) -> DynamicObject {
        DynamicObject {
            types: None,
            metadata: ObjectMeta {
                name: Some(MCO_CR_NAME.to_string()),
                ..Default::default()
            },
            data,
        }
    }

    #[test]
    fn decodes_narrow_view_and_ignores_other_fields() {
        let object = mco_object(json!({
            "spec": {
                "enableDownsampling": true,
                "nodeSelector": { "kubernetes.io/os": "linux" },
                "advanced": {
                    "retentionConfig": { "retentionResolutionRaw": "5d", "blockDuration": "2h" },
                    "query": { "replicas": 2 }
                },
                "storageConfig": { "alertmanagerStorageSize": "1Gi", "storageClass": "gp2" }
            },
            "status": {
                "conditions": [
                    { "type": "Ready", "reason": "Ready", "message": "Observability components are deployed and running", "status": "True" }
                ]
            }
        }));

        let view = McoView::from_object(&object).expect("decodable MCO");
        assert!(view.has_condition("Ready"));
        assert!(!view.has_condition("Failed"));
        assert_eq!(
            view.spec
                .advanced
                .as_ref()
                .and_then(|a| a.retention_config.as_ref())
                .and_then(|r| r.retention_resolution_raw.as_deref()),
            Some("5d")
        );
        assert_eq!(
            view.spec
                .storage_config
                .and_then(|s| s.alertmanager_storage_size)
                .as_deref(),
            Some("1Gi")
        );
    }

    #[test]
    fn missing_status_reads_as_no_conditions() {
        let view = McoView::from_object(&mco_object(json!({ "spec": {} }))).expect("decodable");
        assert!(!view.has_condition("Ready"));
        assert_eq!(view.condition_summary(), "no status conditions");
    }

    #[test]
    fn mistyped_field_fails_to_decode() {
        let object = mco_object(json!({ "status": { "conditions": "Ready" } }));
        assert!(McoView::from_object(&object).is_err());
    }

    #[test]
    fn patch_builders_nest_under_spec() {
        let selector = BTreeMap::from([("kubernetes.io/os".to_string(), "linux".to_string())]);
        let patch = McoPatch::new()
            .retention_resolution_raw("3d")
            .alertmanager_storage_size("2Gi")
            .node_selector(Some(&selector))
            .component_replicas("query", 3);

        assert_eq!(
            patch.as_value(),
            &json!({
                "spec": {
                    "advanced": {
                        "retentionConfig": { "retentionResolutionRaw": "3d" },
                        "query": { "replicas": 3 }
                    },
                    "storageConfig": { "alertmanagerStorageSize": "2Gi" },
                    "nodeSelector": { "kubernetes.io/os": "linux" }
                }
            })
        );
    }

    #[test]
    fn removing_node_selector_sends_null() {
        let patch = McoPatch::new()
            .node_selector(None)
            .enable_metrics(false)
            .availability_config(AvailabilityMode::Basic);
        assert_eq!(
            patch.as_value(),
            &json!({
                "spec": {
                    "nodeSelector": null,
                    "observabilityAddonSpec": { "enableMetrics": false },
                    "availabilityConfig": "Basic"
                }
            })
        );
    }

    #[test]
    fn api_resource_uses_explicit_plural() {
        let resource = McoVersion::V1beta2.api_resource();
        assert_eq!(resource.plural, MCO_PLURAL);
        assert_eq!(
            resource.api_version,
            "observability.open-cluster-management.io/v1beta2"
        );
    }
}
