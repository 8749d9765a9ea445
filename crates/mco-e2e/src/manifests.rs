//! Manifests the scenarios create and the loader for pre-rendered ones.

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use kube::api::Patch;
use kube::api::PatchParams;
use kube::core::DynamicObject;
use kube::core::GroupVersionKind;
use kube::discovery::pinned_kind;
use kube::discovery::Scope;
use kube::Api;
use kube::Client;
use serde::Deserialize;
use serde_json::json;
use serde_json::Value;
use tracing::debug;
use tracing::info;

use crate::config::ObjectStorage;
use crate::error::E2eError;
use crate::resources::names::MCO_GROUP;
use crate::resources::names::MCO_NAMESPACE;
use crate::resources::names::OBJ_SECRET_NAME;

/// Field manager used for every server-side apply.
pub const FIELD_MANAGER: &str = "mco-e2e";

pub const TESTING_RBAC_NAME: &str = "mco-e2e-testing";

/// Expected-state documents live next to the manifests but are never applied.
pub const GOLDEN_SUFFIX: &str = "-golden";

pub fn namespace() -> Value {
    json!({
        "apiVersion": "v1",
        "kind": "Namespace",
        "metadata": { "name": MCO_NAMESPACE }
    })
}

/// Thanos object-storage configuration pointing at S3.
pub fn object_storage_secret(storage: &ObjectStorage) -> Value {
    let thanos = format!(
        "type: s3\nconfig:\n  bucket: {}\n  endpoint: s3.{}.amazonaws.com\n  insecure: false\n  access_key: {}\n  secret_key: {}\n",
        storage.bucket, storage.region, storage.access_key, storage.secret_key
    );
    json!({
        "apiVersion": "v1",
        "kind": "Secret",
        "metadata": { "name": OBJ_SECRET_NAME, "namespace": MCO_NAMESPACE },
        "type": "Opaque",
        "stringData": { "thanos.yaml": thanos }
    })
}

/// Read access to the observability objects for the suite's own identity.
pub fn testing_rbac() -> Vec<Value> {
    vec![
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRole",
            "metadata": { "name": TESTING_RBAC_NAME },
            "rules": [
                {
                    "apiGroups": [MCO_GROUP],
                    "resources": ["multiclusterobservabilities", "observabilityaddons"],
                    "verbs": ["get", "list", "watch"]
                },
                {
                    "apiGroups": ["", "apps"],
                    "resources": ["pods", "deployments", "statefulsets", "configmaps"],
                    "verbs": ["get", "list", "watch"]
                }
            ]
        }),
        json!({
            "apiVersion": "rbac.authorization.k8s.io/v1",
            "kind": "ClusterRoleBinding",
            "metadata": { "name": TESTING_RBAC_NAME },
            "roleRef": {
                "apiGroup": "rbac.authorization.k8s.io",
                "kind": "ClusterRole",
                "name": TESTING_RBAC_NAME
            },
            "subjects": [
                { "kind": "Group", "apiGroup": "rbac.authorization.k8s.io", "name": "system:authenticated" }
            ]
        }),
    ]
}

/// Split a multi-document YAML stream into objects, skipping empty documents.
pub fn parse_documents(yaml: &str) -> Result<Vec<DynamicObject>, Report<E2eError>> {
    let mut objects = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_str(yaml).enumerate() {
        let value = serde_yaml::Value::deserialize(document)
            .change_context(E2eError::manifest("invalid YAML"))
            .attach_printable_lazy(|| format!("document {index}"))?;
        if value.is_null() {
            continue;
        }
        let object: DynamicObject = serde_yaml::from_value(value)
            .change_context(E2eError::manifest("document is not a Kubernetes object"))
            .attach_printable_lazy(|| format!("document {index}"))?;
        objects.push(object);
    }
    Ok(objects)
}

/// Every `*.yaml`/`*.yml` file directly under `dir`, in file name order.
///
/// Golden documents are skipped.
pub fn manifest_files(dir: &Path) -> Result<Vec<PathBuf>, Report<E2eError>> {
    let entries = fs::read_dir(dir)
        .change_context(E2eError::manifest("cannot read manifest directory"))
        .attach_printable_lazy(|| dir.display().to_string())?;

    let mut files = Vec::new();
    for entry in entries {
        let path = entry
            .change_context(E2eError::manifest("cannot read manifest directory"))?
            .path();
        let is_yaml = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext == "yaml" || ext == "yml");
        let is_golden = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .is_some_and(|stem| stem.ends_with(GOLDEN_SUFFIX));
        if is_yaml && !is_golden && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Objects of all manifest files under `dir`.
pub fn load_dir(dir: &Path) -> Result<Vec<DynamicObject>, Report<E2eError>> {
    let mut objects = Vec::new();
    for file in manifest_files(dir)? {
        let content = fs::read_to_string(&file)
            .change_context(E2eError::manifest("cannot read manifest"))
            .attach_printable_lazy(|| file.display().to_string())?;
        objects.extend(
            parse_documents(&content).attach_printable_lazy(|| file.display().to_string())?,
        );
    }
    debug!(dir = %dir.display(), count = objects.len(), "Loaded manifests");
    Ok(objects)
}

/// The first document of a YAML file, as plain JSON.
pub fn load_document(path: &Path) -> Result<Value, Report<E2eError>> {
    let content = fs::read_to_string(path)
        .change_context(E2eError::manifest("cannot read manifest"))
        .attach_printable_lazy(|| path.display().to_string())?;
    serde_yaml::from_str(&content)
        .change_context(E2eError::manifest("invalid YAML"))
        .attach_printable_lazy(|| path.display().to_string())
}

/// Server-side apply `object`, resolving its resource through discovery.
pub async fn apply_object(client: &Client, object: &DynamicObject) -> Result<(), Report<E2eError>> {
    let types = object
        .types
        .as_ref()
        .ok_or_else(|| Report::new(E2eError::manifest("object has no apiVersion or kind")))?;
    let gvk = GroupVersionKind::try_from(types)
        .change_context(E2eError::manifest("invalid apiVersion"))
        .attach_printable_lazy(|| types.api_version.clone())?;
    let name = object
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| Report::new(E2eError::manifest("object has no metadata.name")))
        .attach_printable_lazy(|| gvk.kind.clone())?;

    let (resource, capabilities) = pinned_kind(client, &gvk)
        .await
        .change_context(E2eError::api("cannot discover resource"))
        .attach_printable_lazy(|| format!("{}/{}", types.api_version, gvk.kind))?;

    let api: Api<DynamicObject> = match capabilities.scope {
        Scope::Namespaced => {
            let namespace = object.metadata.namespace.as_deref().unwrap_or("default");
            Api::namespaced_with(client.clone(), namespace, &resource)
        }
        Scope::Cluster => Api::all_with(client.clone(), &resource),
    };

    api.patch(name, &PatchParams::apply(FIELD_MANAGER).force(), &Patch::Apply(object))
        .await
        .change_context(E2eError::api("server-side apply failed"))
        .attach_printable_lazy(|| format!("{}/{name}", gvk.kind))?;

    debug!(kind = %gvk.kind, name, "Applied manifest");
    Ok(())
}

pub async fn apply_all(client: &Client, objects: &[DynamicObject]) -> Result<(), Report<E2eError>> {
    for object in objects {
        apply_object(client, object).await?;
    }
    Ok(())
}

/// Apply a rendered JSON manifest.
pub async fn apply_value(client: &Client, value: &Value) -> Result<(), Report<E2eError>> {
    let object: DynamicObject = serde_json::from_value(value.clone())
        .change_context(E2eError::manifest("document is not a Kubernetes object"))?;
    apply_object(client, &object).await
}

/// Apply every manifest under `dir`.
pub async fn apply_dir(client: &Client, dir: &Path) -> Result<(), Report<E2eError>> {
    let objects = load_dir(dir)?;
    info!(dir = %dir.display(), count = objects.len(), "Applying manifests");
    apply_all(client, &objects).await
}
