use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::DeleteParams;
use kube::api::PostParams;
use kube::Api;
use kube::Client;
use tracing::info;

use crate::resources::names::MCO_NAMESPACE;
use crate::resources::names::MCO_OPERATOR_NAMESPACE;
use crate::resources::names::MCO_PULL_SECRET_NAME;

/// Copy of `source` placed in `namespace`, keeping only its payload.
pub fn relocated(source: Secret, namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: source.metadata.name,
            namespace: Some(namespace.to_string()),
            ..Default::default()
        },
        ..source
    }
}

/// Copy the hub pull secret from the operator namespace into the MCO namespace.
pub async fn create_pull_secret(client: &Client) -> Result<Secret, kube::Error> {
    let source: Api<Secret> = Api::namespaced(client.clone(), MCO_OPERATOR_NAMESPACE);
    let pull_secret = source.get(MCO_PULL_SECRET_NAME).await?;

    info!("Create MCO pull secret");
    let target: Api<Secret> = Api::namespaced(client.clone(), MCO_NAMESPACE);
    target
        .create(&PostParams::default(), &relocated(pull_secret, MCO_NAMESPACE))
        .await
}

pub async fn delete_secret(client: &Client, name: &str, namespace: &str) -> Result<(), kube::Error> {
    let api: Api<Secret> = Api::namespaced(client.clone(), namespace);
    api.delete(name, &DeleteParams::default()).await.map(|_| ())
}
