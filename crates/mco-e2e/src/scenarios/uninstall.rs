use error_stack::Report;
use error_stack::ResultExt;
use kube::api::DeleteParams;
use tracing::info;

use crate::classify::is_not_found;
use crate::config::Wait;
use crate::error::E2eError;
use crate::resources::mco;
use crate::resources::mco::McoVersion;
use crate::resources::names::MCO_CR_NAME;
use crate::resources::names::MCO_NAMESPACE;
use crate::resources::names::MCO_PULL_SECRET_NAME;
use crate::resources::names::OBJ_SECRET_NAME;
use crate::resources::secret::delete_secret;
use crate::scenarios::TestContext;

/// Treat an already missing object as deleted.
fn ignore_missing(result: Result<(), kube::Error>) -> Result<(), kube::Error> {
    match result {
        Err(err) if is_not_found(&err) => Ok(()),
        other => other,
    }
}

pub async fn run(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    let client = ctx.hub_client();

    ctx.step("Delete MCO instance");
    let deleted = mco::api(client, McoVersion::V1beta2)
        .delete(MCO_CR_NAME, &DeleteParams::default())
        .await
        .map(|_| ());
    ignore_missing(deleted).change_context(E2eError::api("failed to delete MCO instance"))?;

    info!("Delete MCO pull secret");
    ignore_missing(delete_secret(client, MCO_PULL_SECRET_NAME, MCO_NAMESPACE).await)
        .change_context(E2eError::api("failed to delete MCO pull secret"))?;

    info!("Delete MCO object storage secret");
    ignore_missing(delete_secret(client, OBJ_SECRET_NAME, MCO_NAMESPACE).await)
        .change_context(E2eError::api("failed to delete object storage secret"))?;

    ctx.step("Waiting for MCO instance to be removed");
    ctx.eventually("MCO instance removed", Wait::Minutes(5), || ctx.hub.mco_gone())
        .await
}
