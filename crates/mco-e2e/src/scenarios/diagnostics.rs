use converge::ProbeResult;
use error_stack::Report;
use tracing::error;
use tracing::info;
use tracing::warn;

use crate::cluster::ClusterProbes;
use crate::error::E2eError;
use crate::resources::mco;
use crate::resources::mco::McoVersion;
use crate::resources::mco::McoView;
use crate::resources::names::MCO_ADDON_NAMESPACE;
use crate::resources::names::MCO_NAMESPACE;
use crate::scenarios::TestContext;

/// Log the MCO object and the pod status of the MCO and addon namespaces.
pub async fn dump(ctx: &TestContext) {
    match mco::fetch(ctx.hub_client(), McoVersion::V1beta2).await {
        Ok(object) => match McoView::from_object(&object) {
            Ok(view) => info!(
                spec = ?view.spec,
                conditions = %view.condition_summary(),
                "MCO object"
            ),
            Err(err) => warn!(%err, data = %object.data, "MCO object does not decode"),
        },
        Err(err) => error!(%err, "Failed to get the MCO object"),
    }

    log_pods(&ctx.hub, MCO_NAMESPACE).await;
    log_pods(&ctx.managed, MCO_ADDON_NAMESPACE).await;
}

async fn log_pods(probes: &ClusterProbes, namespace: &str) {
    match probes.pod_phases(namespace).await {
        Ok(pods) if pods.is_empty() => warn!(namespace, "No pods found"),
        Ok(pods) => {
            for (name, phase) in pods {
                if phase == "Running" || phase == "Succeeded" {
                    info!(namespace, pod = %name, %phase, "Pod status");
                } else {
                    warn!(namespace, pod = %name, %phase, "Pod status");
                }
            }
        }
        Err(err) => error!(namespace, %err, "Failed to list pods"),
    }
}

/// One-shot check that the hub still reports a healthy observability stack.
///
/// # Errors
///
/// - [`E2eError::Integrity`] naming the first failed observation
pub async fn integrity_check(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    let observations = [
        ctx.hub.mco_condition(McoVersion::V1beta2, "Ready").await,
        ctx.hub.cluster_management_addon_exists().await,
    ];
    for observation in observations {
        match observation {
            ProbeResult::Success => {}
            ProbeResult::Retryable(message) | ProbeResult::Fatal(message) => {
                return Err(Report::new(E2eError::Integrity { message }));
            }
        }
    }
    Ok(())
}
