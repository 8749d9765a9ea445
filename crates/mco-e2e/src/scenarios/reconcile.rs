use std::collections::BTreeMap;

use error_stack::Report;
use error_stack::ResultExt;
use tracing::info;

use crate::classify::classify;
use crate::config::Wait;
use crate::error::E2eError;
use crate::resources::configmap;
use crate::resources::mco;
use crate::resources::mco::McoPatch;
use crate::resources::names::component;
use crate::resources::names::AvailabilityMode;
use crate::resources::names::CUSTOM_ALLOWLIST_NAME;
use crate::resources::names::MCO_ADDON_NAMESPACE;
use crate::resources::names::MCO_NAMESPACE;
use crate::resources::names::METRICS_COLLECTOR_LABEL;
use crate::scenarios::CaseReport;
use crate::scenarios::TestContext;

const ALLOWLIST_METRICS: [&str; 2] = ["node_memory_MemTotal_bytes", "e2e_custom_metric"];

fn linux_node_selector() -> BTreeMap<String, String> {
    BTreeMap::from([("kubernetes.io/os".to_string(), "linux".to_string())])
}

fn retention_arg(raw: &str) -> String {
    format!("--retention.resolution-raw={raw}")
}

/// Changes the reconcile cases make to the MCO CR.
pub fn modification() -> McoPatch {
    McoPatch::new()
        .retention_resolution_raw("3d")
        .alertmanager_storage_size("2Gi")
        .node_selector(Some(&linux_node_selector()))
}

/// Undo [`modification`]; storage claims cannot shrink, so the size stays.
pub fn revert() -> McoPatch {
    McoPatch::new()
        .retention_resolution_raw("5d")
        .node_selector(None)
}

/// Reconcile cases in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    ModifyCr,
    NodeSelector,
    AntiAffinity,
    AlertmanagerStorage,
    QueryReplicas,
    CustomAllowlist,
    BasicMode,
    AddonMetrics,
    RevertCr,
}

impl Case {
    pub const ALL: [Case; 9] = [
        Case::ModifyCr,
        Case::NodeSelector,
        Case::AntiAffinity,
        Case::AlertmanagerStorage,
        Case::QueryReplicas,
        Case::CustomAllowlist,
        Case::BasicMode,
        Case::AddonMetrics,
        Case::RevertCr,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Case::ModifyCr => "Modifying MCO CR for reconciling",
            Case::NodeSelector => "Checking node selector for all pods",
            Case::AntiAffinity => "Checking podAntiAffinity for all pods",
            Case::AlertmanagerStorage => "Checking alertmanager storage resize",
            Case::QueryReplicas => "Customize the replicas for thanos query",
            Case::CustomAllowlist => "Customize the metrics allowlist",
            Case::BasicMode => "Modifying MCO availabilityConfig to enable basic mode",
            Case::AddonMetrics => "Disable metrics collection through observabilityAddonSpec",
            Case::RevertCr => "Revert MCO CR changes",
        }
    }

    async fn run(self, ctx: &TestContext) -> Result<(), Report<E2eError>> {
        match self {
            Case::ModifyCr => modify_cr(ctx).await,
            Case::NodeSelector => {
                let selector = linux_node_selector();
                let selector = &selector;
                ctx.eventually("node selector on all pods", Wait::Minutes(5), || {
                    ctx.hub.pods_have_node_selector(selector)
                })
                .await
            }
            Case::AntiAffinity => {
                ctx.eventually("anti-affinity on all pods", Wait::Minutes(5), || {
                    ctx.hub.pods_have_anti_affinity()
                })
                .await
            }
            Case::AlertmanagerStorage => {
                let alertmanager = component("alertmanager");
                let alertmanager = alertmanager.as_str();
                ctx.eventually("alertmanager storage 2Gi", Wait::Minutes(5), || {
                    ctx.hub.storage_resized(alertmanager, "2Gi")
                })
                .await
            }
            Case::QueryReplicas => query_replicas(ctx).await,
            Case::CustomAllowlist => custom_allowlist(ctx).await,
            Case::BasicMode => basic_mode(ctx).await,
            Case::AddonMetrics => addon_metrics(ctx).await,
            Case::RevertCr => revert_cr(ctx).await,
        }
    }
}

/// Run every case, continuing past failures, and fail at the end if any did.
pub async fn run(ctx: &mut TestContext) -> Result<(), Report<E2eError>> {
    let mut cases = CaseReport::default();
    for case in Case::ALL {
        if ctx.is_cancelled() {
            info!(case = case.name(), "Run cancelled, skipping remaining cases");
            break;
        }
        ctx.step(case.name());
        let result = case.run(ctx).await;
        let result = ctx.finish_case(case.name(), result).await;
        cases.record(case.name(), result);
    }
    cases.into_result()
}

async fn wait_for_retention(ctx: &TestContext, raw: &str) -> Result<(), Report<E2eError>> {
    let compact = component("thanos-compact");
    let compact = compact.as_str();
    let arg = retention_arg(raw);
    let arg = arg.as_str();

    ctx.step("Waiting for MCO retentionResolutionRaw filed to take effect");
    ctx.eventually("compact retention argument", Wait::Minutes(5), || {
        ctx.hub.statefulset_arg(compact, arg)
    })
    .await?;

    ctx.step("Wait for thanos compact pods are ready");
    ctx.eventually("thanos compact ready", Wait::Minutes(10), || {
        ctx.hub.statefulset_ready(compact, 1)
    })
    .await
}

async fn modify_cr(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    mco::apply_patch(ctx.hub_client(), &modification())
        .await
        .change_context(E2eError::api("failed to modify MCO CR"))?;

    wait_for_retention(ctx, "3d").await?;

    ctx.step("Wait for alertmanager pods are ready");
    let alertmanager = component("alertmanager");
    let alertmanager = alertmanager.as_str();
    ctx.eventually("alertmanager ready", Wait::Minutes(10), || {
        ctx.hub.statefulset_ready(alertmanager, 3)
    })
    .await
}

/// Set `spec.advanced.query.replicas` and expect `expected` on the deployment.
async fn update_query_replicas(
    ctx: &TestContext,
    replicas: i32,
    expected: i32,
) -> Result<(), Report<E2eError>> {
    let query = component("thanos-query");
    let query = query.as_str();
    let patch = McoPatch::new().component_replicas("query", replicas);
    let patch = &patch;
    let client = ctx.hub_client();

    let step = format!("thanos query replicas {replicas} reconciled to {expected}");
    ctx.eventually(&step, Wait::Minutes(5), || async move {
        match mco::apply_patch(client, patch).await {
            Ok(_) => ctx.hub.deployment_spec_replicas(query, expected).await,
            Err(err) => classify(&err),
        }
    })
    .await
}

async fn query_replicas(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    update_query_replicas(ctx, 3, 3).await?;
    // zero is not honored, the operator keeps the previous count
    update_query_replicas(ctx, 0, 3).await?;
    update_query_replicas(ctx, 2, 2).await?;

    ctx.step("Wait for thanos query pods are ready");
    let query = component("thanos-query");
    let query = query.as_str();
    ctx.eventually("thanos query ready", Wait::Minutes(10), || {
        ctx.hub.deployment_ready(query, 2)
    })
    .await
}

async fn custom_allowlist(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    let client = ctx.hub_client();
    let allowlist = configmap::custom_allowlist(&ALLOWLIST_METRICS);

    configmap::create_configmap(client, &allowlist)
        .await
        .change_context(E2eError::api("failed to create custom allowlist"))?;

    let stored = configmap::get_configmap(client, CUSTOM_ALLOWLIST_NAME, MCO_NAMESPACE)
        .await
        .change_context(E2eError::api("failed to read custom allowlist"))?;
    let metrics = configmap::allowlisted_metrics(&stored);
    let expected: Vec<String> = ALLOWLIST_METRICS.iter().map(|m| m.to_string()).collect();

    configmap::delete_configmap(client, CUSTOM_ALLOWLIST_NAME, MCO_NAMESPACE)
        .await
        .change_context(E2eError::api("failed to delete custom allowlist"))?;

    if metrics != expected {
        return Err(Report::new(E2eError::Integrity {
            message: format!("custom allowlist lists {metrics:?}, expect {expected:?}"),
        }));
    }
    Ok(())
}

/// Switch to Basic, expect single replicas, then restore High.
async fn basic_mode(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    for mode in [AvailabilityMode::Basic, AvailabilityMode::High] {
        mco::apply_patch(ctx.hub_client(), &McoPatch::new().availability_config(mode))
            .await
            .change_context(E2eError::api("failed to modify MCO availabilityConfig"))
            .attach_printable_lazy(|| format!("mode {}", mode.as_str()))?;

        ctx.step(&format!("Checking MCO components in {} mode", mode.as_str()));
        ctx.eventually(
            &format!("components in {} mode", mode.as_str()),
            Wait::Minutes(15),
            || ctx.hub.components_ready(mode),
        )
        .await?;
    }
    Ok(())
}

/// Turn addon metrics off and back on, following the addon and its collector.
async fn addon_metrics(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    let clusters = ctx.options.managed_cluster_names();
    for (enabled, collectors) in [(false, 0), (true, 1)] {
        mco::apply_patch(ctx.hub_client(), &McoPatch::new().enable_metrics(enabled))
            .await
            .change_context(E2eError::api("failed to modify MCO observabilityAddonSpec"))?;

        for cluster in &clusters {
            let step = format!("addon on {cluster} has enableMetrics {enabled}");
            ctx.eventually(&step, Wait::Minutes(5), || {
                ctx.hub.addon_metrics_enabled(cluster, enabled)
            })
            .await?;
        }

        // the collector is only scheduled once the placement rule was patched
        if ctx.switches.is_canary_env {
            continue;
        }
        ctx.step("Waiting for metrics collector pods to follow enableMetrics");
        ctx.eventually(
            &format!("{collectors} metrics collector pods"),
            Wait::Minutes(5),
            || {
                ctx.managed
                    .pod_count(MCO_ADDON_NAMESPACE, METRICS_COLLECTOR_LABEL, collectors)
            },
        )
        .await?;
    }
    Ok(())
}

async fn revert_cr(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    mco::apply_patch(ctx.hub_client(), &revert())
        .await
        .change_context(E2eError::api("failed to revert MCO CR"))?;

    wait_for_retention(ctx, "5d").await?;

    ctx.step("Checking MCO components in default HA mode");
    ctx.eventually("components in high mode", Wait::Minutes(15), || {
        ctx.hub.components_ready(AvailabilityMode::High)
    })
    .await
}
