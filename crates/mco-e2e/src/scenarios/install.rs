use std::path::Path;
use std::path::PathBuf;

use converge::ProbeResult;
use error_stack::Report;
use error_stack::ResultExt;
use tracing::info;

use crate::classify::classify;
use crate::config::Wait;
use crate::error::E2eError;
use crate::manifests;
use crate::resources::mco::McoVersion;
use crate::resources::names::component;
use crate::resources::names::AvailabilityMode;
use crate::resources::names::MCO_ADDON_NAMESPACE;
use crate::resources::names::MCO_CR_NAME;
use crate::resources::names::METRICS_COLLECTOR_LABEL;
use crate::resources::names::REQUIRED_CRDS;
use crate::resources::ocm;
use crate::resources::secret;
use crate::scenarios::TestContext;

pub const GOLDEN_V1BETA1_TO_V1BETA2: &str = "observability-v1beta1-to-v1beta2-golden.yaml";

/// Manifest locations below the gitops checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitopsLayout {
    pub policy: PathBuf,
    pub v1beta1: PathBuf,
    pub v1beta2: PathBuf,
    pub conversion_golden: PathBuf,
}

impl GitopsLayout {
    pub fn new(root: &Path) -> Self {
        let e2e = root.join("mco").join("e2e");
        let v1beta1 = e2e.join("v1beta1");
        Self {
            policy: root.join("policy"),
            conversion_golden: v1beta1.join(GOLDEN_V1BETA1_TO_V1BETA2),
            v1beta1,
            v1beta2: e2e.join("v1beta2"),
        }
    }
}

pub async fn run(ctx: &TestContext) -> Result<(), Report<E2eError>> {
    if ctx.switches.skip_install_step {
        info!("Skipping install step");
        return Ok(());
    }

    let client = ctx.hub_client();
    let layout = GitopsLayout::new(&ctx.gitops_dir);

    ctx.step("Checking MCO operator is existed");
    ctx.eventually("MCO operator running", Wait::Default, || {
        ctx.hub.operator_running()
    })
    .await?;

    ctx.step("Checking Required CRDs is existed");
    ctx.eventually("required CRDs", Wait::Default, || {
        ctx.hub.crds_exist(&REQUIRED_CRDS)
    })
    .await?;

    manifests::apply_value(client, &manifests::namespace()).await?;
    if ctx.switches.is_canary_env {
        let storage = ctx.object_storage()?;
        secret::create_pull_secret(client)
            .await
            .change_context(E2eError::api("failed to create MCO pull secret"))?;
        manifests::apply_value(client, &manifests::object_storage_secret(&storage)).await?;
    }

    // resource quota and limit range keep canary nodes from being exhausted
    manifests::apply_dir(client, &layout.policy).await?;

    if !ctx.switches.is_canary_env {
        ctx.step("Creating the MCO testing RBAC resources");
        for object in manifests::testing_rbac() {
            manifests::apply_value(client, &object).await?;
        }
    }

    if !ctx.switches.skip_integration_cases {
        install_v1beta1(ctx, &layout).await?;
    }

    ctx.step("Apply MCO instance of v1beta2");
    manifests::apply_dir(client, &layout.v1beta2).await?;

    ctx.step("Checking the thanos-receive storage capacity is updated");
    // thanos-receive pods take up to 15 minutes to terminate
    let receive = component("thanos-receive-default");
    let receive = receive.as_str();
    ctx.eventually("thanos-receive storage 4Gi", Wait::Minutes(25), || {
        ctx.hub.storage_resized(receive, "4Gi")
    })
    .await?;

    ctx.step("Waiting for MCO ready status");
    ctx.eventually("components in high mode", Wait::Minutes(25), || {
        ctx.hub.components_ready(AvailabilityMode::High)
    })
    .await?;

    ctx.step("Checking placementrule CR is created");
    ctx.eventually("placement rule exists", Wait::Minutes(10), || {
        ctx.hub.placement_rule_exists()
    })
    .await?;

    if !ctx.switches.is_canary_env {
        ctx.step("Patching the placementrule CR's status");
        let clusters = ctx.options.managed_cluster_names();
        let clusters = &clusters;
        ctx.eventually("placement rule status patched", Wait::Default, || async move {
            match ocm::patch_placement_rule(client, clusters).await {
                Ok(_) => ProbeResult::Success,
                Err(err) => classify(&err),
            }
        })
        .await?;

        ctx.step("Waiting for MCO addon components ready");
        ctx.eventually("metrics collector running", Wait::Minutes(5), || {
            ctx.managed
                .pod_count(MCO_ADDON_NAMESPACE, METRICS_COLLECTOR_LABEL, 1)
        })
        .await?;
    }

    ctx.step("Check clustermanagementaddon CR is created");
    ctx.eventually("cluster management addon exists", Wait::Default, || {
        ctx.hub.cluster_management_addon_exists()
    })
    .await
}

async fn install_v1beta1(ctx: &TestContext, layout: &GitopsLayout) -> Result<(), Report<E2eError>> {
    ctx.step("Creating MCO instance of v1beta1");
    manifests::apply_dir(ctx.hub_client(), &layout.v1beta1).await?;

    ctx.step("Waiting for MCO ready status");
    ctx.eventually("MCO v1beta1 ready", Wait::Minutes(20), || {
        ctx.hub.mco_condition(McoVersion::V1beta1, "Ready")
    })
    .await
    .attach_printable_lazy(|| format!("check the {MCO_CR_NAME} CR status for the details"))?;

    ctx.step("Check clustermanagementaddon CR is created");
    ctx.eventually("cluster management addon exists", Wait::Default, || {
        ctx.hub.cluster_management_addon_exists()
    })
    .await?;

    ctx.step("Check the api conversion is working as expected");
    let golden = manifests::load_document(&layout.conversion_golden)?;
    let golden = &golden;
    ctx.eventually("v1beta1 to v1beta2 conversion", Wait::Default, || {
        ctx.hub.mco_converted(golden)
    })
    .await
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;

    use super::*;

    #[test]
    fn layout_follows_gitops_checkout() {
        let layout = GitopsLayout::new(Path::new("/work/observability-gitops"));
        assert_eq!(
            layout,
            GitopsLayout {
                policy: PathBuf::from("/work/observability-gitops/policy"),
                v1beta1: PathBuf::from("/work/observability-gitops/mco/e2e/v1beta1"),
                v1beta2: PathBuf::from("/work/observability-gitops/mco/e2e/v1beta2"),
                conversion_golden: PathBuf::from(
                    "/work/observability-gitops/mco/e2e/v1beta1/observability-v1beta1-to-v1beta2-golden.yaml"
                ),
            }
        );
    }
}
