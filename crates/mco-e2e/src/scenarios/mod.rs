//! Install, reconcile and uninstall scenarios against a live hub.

pub mod diagnostics;
pub mod install;
pub mod reconcile;
pub mod uninstall;

use std::future::Future;
use std::path::PathBuf;

use converge::CancellationToken;
use converge::PollPolicy;
use converge::Poller;
use converge::ProbeResult;
use error_stack::Report;
use error_stack::ResultExt;
use tracing::error;
use tracing::info;

use crate::cluster::ClusterProbes;
use crate::config::ObjectStorage;
use crate::config::ObjectStorageArgs;
use crate::config::SuiteArgs;
use crate::config::TestOptions;
use crate::config::Wait;
use crate::config::Waits;
use crate::error::E2eError;
use crate::kube_client::ClusterClients;

/// Environment switches that select scenario branches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Switches {
    pub skip_install_step: bool,
    pub is_canary_env: bool,
    pub skip_integration_cases: bool,
}

impl From<&SuiteArgs> for Switches {
    fn from(args: &SuiteArgs) -> Self {
        Self {
            skip_install_step: args.skip_install_step,
            is_canary_env: args.is_canary_env,
            skip_integration_cases: args.skip_integration_cases,
        }
    }
}

/// Poll `probe` under `policy` as the named step.
///
/// # Errors
///
/// - [`E2eError::Convergence`] if the probe times out, fails fatally or the
///   run is cancelled; the poll outcome is attached
pub async fn wait_for<F, Fut>(
    step: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
    probe: F,
) -> Result<(), Report<E2eError>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ProbeResult>,
{
    let result = Poller::new(policy)
        .with_operation(step.to_string())
        .with_cancellation(cancel.clone())
        .poll_async(probe)
        .await
        .into_result();
    if result.as_ref().is_err_and(|err| err.is_canceled()) {
        info!(step, "Wait cancelled");
    }
    result.change_context(E2eError::Convergence {
        step: step.to_string(),
    })
}

/// Everything a scenario needs, passed explicitly.
pub struct TestContext {
    pub options: TestOptions,
    pub hub: ClusterProbes,
    pub managed: ClusterProbes,
    pub switches: Switches,
    pub gitops_dir: PathBuf,
    pub waits: Waits,
    object_storage: ObjectStorageArgs,
    failed: bool,
    cancel: CancellationToken,
}

impl TestContext {
    /// Load the options file and connect to the clusters it names.
    ///
    /// # Errors
    ///
    /// - [`E2eError::Configuration`] if the options file cannot be loaded
    /// - [`E2eError::ConnectionFailed`] if a client cannot be built
    pub async fn from_args(
        args: &SuiteArgs,
        cancel: CancellationToken,
    ) -> Result<Self, Report<E2eError>> {
        let options = TestOptions::load(&args.options)?;
        let clients = ClusterClients::connect(&options, args.kubeconfig.clone()).await?;
        Ok(Self::new(options, clients, args, cancel))
    }

    pub fn new(
        options: TestOptions,
        clients: ClusterClients,
        args: &SuiteArgs,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            options,
            hub: ClusterProbes::new(clients.hub),
            managed: ClusterProbes::new(clients.managed),
            switches: Switches::from(args),
            gitops_dir: args.gitops_dir.clone(),
            waits: Waits::from(args),
            object_storage: args.object_storage.clone(),
            failed: false,
            cancel,
        }
    }

    pub fn hub_client(&self) -> &kube::Client {
        self.hub.client()
    }

    /// S3 settings, required only when the canary path creates the secret.
    pub fn object_storage(&self) -> Result<ObjectStorage, Report<E2eError>> {
        ObjectStorage::try_from(&self.object_storage)
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Log a scenario step.
    pub fn step(&self, description: &str) {
        info!(step = description, "STEP");
    }

    /// Wait for `probe` to succeed within the budget of `wait`.
    pub async fn eventually<F, Fut>(
        &self,
        step: &str,
        wait: Wait,
        probe: F,
    ) -> Result<(), Report<E2eError>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProbeResult>,
    {
        let policy = self
            .waits
            .policy(wait)
            .change_context(E2eError::configuration("invalid poll settings"))?;
        wait_for(step, policy, &self.cancel, probe).await
    }

    /// Close a case: diagnostics after a failure, the integrity check otherwise.
    ///
    /// Once a case has failed, every later case dumps diagnostics too.
    pub async fn finish_case(
        &mut self,
        case: &str,
        result: Result<(), Report<E2eError>>,
    ) -> Result<(), Report<E2eError>> {
        if let Err(report) = &result {
            error!(case, "Case failed: {report:?}");
        }
        self.failed |= result.is_err();

        if self.failed {
            diagnostics::dump(self).await;
            return result;
        }

        diagnostics::integrity_check(self)
            .await
            .attach_printable_lazy(|| format!("after case `{case}`"))
    }
}

/// Outcome of a sequence of cases that keeps going after a failure.
#[derive(Debug, Default)]
pub struct CaseReport {
    passed: Vec<String>,
    failed: Vec<(String, Report<E2eError>)>,
}

impl CaseReport {
    pub fn record(&mut self, case: &str, result: Result<(), Report<E2eError>>) {
        match result {
            Ok(()) => self.passed.push(case.to_string()),
            Err(report) => self.failed.push((case.to_string(), report)),
        }
    }

    pub fn passed(&self) -> &[String] {
        &self.passed
    }

    pub fn failed_cases(&self) -> Vec<&str> {
        self.failed.iter().map(|(case, _)| case.as_str()).collect()
    }

    /// `Ok` when every case passed, otherwise the first failure with the
    /// names of the others attached.
    pub fn into_result(self) -> Result<(), Report<E2eError>> {
        info!(
            passed = self.passed.len(),
            failed = self.failed.len(),
            "Cases finished"
        );
        let mut failures = self.failed.into_iter();
        let Some((case, report)) = failures.next() else {
            return Ok(());
        };

        let mut report = report.attach_printable(format!("case `{case}` failed"));
        for (case, _) in failures {
            report = report.attach_printable(format!("case `{case}` failed"));
        }
        Err(report)
    }
}
