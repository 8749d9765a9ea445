use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(about, long_about, version)]
pub struct Cli {
    /// Increase log verbosity (-v shows every poll attempt)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(flatten)]
    pub suite: SuiteArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Install the observability stack and wait for it to become ready
    Install,
    /// Modify the MCO CR and verify the operator reconciles the changes
    Reconcile,
    /// Delete the MCO instance and its secrets
    Uninstall,
    /// Run install, reconcile and uninstall in order
    All,
    /// Run the integrity check once against the current hub state
    Check,
}

#[derive(Args, Debug, Clone)]
pub struct SuiteArgs {
    #[arg(
        long,
        env = "OPTIONS",
        value_hint = clap::ValueHint::FilePath,
        default_value = "resources/options.yaml",
        help = "Path of the test options file describing hub and managed clusters"
    )]
    pub options: PathBuf,

    #[arg(
        long,
        env = "KUBECONFIG",
        value_hint = clap::ValueHint::FilePath,
        help = "Kubeconfig overriding the one named in the options file"
    )]
    pub kubeconfig: Option<PathBuf>,

    #[arg(
        long,
        env = "GITOPS_DIR",
        value_hint = clap::ValueHint::DirPath,
        default_value = "../../observability-gitops",
        help = "Directory holding the pre-rendered policy and MCO manifests"
    )]
    pub gitops_dir: PathBuf,

    #[arg(
        long,
        env = "SKIP_INSTALL_STEP",
        help = "Skip the install scenario entirely",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub skip_install_step: bool,

    #[arg(
        long = "canary",
        env = "IS_CANARY_ENV",
        help = "Target a canary environment (pull and object-storage secrets are created)",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub is_canary_env: bool,

    #[arg(
        long,
        env = "SKIP_INTEGRATION_CASES",
        help = "Skip the v1beta1 instance and API conversion checks during install",
        default_value_t = false,
        action = clap::ArgAction::Set
    )]
    pub skip_integration_cases: bool,

    #[arg(
        long,
        default_value = "60",
        help = "Length in seconds of one timeout unit; step timeouts are multiples of it"
    )]
    pub timeout_unit_secs: u64,

    #[arg(
        long,
        default_value = "5",
        help = "Seconds between probe attempts for long waits"
    )]
    pub poll_interval_secs: u64,

    #[command(flatten)]
    pub object_storage: ObjectStorageArgs,
}

/// S3 credentials for the thanos object-storage secret (canary only).
#[derive(Args, Debug, Clone, Default)]
pub struct ObjectStorageArgs {
    #[arg(long, env = "BUCKET", hide_env_values = true)]
    pub bucket: Option<String>,

    #[arg(long, env = "REGION", hide_env_values = true)]
    pub region: Option<String>,

    #[arg(long, env = "ACCESSKEY", hide_env_values = true)]
    pub access_key: Option<String>,

    #[arg(long, env = "SECRETKEY", hide_env_values = true)]
    pub secret_key: Option<String>,
}
