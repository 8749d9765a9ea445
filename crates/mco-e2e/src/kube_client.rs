use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use http::Uri;
use kube::config::KubeConfigOptions;
use kube::config::Kubeconfig;
use kube::Client;
use kube::Config;
use tracing::info;

use crate::config::Cluster;
use crate::config::TestOptions;
use crate::error::E2eError;

/// Clients for the hub and for the managed cluster hosting the addon.
#[derive(Clone)]
pub struct ClusterClients {
    pub hub: Client,
    pub managed: Client,
}

impl ClusterClients {
    /// Connect to the hub and the first managed cluster.
    ///
    /// The managed client is the hub client when the options list no managed
    /// cluster, matching a hub that manages itself as `local-cluster`.
    ///
    /// # Errors
    ///
    /// - [`E2eError::ConnectionFailed`] if a kubeconfig cannot be loaded
    pub async fn connect(
        options: &TestOptions,
        kubeconfig_override: Option<PathBuf>,
    ) -> Result<Self, Report<E2eError>> {
        let hub_kubeconfig = kubeconfig_override
            .as_deref()
            .or(options.kubeconfig_for(&options.hub));
        let hub = init_kube_client(&options.hub, hub_kubeconfig).await?;

        let managed = match options.managed_cluster() {
            Some(cluster) => {
                init_kube_client(cluster, options.kubeconfig_for(cluster)).await?
            }
            None => hub.clone(),
        };

        Ok(Self { hub, managed })
    }
}

/// Build a client for `cluster`, honoring its context and master URL.
pub async fn init_kube_client(
    cluster: &Cluster,
    kubeconfig: Option<&Path>,
) -> Result<Client, Report<E2eError>> {
    let config_options = KubeConfigOptions {
        context: cluster.kube_context.clone(),
        ..Default::default()
    };

    let mut config = match kubeconfig {
        Some(kubeconfig_path) => {
            let kubeconfig = Kubeconfig::read_from(kubeconfig_path).change_context(
                E2eError::ConnectionFailed {
                    message: format!(
                        "Failed to read kubeconfig file: {}",
                        kubeconfig_path.display()
                    ),
                },
            )?;

            Config::from_custom_kubeconfig(kubeconfig, &config_options)
                .await
                .change_context(E2eError::ConnectionFailed {
                    message: format!(
                        "Failed to create config from kubeconfig: {}",
                        kubeconfig_path.display()
                    ),
                })?
        }
        None if cluster.kube_context.is_some() => Config::from_kubeconfig(&config_options)
            .await
            .change_context(E2eError::ConnectionFailed {
                message: format!(
                    "Failed to load context {:?} from the default kubeconfig",
                    cluster.kube_context
                ),
            })?,
        // in-cluster or ~/.kube/config
        None => Config::infer()
            .await
            .change_context(E2eError::ConnectionFailed {
                message: "Failed to infer Kubernetes configuration".to_string(),
            })?,
    };

    if let Some(master_url) = &cluster.master_url {
        config.cluster_url = master_url.parse::<Uri>().change_context(
            E2eError::ConnectionFailed {
                message: format!("Invalid master URL for cluster {}", cluster.name),
            },
        )?;
    }

    info!(
        cluster = %cluster.name,
        url = %config.cluster_url,
        "Connecting to Kubernetes API"
    );

    Client::try_from(config).change_context(E2eError::ConnectionFailed {
        message: format!("Failed to create Kubernetes client for {}", cluster.name),
    })
}
