use std::path::Path;
use std::path::PathBuf;

use error_stack::Report;
use error_stack::ResultExt;
use serde::Deserialize;

use crate::error::E2eError;

/// Name the hub registers itself under as a managed cluster.
pub const LOCAL_CLUSTER: &str = "local-cluster";

/// One cluster entry of the options file.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Cluster {
    #[serde(default)]
    pub name: String,
    /// API server URL overriding the one in the kubeconfig context.
    #[serde(default, rename = "masterURL")]
    pub master_url: Option<String>,
    #[serde(default, rename = "kubecontext")]
    pub kube_context: Option<String>,
    /// Kubeconfig for this cluster only; falls back to the suite kubeconfig.
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

/// Hub and managed clusters the suite runs against.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TestOptions {
    pub hub: Cluster,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
    #[serde(default)]
    pub kubeconfig: Option<PathBuf>,
}

#[derive(Deserialize)]
struct OptionsFile {
    options: TestOptions,
}

impl TestOptions {
    /// Load the `options:` document from a YAML file.
    ///
    /// # Errors
    ///
    /// - [`E2eError::Configuration`] if the file is unreadable or malformed
    pub fn load(path: &Path) -> Result<Self, Report<E2eError>> {
        let content = std::fs::read_to_string(path).change_context(
            E2eError::configuration(format!("failed to read options file {}", path.display())),
        )?;
        Self::from_yaml(&content)
            .attach_printable_lazy(|| format!("options file: {}", path.display()))
    }

    pub fn from_yaml(content: &str) -> Result<Self, Report<E2eError>> {
        let file: OptionsFile = serde_yaml::from_str(content)
            .change_context(E2eError::configuration("failed to parse test options"))?;
        Ok(file.options)
    }

    /// Kubeconfig to use for `cluster`: its own, else the suite-wide one.
    pub fn kubeconfig_for<'a>(&'a self, cluster: &'a Cluster) -> Option<&'a Path> {
        cluster
            .kubeconfig
            .as_deref()
            .or(self.kubeconfig.as_deref())
    }

    /// First managed cluster, if the options name any besides the hub.
    pub fn managed_cluster(&self) -> Option<&Cluster> {
        self.clusters.first()
    }

    /// Names used for placement decisions; the hub itself when none are listed.
    pub fn managed_cluster_names(&self) -> Vec<String> {
        let names: Vec<String> = self
            .clusters
            .iter()
            .filter(|cluster| !cluster.name.is_empty())
            .map(|cluster| cluster.name.clone())
            .collect();
        if names.is_empty() {
            vec![LOCAL_CLUSTER.to_string()]
        } else {
            names
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use similar_asserts::assert_eq;

    use super::*;

    const OPTIONS: &str = r#"
options:
  kubeconfig: /etc/kube/hub.kubeconfig
  hub:
    name: hub
    masterURL: https://api.hub.example.com:6443
    kubecontext: hub-admin
  clusters:
    - name: spoke-1
      kubecontext: spoke-1-admin
      kubeconfig: /etc/kube/spoke-1.kubeconfig
"#;

    #[test]
    fn parses_hub_and_managed_clusters() {
        let options = TestOptions::from_yaml(OPTIONS).expect("valid options");

        assert_eq!(options.hub.name, "hub");
        assert_eq!(
            options.hub.master_url.as_deref(),
            Some("https://api.hub.example.com:6443")
        );
        assert_eq!(options.hub.kube_context.as_deref(), Some("hub-admin"));
        assert_eq!(options.clusters.len(), 1);
        assert_eq!(options.managed_cluster_names(), vec!["spoke-1".to_string()]);
    }

    #[test]
    fn cluster_kubeconfig_overrides_suite_kubeconfig() {
        let options = TestOptions::from_yaml(OPTIONS).expect("valid options");

        assert_eq!(
            options.kubeconfig_for(&options.hub),
            Some(Path::new("/etc/kube/hub.kubeconfig"))
        );
        let spoke = options.managed_cluster().expect("one managed cluster");
        assert_eq!(
            options.kubeconfig_for(spoke),
            Some(Path::new("/etc/kube/spoke-1.kubeconfig"))
        );
    }

    #[test]
    fn hub_only_options_place_on_local_cluster() {
        let options = TestOptions::from_yaml("options:\n  hub:\n    name: hub\n")
            .expect("minimal options");

        assert!(options.managed_cluster().is_none());
        assert_eq!(options.managed_cluster_names(), vec![LOCAL_CLUSTER.to_string()]);
        assert_eq!(options.kubeconfig_for(&options.hub), None);
    }

    #[test]
    fn load_reports_missing_and_malformed_files() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.yaml");
        let report = TestOptions::load(&missing).expect_err("missing file");
        assert!(matches!(
            report.current_context(),
            E2eError::Configuration { .. }
        ));

        let path = dir.path().join("options.yaml");
        let mut file = std::fs::File::create(&path).expect("create options file");
        file.write_all(b"options: [not, a, map]\n")
            .expect("write options file");
        let report = TestOptions::load(&path).expect_err("malformed file");
        assert!(matches!(
            report.current_context(),
            E2eError::Configuration { .. }
        ));

        std::fs::write(&path, OPTIONS).expect("rewrite options file");
        assert!(TestOptions::load(&path).is_ok());
    }
}
