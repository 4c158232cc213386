//! Cluster access for integration tests
//!
//! Uses existing kubeconfig (~/.kube/config or KUBECONFIG environment variable).

use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::{Api, Client, Config};
use thiserror::Error;
use tokio::sync::OnceCell;

/// Name of the KEDA ScaledObject CRD
pub const SCALED_OBJECT_CRD: &str = "scaledobjects.keda.sh";

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Failed to create kube client: {0}")]
    ClientCreation(#[from] kube::Error),

    #[error("Failed to infer config: {0}")]
    InferConfig(#[from] kube::config::InferConfigError),

    #[error("KEDA is not installed: CRD {0} not found")]
    KedaMissing(&'static str),
}

/// KEDA CRD check (only done once per test run)
static KEDA_CHECKED: OnceCell<()> = OnceCell::const_new();

/// Create a client from the local kubeconfig and make sure KEDA is installed
pub async fn connect() -> Result<Client, ClusterError> {
    let config = Config::infer().await?;
    let client = Client::try_from(config)?;

    KEDA_CHECKED
        .get_or_try_init(|| async {
            let version = client.apiserver_version().await?;
            tracing::info!(
                "Connected to Kubernetes cluster: {} {}",
                version.platform,
                version.git_version
            );

            let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
            match crds.get_opt(SCALED_OBJECT_CRD).await? {
                Some(_) => Ok(()),
                None => Err(ClusterError::KedaMissing(SCALED_OBJECT_CRD)),
            }
        })
        .await?;

    Ok(client)
}
