//! Access to ScaledObjects in the cluster
//!
//! The suspender only ever needs three calls against the API server. They sit
//! behind [`ScaledObjectStore`] so the patching logic can be exercised against
//! an in-memory store that injects conflicts.

use async_trait::async_trait;
use kube::api::{ListParams, PostParams};
use kube::{Api, Client, ResourceExt};
use tracing::debug;

use crate::crd::ScaledObject;

/// Read/write access to ScaledObjects, keyed by namespace and name.
///
/// `update` must reject a stale `resourceVersion` with a 409 `kube::Error::Api`
/// and a missing object with a 404, like the API server does.
#[async_trait]
pub trait ScaledObjectStore: Send + Sync {
    /// Fetch the latest revision of a ScaledObject
    async fn get(&self, namespace: &str, name: &str) -> Result<ScaledObject, kube::Error>;

    /// Replace a ScaledObject, guarded by its `resourceVersion`
    async fn update(
        &self,
        namespace: &str,
        object: &ScaledObject,
    ) -> Result<ScaledObject, kube::Error>;

    /// List all ScaledObjects in a namespace
    async fn list(&self, namespace: &str) -> Result<Vec<ScaledObject>, kube::Error>;
}

/// [`ScaledObjectStore`] backed by the Kubernetes API
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn api(&self, namespace: &str) -> Api<ScaledObject> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

#[async_trait]
impl ScaledObjectStore for KubeStore {
    async fn get(&self, namespace: &str, name: &str) -> Result<ScaledObject, kube::Error> {
        self.api(namespace).get(name).await
    }

    async fn update(
        &self,
        namespace: &str,
        object: &ScaledObject,
    ) -> Result<ScaledObject, kube::Error> {
        let name = object.name_any();
        let updated = self
            .api(namespace)
            .replace(&name, &PostParams::default(), object)
            .await?;
        debug!(
            scaledobject = %name,
            namespace = %namespace,
            resource_version = %updated.resource_version().unwrap_or_default(),
            "Replaced ScaledObject"
        );
        Ok(updated)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<ScaledObject>, kube::Error> {
        let list = self.api(namespace).list(&ListParams::default()).await?;
        Ok(list.items)
    }
}
