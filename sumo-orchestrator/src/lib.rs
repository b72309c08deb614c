mod error;
mod kube_client;
mod model;
mod port;

pub mod fake;

pub use error::Error;
pub use kube_client::KubeClientPort;
pub use model::{
    ConfigBlobMeta, ContainerSpec, NodeInfo, PodInfo, QuotaSpec, StorageClassInfo, VolumeMountSpec, VolumeSource,
    VolumeSpec, WorkloadSpec, WorkloadStatus,
};
pub use port::OrchestratorPort;
