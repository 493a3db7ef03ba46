mod batcher;
mod labels;

pub use batcher::{BatchReport, Batcher, BatcherError, DEFAULT_BATCH_INTERVAL};
pub use labels::{is_equal_label, label_set_hash};

use crate::profilestorepb::profile_store_service_client::ProfileStoreServiceClient;
use crate::profilestorepb::{WriteRawRequest, WriteRawResponse};
use tonic::transport::Channel;
use tonic::Status;

/// ProfileStoreWriter is anything profiles can be written to with the
/// `WriteRaw` semantics: the remote profile store, or the local batcher
/// sitting in front of it.
///
/// The request is borrowed so a caller can keep it when the write fails.
/// Sample payloads are `Bytes`, so implementations that need an owned copy
/// only clone labels and reference counts.
#[tonic::async_trait]
pub trait ProfileStoreWriter: Send + Sync {
    async fn write_raw(&self, request: &WriteRawRequest) -> Result<WriteRawResponse, Status>;
}

#[tonic::async_trait]
impl ProfileStoreWriter for ProfileStoreServiceClient<Channel> {
    async fn write_raw(&self, request: &WriteRawRequest) -> Result<WriteRawResponse, Status> {
        // Channel clones share the underlying connection.
        let mut client = self.clone();
        let response = ProfileStoreServiceClient::write_raw(&mut client, request.clone()).await?;
        Ok(response.into_inner())
    }
}
