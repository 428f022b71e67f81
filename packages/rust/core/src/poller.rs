//! Bucket monitoring loop.
//!
//! Strictly sequential: one object at a time, one submission per object.
//! Every failure is contained to its poll iteration; the loop itself only
//! stops with the process.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};
use uuid::Uuid;

use tabreport_bucket::BucketFifoManager;
use tabreport_shared::config::MapperConfig;
use tabreport_shared::{Result, WireRequest, WireStatus};
use tabreport_transform::RecordTransformer;
use tabreport_wire::WireClient;

/// The polling side of the pipeline.
pub struct Poller {
    fifo: Arc<BucketFifoManager>,
    transformer: RecordTransformer,
    wire: WireClient,
    mapper: MapperConfig,
    webhook_url: String,
    interval: Duration,
}

impl Poller {
    pub fn new(
        fifo: Arc<BucketFifoManager>,
        transformer: RecordTransformer,
        wire: WireClient,
        mapper: MapperConfig,
        webhook_url: String,
        interval: Duration,
    ) -> Self {
        Self {
            fifo,
            transformer,
            wire,
            mapper,
            webhook_url,
            interval,
        }
    }

    /// Poll forever at the configured interval.
    pub async fn run(&self) {
        info!(interval = ?self.interval, "bucket poller started");
        loop {
            self.poll_once().await;
            tokio::time::sleep(self.interval).await;
        }
    }

    /// One poll cycle. Object failures are logged and skipped; a failed
    /// object stays unconsumed and is retried on a later cycle.
    pub async fn poll_once(&self) {
        let names = match self.fifo.list_unconsumed().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "bucket listing failed");
                return;
            }
        };

        for name in names {
            if let Err(e) = self.process_object(&name).await {
                warn!(object = %name, error = %e, "object processing failed");
            }
        }
    }

    #[instrument(skip(self))]
    async fn process_object(&self, name: &str) -> Result<()> {
        info!(name, "processing object");
        self.fifo.enforce_capacity().await;

        let bytes = self.fifo.store().download(name).await?;
        let records = self.transformer.transform(&bytes).await?;
        info!(name, records = records.len(), "object transformed");

        let request = WireRequest {
            id_requisicao: Uuid::new_v4().to_string(),
            mapper: self.mapper.table.clone(),
            mapper_version: self.mapper.version.clone(),
            webhook_url: self.webhook_url.clone(),
            dados: records,
        };

        let response = self.wire.submit(&request).await?;
        match response.status {
            WireStatus::Ok => {
                info!(name, document_id = ?response.document_id, "object accepted");
                self.fifo.mark_consumed(name);
                self.fifo.enforce_capacity().await;
            }
            status => {
                warn!(
                    name,
                    %status,
                    error = ?response.error,
                    "submission rejected, object left unconsumed"
                );
            }
        }
        Ok(())
    }
}
