//! Document service: build → validate → persist → notify.
//!
//! Every submission walks the same stages. Validation and persistence
//! failures are terminal outcomes, not errors: they produce a failure
//! response and a notification exactly like success produces `OK`. The
//! notification is dispatched after the terminal state is decided and the
//! response never waits on its delivery.

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use tabreport_document::{DocumentValidator, build_document, render};
use tabreport_shared::{WebhookNotification, WireRequest, WireResponse, WireStatus};
use tabreport_storage::Storage;

use crate::notify::Notifier;

/// The state machine behind the wire server.
pub struct DocumentService {
    storage: Arc<Storage>,
    validator: DocumentValidator,
    notifier: Notifier,
}

impl DocumentService {
    pub fn new(storage: Arc<Storage>, validator: DocumentValidator, notifier: Notifier) -> Self {
        Self {
            storage,
            validator,
            notifier,
        }
    }

    /// Process one submission to its terminal state.
    #[instrument(skip(self, request), fields(id = %request.id_requisicao))]
    pub async fn process(&self, request: WireRequest) -> WireResponse {
        debug!(records = request.dados.len(), "submission received");

        let document = build_document(
            &request.dados,
            &request.mapper_version,
            &request.id_requisicao,
        );

        let rendered = match render(&document) {
            Ok(rendered) => rendered,
            Err(e) => {
                warn!(error = %e, "document failed to render");
                return self.finish(
                    &request,
                    WireResponse::failure(WireStatus::ValidationFailed, e.to_string()),
                );
            }
        };
        debug!(bytes = rendered.len(), "document built");

        if let Err(e) = self.validator.validate(&rendered) {
            warn!(error = %e, "document failed validation");
            return self.finish(
                &request,
                WireResponse::failure(WireStatus::ValidationFailed, e.to_string()),
            );
        }
        debug!("document validated");

        let response = match self
            .storage
            .insert_document(
                &rendered,
                &request.mapper_version,
                &request.id_requisicao,
                WireStatus::Ok.to_string().as_str(),
            )
            .await
        {
            Ok(id) => {
                info!(document_id = id, "document persisted");
                WireResponse::ok(id)
            }
            Err(e) => {
                warn!(error = %e, "document failed to persist");
                WireResponse::failure(WireStatus::PersistenceFailed, e.to_string())
            }
        };

        self.finish(&request, response)
    }

    /// Dispatch the terminal-status notification and hand back the response.
    fn finish(&self, request: &WireRequest, response: WireResponse) -> WireResponse {
        self.notifier.dispatch(
            request.webhook_url.clone(),
            WebhookNotification {
                id_requisicao: request.id_requisicao.clone(),
                status: response.status,
                documento_id: response.document_id.unwrap_or(0),
            },
        );
        response
    }
}
