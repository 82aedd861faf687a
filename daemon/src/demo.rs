//! Reference `AsSap`/`EsmSap` implementations (§10.5).
//!
//! The access-stratum and ESM peers are external collaborators the core
//! only calls into; a deployment behind a real radio stack supplies its
//! own. These log-backed, in-memory stand-ins let the daemon run
//! end-to-end for demonstration and integration testing.

use async_trait::async_trait;
use log::info;

use emm_attach::context::UeId;
use emm_attach::sap::{
    AsSap, EsmContainer, EsmSap, EsmStatus, EstablishConfirm, EstablishReject, RegEvent, RegSink,
};

/// Logs every `EMMAS_ESTABLISH_CNF`/`_REJ` it receives.
#[derive(Default)]
pub struct LoggingAsSap;

#[async_trait]
impl AsSap for LoggingAsSap {
    async fn establish_confirm(&self, msg: EstablishConfirm) {
        info!(
            "ATTACH ACCEPT for ue_id {} (new_guti={:?})",
            msg.ue_id, msg.new_guti
        );
    }

    async fn establish_reject(&self, msg: EstablishReject) {
        info!("ATTACH REJECT for ue_id {}: cause {:?}", msg.ue_id, msg.cause);
    }
}

/// Accepts every PDN connectivity request and bearer activation
/// unconditionally, echoing the ESM container back as the accept PDU.
pub struct AcceptingEsmSap;

#[async_trait]
impl EsmSap for AcceptingEsmSap {
    async fn pdn_connectivity_request(
        &self,
        ue_id: UeId,
        esm_container: EsmContainer,
    ) -> (EsmStatus, Option<EsmContainer>) {
        info!("PDN connectivity request for ue_id {ue_id}");
        (EsmStatus::Success, Some(esm_container))
    }

    async fn pdn_connectivity_reject(&self, ue_id: UeId) {
        info!("PDN connectivity abandoned for ue_id {ue_id}");
    }

    async fn default_bearer_activate_confirm(
        &self,
        ue_id: UeId,
        _esm_container: EsmContainer,
    ) -> EsmStatus {
        info!("default bearer activated for ue_id {ue_id}");
        EsmStatus::Success
    }
}

/// Logs `EMMREG_*` signals at debug level; used when no richer observer
/// (e.g. a correlation table keyed by lower-layer UE-ID) is wired up.
pub struct LoggingRegSink;

impl RegSink for LoggingRegSink {
    fn notify(&self, ue_id: UeId, event: RegEvent) {
        log::debug!("registration event for ue_id {ue_id}: {event:?}");
    }
}
