//! EMM↔AS and EMM↔ESM coupling (C6, C7): the typed Service Access Point
//! boundaries to the AS and ESM peers, both treated as external collaborators.
//!
//! These are trait contracts only. The crate ships no production
//! implementation — a deployment supplies its own AS/ESM peers — but
//! `emm-attach-daemon` includes in-memory reference implementations for
//! demonstration and integration testing (see its `demo` module).

use async_trait::async_trait;

use crate::cause::EmmCause;
use crate::context::UeId;
use crate::identity::{Guti, Tai};
use crate::security::{Eea, Eia, Ksi};

pub type EsmContainer = Vec<u8>;

/// Outcome of an ESM SAP request, mirroring the EMM/ESM primitive confirm.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EsmStatus {
    Success,
    Discarded,
    Failure,
}

/// An `EMMAS_ESTABLISH_CNF` primitive: the accepted Attach, handed to the
/// access-stratum for delivery to the UE as ATTACH ACCEPT.
#[derive(Debug, Clone)]
pub struct EstablishConfirm {
    pub ue_id: UeId,
    pub old_guti: Option<Guti>,
    pub new_guti: Option<Guti>,
    pub tai: Option<Tai>,
    pub n_tacs: u8,
    pub selected_eea: Eea,
    pub selected_eia: Eia,
    pub ksi: Ksi,
    pub esm_container: EsmContainer,
}

/// An `EMMAS_ESTABLISH_REJ` primitive: ATTACH REJECT.
#[derive(Debug, Clone)]
pub struct EstablishReject {
    pub ue_id: UeId,
    pub cause: EmmCause,
    pub esm_container: Option<EsmContainer>,
}

/// EMM-to-AS coupling (C7).
#[async_trait]
pub trait AsSap: Send + Sync {
    async fn establish_confirm(&self, msg: EstablishConfirm);
    async fn establish_reject(&self, msg: EstablishReject);
}

/// EMM-to-ESM coupling (C6).
#[async_trait]
pub trait EsmSap: Send + Sync {
    /// `ESM_PDN_CONNECTIVITY_REQ` / `_CNF`. Returns the ESM status and,
    /// when the status is not `Discarded`, the ESM PDU to relay to the UE
    /// (an accept container on success, a reject container on failure).
    async fn pdn_connectivity_request(
        &self,
        ue_id: UeId,
        esm_container: EsmContainer,
    ) -> (EsmStatus, Option<EsmContainer>);

    /// `ESM_PDN_CONNECTIVITY_REJ`: notifies ESM that an in-progress
    /// connectivity request is being abandoned (T3450 exhaustion).
    async fn pdn_connectivity_reject(&self, ue_id: UeId);

    /// `ESM_DEFAULT_EPS_BEARER_CONTEXT_ACTIVATE_CNF`.
    async fn default_bearer_activate_confirm(
        &self,
        ue_id: UeId,
        esm_container: EsmContainer,
    ) -> EsmStatus;
}

/// `EMMREG_*` signals toward the registration-status observers of the
/// mobility-management layer (used by tests and operational status
/// reporting; not a wire primitive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegEvent {
    ProcAbort,
    AttachCnf,
    AttachRej,
    CommonProcReq,
}

pub trait RegSink: Send + Sync {
    fn notify(&self, ue_id: UeId, event: RegEvent);
}

/// A `RegSink` that drops every event. Used where no observer is wired up.
pub struct NullRegSink;

impl RegSink for NullRegSink {
    fn notify(&self, _ue_id: UeId, _event: RegEvent) {}
}
