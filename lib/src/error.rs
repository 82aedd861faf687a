//! Internal fault taxonomy (§7, §10.2): distinct from [`crate::cause::EmmCause`],
//! which is the protocol-visible cause sent to the UE. `EngineError` is
//! never sent over the air; it is logged and, for fatal per-UE
//! inconsistencies, converted into the context-release path.

use thiserror::Error;

use crate::context::UeId;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("ue_id {0} out of admissible range")]
    IllegalUeId(UeId),

    #[error("no mnc length found for mcc {0}")]
    UnknownMncLength(String),

    #[error("esm failure for ue_id {0} with no esm reject pdu attached")]
    MissingEsmRejectPdu(UeId),

    #[error("attach retransmission buffer missing for ue_id {0}")]
    MissingRetransmissionBuffer(UeId),
}
