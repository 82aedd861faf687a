//! End-to-end Attach procedure scenarios (engine-level), covering the
//! literal scenarios enumerated for the Attach state machine: clean attach,
//! duplicate suppression, parameter-change restart, GUTI-based rebinding,
//! emergency-attach policy, and T3450 retransmission exhaustion.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use emm_attach::attach::{AttachEngine, AttachRequest, AttachType};
use emm_attach::cause::EmmCause;
use emm_attach::config::Config;
use emm_attach::context::UeId;
use emm_attach::identity::Imsi;
use emm_attach::identity_provider::StaticIdentityProvider;
use emm_attach::sap::{
    AsSap, EsmContainer, EsmSap, EsmStatus, EstablishConfirm, EstablishReject, NullRegSink,
};
use emm_attach::security::{Ksi, UeCapabilities};

#[derive(Default)]
struct RecordingAsSap {
    confirms: Mutex<Vec<EstablishConfirm>>,
    rejects: Mutex<Vec<EstablishReject>>,
}

#[async_trait]
impl AsSap for RecordingAsSap {
    async fn establish_confirm(&self, msg: EstablishConfirm) {
        self.confirms.lock().unwrap().push(msg);
    }

    async fn establish_reject(&self, msg: EstablishReject) {
        self.rejects.lock().unwrap().push(msg);
    }
}

struct FakeEsmSap {
    connectivity_status: EsmStatus,
    activate_status: EsmStatus,
    reject_calls: Mutex<u32>,
}

impl FakeEsmSap {
    fn accepting() -> Self {
        FakeEsmSap {
            connectivity_status: EsmStatus::Success,
            activate_status: EsmStatus::Success,
            reject_calls: Mutex::new(0),
        }
    }
}

#[async_trait]
impl EsmSap for FakeEsmSap {
    async fn pdn_connectivity_request(
        &self,
        _ue_id: UeId,
        esm_container: EsmContainer,
    ) -> (EsmStatus, Option<EsmContainer>) {
        (self.connectivity_status, Some(esm_container))
    }

    async fn pdn_connectivity_reject(&self, _ue_id: UeId) {
        *self.reject_calls.lock().unwrap() += 1;
    }

    async fn default_bearer_activate_confirm(
        &self,
        _ue_id: UeId,
        _esm_container: EsmContainer,
    ) -> EsmStatus {
        self.activate_status
    }
}

fn test_engine(
    config: Config,
) -> (
    AttachEngine,
    tokio::sync::mpsc::Receiver<emm_attach::attach::T3450Expiry>,
    Arc<RecordingAsSap>,
    Arc<FakeEsmSap>,
) {
    let (tx, rx) = tokio::sync::mpsc::channel(16);
    let as_sap = Arc::new(RecordingAsSap::default());
    let esm_sap = Arc::new(FakeEsmSap::accepting());
    let engine = AttachEngine::new(
        config,
        tx,
        Arc::new(StaticIdentityProvider::default()),
        as_sap.clone(),
        esm_sap.clone(),
        Arc::new(NullRegSink),
    );
    (engine, rx, as_sap, esm_sap)
}

fn base_request(ue_id: UeId) -> AttachRequest {
    AttachRequest {
        ue_id,
        attach_type: AttachType::Eps,
        ksi: Ksi(0),
        guti: None,
        imsi: Some(Imsi("001010000000001".to_string())),
        imei: None,
        tai: None,
        caps: UeCapabilities {
            eea: 0xF0,
            ..Default::default()
        },
        esm_container: vec![1, 2, 3],
    }
}

#[tokio::test]
async fn scenario_1_clean_attach_then_complete() {
    let mut config = Config::default();
    config.timers.t3450_millis = 60_000;
    let (mut engine, _rx, as_sap, _esm) = test_engine(config);

    engine.on_attach_request(base_request(7)).await.unwrap();

    assert_eq!(as_sap.confirms.lock().unwrap().len(), 1);
    let confirm = as_sap.confirms.lock().unwrap()[0].clone();
    assert!(confirm.new_guti.is_some());
    assert_ne!(confirm.new_guti.unwrap().m_tmsi, 0);

    engine
        .on_attach_complete(7, vec![9, 9])
        .await
        .unwrap();

    assert_eq!(engine.fsm_status(7), Some(emm_attach::context::FsmStatus::Registered));
}

#[tokio::test]
async fn scenario_2_duplicate_request_is_idempotent() {
    let (mut engine, _rx, as_sap, _esm) = test_engine(Config::default());

    engine.on_attach_request(base_request(7)).await.unwrap();
    engine.on_attach_request(base_request(7)).await.unwrap();

    assert_eq!(as_sap.confirms.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn scenario_3_changed_capabilities_restart_the_procedure() {
    let (mut engine, _rx, as_sap, _esm) = test_engine(Config::default());

    engine.on_attach_request(base_request(7)).await.unwrap();

    let mut changed = base_request(7);
    changed.caps.eea = 0x70;
    engine.on_attach_request(changed).await.unwrap();

    let confirms = as_sap.confirms.lock().unwrap();
    assert_eq!(confirms.len(), 2);
    assert_eq!(confirms[1].selected_eea as u8, confirms[0].selected_eea as u8);
}

#[tokio::test]
async fn scenario_4_guti_reattach_rebinds_ueid() {
    let (mut engine, _rx, as_sap, _esm) = test_engine(Config::default());

    engine.on_attach_request(base_request(7)).await.unwrap();
    let guti = as_sap.confirms.lock().unwrap()[0].new_guti.unwrap();
    engine.on_attach_complete(7, vec![]).await.unwrap();

    let mut reattach = base_request(12);
    reattach.imsi = None;
    reattach.guti = Some(guti);
    engine.on_attach_request(reattach).await.unwrap();

    assert!(engine.fsm_status(7).is_none());
    assert!(engine.fsm_status(12).is_some());
}

#[tokio::test]
async fn scenario_5_emergency_attach_rejected_when_disabled() {
    let (mut engine, _rx, as_sap, _esm) = test_engine(Config::default());

    let mut req = base_request(7);
    req.attach_type = AttachType::Emergency;
    engine.on_attach_request(req).await.unwrap();

    let rejects = as_sap.rejects.lock().unwrap();
    assert_eq!(rejects.len(), 1);
    assert_eq!(rejects[0].cause, EmmCause::ImeiNotAccepted);
    assert_eq!(engine.context_count(), 0);
}

#[tokio::test]
async fn scenario_6_retransmission_exhaustion_aborts() {
    let mut config = Config::default();
    config.timers.t3450_millis = 10;
    let (mut engine, mut rx, as_sap, esm) = test_engine(config);

    engine.on_attach_request(base_request(7)).await.unwrap();

    for expected_retry in 1..=5u8 {
        let ev = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("timer should fire")
            .expect("channel should stay open");
        engine.on_t3450_expired(ev.0).await.unwrap();
        if expected_retry < 5 {
            assert_eq!(as_sap.confirms.lock().unwrap().len() as u8, expected_retry + 1);
        }
    }

    assert_eq!(*esm.reject_calls.lock().unwrap(), 1);
    assert_eq!(engine.context_count(), 0);
}
