//! Shared fixtures for the wizard integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use service_wizard::auth::{AuthContext, ReturnTarget};
use service_wizard::registry::{FormDefinition, FormRegistry};
use service_wizard::resume::{MemoryStorage, ResumeStore};
use service_wizard::submission::{SinkError, SinkReceipt, SubmissionPayload, SubmissionSink};
use service_wizard::wizard::{MountOutcome, Wizard, WizardDeps};
use url::Url;
use wizard_types::Attachment;

pub fn init() {
    service_wizard::telemetry::init_tracing("warn,service_wizard=debug");
}

pub fn forms_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("forms")
}

pub fn form(identity: &str) -> Arc<FormDefinition> {
    let registry = FormRegistry::load_from_dir(&forms_dir()).expect("bundled forms load");
    registry.get(identity).expect("bundled form exists")
}

// ── Auth ───────────────────────────────────────────────────────

/// Session flag the test flips to simulate login
pub struct SwitchAuth {
    signed_in: AtomicBool,
}

impl SwitchAuth {
    pub fn new(signed_in: bool) -> Arc<Self> {
        Arc::new(Self {
            signed_in: AtomicBool::new(signed_in),
        })
    }

    pub fn sign_in(&self) {
        self.signed_in.store(true, Ordering::SeqCst);
    }

    pub fn sign_out(&self) {
        self.signed_in.store(false, Ordering::SeqCst);
    }
}

impl AuthContext for SwitchAuth {
    fn is_authenticated(&self) -> bool {
        self.signed_in.load(Ordering::SeqCst)
    }

    fn login_redirect(&self, target: &ReturnTarget) -> Url {
        target.apply_to(&Url::parse("https://portal.test/login").expect("login url"))
    }

    fn session_token(&self) -> Option<String> {
        self.is_authenticated().then(|| "session-token".to_string())
    }
}

// ── Sink ───────────────────────────────────────────────────────

/// Records every payload and answers with a fixed result
pub struct RecordingSink {
    calls: AtomicUsize,
    payloads: Mutex<Vec<SubmissionPayload>>,
    result: Result<SinkReceipt, SinkError>,
}

impl RecordingSink {
    pub fn accepting(reference_id: &str) -> Arc<Self> {
        Self::answering(Ok(SinkReceipt {
            reference_id: reference_id.to_string(),
        }))
    }

    pub fn answering(result: Result<SinkReceipt, SinkError>) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            payloads: Mutex::new(Vec::new()),
            result,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_payload(&self) -> Option<SubmissionPayload> {
        self.payloads.lock().expect("payload lock").last().cloned()
    }
}

#[async_trait]
impl SubmissionSink for RecordingSink {
    async fn submit(&self, payload: SubmissionPayload) -> Result<SinkReceipt, SinkError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().expect("payload lock").push(payload);
        self.result.clone()
    }
}

// ── Browsing scope ─────────────────────────────────────────────

/// One browser tab: storage survives re-mounts, as it survives a login
/// redirect
pub struct Tab {
    pub auth: Arc<SwitchAuth>,
    pub storage: Arc<MemoryStorage>,
    pub sink: Arc<RecordingSink>,
}

impl Tab {
    pub fn new(signed_in: bool, sink: Arc<RecordingSink>) -> Self {
        Self {
            auth: SwitchAuth::new(signed_in),
            storage: Arc::new(MemoryStorage::new()),
            sink,
        }
    }

    pub fn resume_store(&self) -> ResumeStore {
        ResumeStore::new(self.storage.clone())
    }

    pub fn mount(&self, identity: &str) -> (Wizard, MountOutcome) {
        let deps = WizardDeps::new(self.auth.clone(), self.resume_store(), self.sink.clone());
        Wizard::mount(form(identity), deps).expect("mount")
    }
}

// ── Form data ──────────────────────────────────────────────────

pub fn pdf(name: &str) -> Attachment {
    Attachment::new(name, "application/pdf", b"%PDF-1.7 test".to_vec())
}

pub fn fill_itr_personal(wizard: &mut Wizard) {
    wizard.change_field("full_name", "Meera Iyer");
    wizard.change_field("pan_number", "abcde1234f");
    wizard.change_field("mobile", "98765 43210");
    wizard.change_field("email", "meera@example.in");
}

pub fn fill_itr_income(wizard: &mut Wizard) {
    wizard.change_field("assessment_year", "2024-25");
    wizard.change_field("employer_name", "Acme Analytics");
    wizard.change_field("annual_income", "12,50,000");
    wizard.attach_document("form16", pdf("form16.pdf"));
}

pub fn fill_itr_bank(wizard: &mut Wizard) {
    wizard.change_field("bank_account_number", "001234567890");
    wizard.change_field("ifsc_code", "HDFC0001234");
    wizard.change_field("declaration", true);
}
