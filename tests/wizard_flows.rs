//! End-to-end wizard flows against the bundled form definitions.

mod common;

use common::{fill_itr_bank, fill_itr_income, fill_itr_personal, init, pdf, RecordingSink, Tab};
use service_wizard::auth::ReturnTarget;
use service_wizard::resume::SessionStorage;
use service_wizard::submission::SinkError;
use service_wizard::wizard::{AdvanceOutcome, MountOutcome, SubmitOutcome, WizardNotice};
use std::collections::BTreeMap;
use wizard_types::FieldValue;

#[test]
fn unauthenticated_user_is_sent_to_login_and_resumes_once() {
    init();
    let tab = Tab::new(false, RecordingSink::accepting("ITR-1"));

    let (mut wizard, outcome) = tab.mount("itr_filing");
    assert_eq!(outcome, MountOutcome::Fresh);
    fill_itr_personal(&mut wizard);

    let AdvanceOutcome::AuthRequired { resume_at, redirect } = wizard.advance().unwrap() else {
        panic!("expected a login redirect");
    };
    assert_eq!(resume_at, 2);
    assert_eq!(wizard.current_step(), 1);
    assert_eq!(
        ReturnTarget::from_url(&redirect),
        Some(ReturnTarget::new("/services/itr-filing", 2))
    );
    drop(wizard);

    // Back from login
    tab.auth.sign_in();
    let (resumed, outcome) = tab.mount("itr_filing");
    assert_eq!(
        outcome,
        MountOutcome::Resumed {
            step: 2,
            documents_to_reupload: vec!["form16".to_string()],
        }
    );
    assert_eq!(resumed.current_step(), 2);
    assert_eq!(resumed.value("pan_number"), Some(&FieldValue::text("abcde1234f")));
    drop(resumed);

    // Second reload starts fresh
    let (fresh, outcome) = tab.mount("itr_filing");
    assert_eq!(outcome, MountOutcome::Fresh);
    assert_eq!(fresh.current_step(), 1);
    assert!(fresh.fields().is_empty());
}

#[test]
fn invalid_step_is_never_left() {
    init();
    let tab = Tab::new(true, RecordingSink::accepting("ITR-2"));
    let (mut wizard, _) = tab.mount("itr_filing");

    wizard.change_field("full_name", "Meera Iyer");
    wizard.change_field("pan_number", "ABCDE12345");

    let AdvanceOutcome::Denied { step, errors } = wizard.advance().unwrap() else {
        panic!("expected the advance to be denied");
    };
    assert_eq!(step, 1);
    assert_eq!(errors["pan_number"], "Enter a valid PAN (e.g. ABCDE1234F)");
    assert!(errors.contains_key("mobile"));
    assert!(errors.contains_key("email"));
    assert!(!errors.contains_key("full_name"));
    assert_eq!(wizard.current_step(), 1);
}

#[tokio::test]
async fn submit_without_document_is_refused_before_any_call() {
    init();
    let sink = RecordingSink::accepting("ITR-3");
    let tab = Tab::new(true, sink.clone());
    let (mut wizard, _) = tab.mount("itr_filing");

    fill_itr_personal(&mut wizard);
    wizard.advance().unwrap();
    fill_itr_income(&mut wizard);
    wizard.advance().unwrap();
    fill_itr_bank(&mut wizard);

    let outcome = wizard.submit().await.unwrap();

    let SubmitOutcome::Refused {
        errors,
        missing_documents,
        first_invalid_step,
    } = outcome
    else {
        panic!("expected a refusal");
    };
    assert!(errors.is_empty());
    assert_eq!(missing_documents, vec!["bank_statement".to_string()]);
    assert_eq!(first_invalid_step, Some(3));
    assert_eq!(sink.calls(), 0);
    assert!(wizard
        .take_notices()
        .contains(&WizardNotice::MissingDocuments {
            documents: vec!["bank_statement".into()]
        }));
}

#[tokio::test]
async fn happy_path_submits_normalized_payload_once() {
    init();
    let sink = RecordingSink::accepting("ITR-2024-0001");
    let tab = Tab::new(true, sink.clone());
    let (mut wizard, _) = tab.mount("itr_filing");

    fill_itr_personal(&mut wizard);
    assert!(matches!(wizard.advance().unwrap(), AdvanceOutcome::Advanced { to: 2, .. }));
    fill_itr_income(&mut wizard);
    assert!(matches!(wizard.advance().unwrap(), AdvanceOutcome::Advanced { to: 3, .. }));
    fill_itr_bank(&mut wizard);
    wizard.attach_document("bank_statement", pdf("statement.pdf"));

    let outcome = wizard.submit().await.unwrap();

    assert_eq!(
        outcome,
        SubmitOutcome::Submitted {
            reference_id: "ITR-2024-0001".into()
        }
    );
    assert_eq!(sink.calls(), 1);

    let payload = sink.last_payload().unwrap();
    assert_eq!(payload.form_identity, "itr_filing");
    assert_eq!(payload.fields["pan_number"], "ABCDE1234F");
    assert_eq!(payload.fields["mobile"], "9876543210");
    assert_eq!(payload.session_token.as_deref(), Some("session-token"));
    let mut documents: Vec<&str> = payload.attachments.iter().map(|(n, _)| n.as_str()).collect();
    documents.sort();
    assert_eq!(documents, vec!["bank_statement", "form16"]);

    assert_eq!(wizard.current_step(), 1);
    assert!(wizard.fields().is_empty());
}

#[tokio::test]
async fn expired_session_at_submit_snapshots_last_step() {
    init();
    let sink = RecordingSink::accepting("ITR-4");
    let tab = Tab::new(true, sink.clone());
    let (mut wizard, _) = tab.mount("itr_filing");

    fill_itr_personal(&mut wizard);
    wizard.advance().unwrap();
    fill_itr_income(&mut wizard);
    wizard.advance().unwrap();
    fill_itr_bank(&mut wizard);
    wizard.attach_document("bank_statement", pdf("statement.pdf"));

    tab.auth.sign_out();
    let outcome = wizard.submit().await.unwrap();

    assert!(matches!(outcome, SubmitOutcome::AuthRequired { resume_at: 3, .. }));
    assert_eq!(sink.calls(), 0);
    assert!(tab.resume_store().has_snapshot("itr_filing").unwrap());
    drop(wizard);

    tab.auth.sign_in();
    let (restored, outcome) = tab.mount("itr_filing");
    assert_eq!(
        outcome,
        MountOutcome::Resumed {
            step: 3,
            documents_to_reupload: vec!["form16".to_string(), "bank_statement".to_string()],
        }
    );
    assert!(restored.value("form16").is_none());
    assert_eq!(restored.value("declaration"), Some(&FieldValue::Flag(true)));
    assert_eq!(restored.value("ifsc_code"), Some(&FieldValue::text("HDFC0001234")));
}

#[tokio::test]
async fn server_rejection_keeps_progress_for_retry() {
    init();
    let mut field_errors = BTreeMap::new();
    field_errors.insert("pan_number".to_string(), "PAN already has a return for this year".to_string());
    let sink = RecordingSink::answering(Err(SinkError::Rejected {
        message: "Validation failed".into(),
        field_errors,
    }));
    let tab = Tab::new(true, sink.clone());
    let (mut wizard, _) = tab.mount("itr_filing");

    fill_itr_personal(&mut wizard);
    wizard.advance().unwrap();
    fill_itr_income(&mut wizard);
    wizard.advance().unwrap();
    fill_itr_bank(&mut wizard);
    wizard.attach_document("bank_statement", pdf("statement.pdf"));

    let outcome = wizard.submit().await.unwrap();

    assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
    assert_eq!(wizard.current_step(), 3);
    assert_eq!(
        wizard.visible_errors()["pan_number"],
        "PAN already has a return for this year"
    );
    assert!(wizard.value("form16").is_some());
    assert!(wizard
        .take_notices()
        .iter()
        .any(|n| matches!(n, WizardNotice::SubmissionFailed { .. })));

    // A second press is a fresh, single call
    wizard.submit().await.unwrap();
    assert_eq!(sink.calls(), 2);
}

#[test]
fn tampered_snapshot_is_reported_and_cleared() {
    init();
    let tab = Tab::new(false, RecordingSink::accepting("X"));
    tab.storage
        .set("wizard.resume.pf_withdrawal", "{\"version\":1,\"garbage\":true}")
        .unwrap();

    tab.auth.sign_in();
    let (mut wizard, outcome) = tab.mount("pf_withdrawal");
    assert_eq!(outcome, MountOutcome::ResumeCorrupted);
    assert_eq!(wizard.current_step(), 1);
    assert_eq!(wizard.take_notices(), vec![WizardNotice::ResumeCorrupted]);
    assert!(!tab.resume_store().has_snapshot("pf_withdrawal").unwrap());
}
