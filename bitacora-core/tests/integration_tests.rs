//! Integration tests for bitacora-core services
//!
//! These tests drive the public services end to end against a real DuckDB
//! file in a temporary directory.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::io::Cursor;

use base64::Engine;
use chrono::{Duration, Utc};
use image::{ImageFormat, Rgba, RgbaImage};
use rust_decimal::Decimal;
use tempfile::TempDir;
use uuid::Uuid;

use bitacora_core::domain::{AssetKind, Question, SignatureLinks};
use bitacora_core::ports::Repository;
use bitacora_core::services::{opening_in, EntryPoint, NewClient};
use bitacora_core::{
    Answers, BalancePool, BitacoraContext, Client, Error, NewServiceLog, Pricing, Role, Signature,
};

// ============================================================================
// Test Helpers
// ============================================================================

fn png_base64(img: &RgbaImage) -> String {
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("Failed to encode PNG");
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// A transparent canvas with a diagonal stroke
fn signature_png() -> String {
    let mut img = RgbaImage::new(32, 16);
    for x in 0..16 {
        img.put_pixel(x + 8, x / 2 + 4, Rgba([0, 0, 0, 255]));
    }
    png_base64(&img)
}

/// A fully transparent canvas
fn blank_png() -> String {
    png_base64(&RgbaImage::new(32, 16))
}

/// Everything a service log needs, created through the public services
struct World {
    _dir: TempDir,
    ctx: BitacoraContext,
    client: Client,
    technician_id: Uuid,
    admin_id: Uuid,
    equipment_id: Uuid,
    system_id: Uuid,
    questions: Vec<Question>,
}

fn world() -> World {
    let dir = TempDir::new().unwrap();
    let ctx = BitacoraContext::new(dir.path(), EntryPoint::Service).expect("Failed to open context");

    ctx.pricing
        .update(Pricing {
            price_per_individual_hour: Decimal::from(100),
            price_per_package_hour: Decimal::from(80),
            commission_percent: Decimal::from(15),
        })
        .unwrap();

    let mut opening = opening_in(BalancePool::Individual, 10, Decimal::from(1000));
    opening.apply(BalancePool::Package, 5, Decimal::from(500));
    let client = ctx
        .directory_service
        .create_client(NewClient {
            company_name: "Acme S.A.".to_string(),
            tax_id: "30-71234567-8".to_string(),
            contact_email: Some("it@acme.example".to_string()),
            opening,
            ..Default::default()
        })
        .unwrap();

    let directory = &ctx.directory_service;
    let technician_id = directory
        .create_user("Ana", "ana@example.com", Role::Technician)
        .unwrap()
        .id;
    let admin_id = directory.create_user("Root", "root@example.com", Role::Admin).unwrap().id;
    let equipment_id = directory
        .create_asset(AssetKind::Equipment, "Core switch", Some(client.id))
        .unwrap()
        .id;
    let system_id = directory.create_asset(AssetKind::System, "ERP", None).unwrap().id;

    let survey = directory.create_survey("Post-service satisfaction").unwrap();
    let questions = ["Punctuality", "Solution", "Friendliness", "Cleanliness", "Overall"]
        .iter()
        .map(|text| directory.add_question(survey.id, text, None).unwrap())
        .collect();

    World {
        _dir: dir,
        ctx,
        client,
        technician_id,
        admin_id,
        equipment_id,
        system_id,
        questions,
    }
}

fn new_log(w: &World, ticket: &str, mode: &str, hours: u32) -> NewServiceLog {
    let arrival = Utc::now() - Duration::hours(4);
    NewServiceLog {
        ticket_number: ticket.to_string(),
        client_id: w.client.id,
        technician_id: w.technician_id,
        scheduled_arrival: arrival,
        scheduled_departure: arrival + Duration::hours(hours as i64),
        actual_arrival: Some(arrival + Duration::minutes(5)),
        actual_departure: Some(arrival + Duration::hours(hours as i64)),
        billing_mode: mode.to_string(),
        hours,
        description: "Preventive maintenance".to_string(),
        equipment_id: Some(w.equipment_id),
        system_id: None,
        technician_signature: Some(signature_png()),
    }
}

fn answers(questions: &[Question], values: &[u8]) -> Answers {
    questions.iter().map(|q| q.id).zip(values.iter().copied()).collect()
}

fn token_of(url: &str) -> &str {
    url.rsplit('/').next().unwrap()
}

// ============================================================================
// Full lifecycle
// ============================================================================

#[test]
fn test_full_service_log_lifecycle() {
    let w = world();
    let ctx = &w.ctx;

    let log = ctx
        .service_log_service
        .create(new_log(&w, "TK-0001", "Individual", 2))
        .unwrap();
    assert_eq!(log.amount, Decimal::from(230));

    let balances = ctx.ledger_service.balance(w.client.id).unwrap();
    assert_eq!(balances.individual_hours, 8);
    assert_eq!(balances.individual_money, Decimal::from(770));
    assert_eq!(balances.package_hours, 5);
    assert_eq!(balances.package_money, Decimal::from(500));

    // Client signs remotely
    let link = ctx.signature_service.create_remote_link(Some(log.id)).unwrap();
    let validation = ctx.signature_service.validate_token(token_of(&link.url)).unwrap();
    assert!(validation.valid);
    let signed = ctx.signature_service.finalize(validation.signature_id, &signature_png()).unwrap();
    assert!(signed.used);

    let stored = ctx.service_log_service.get(log.id).unwrap();
    assert_eq!(stored.client_signature_id, Some(signed.id));

    // Client grades the visit
    let grade = ctx
        .survey_service
        .submit_grade(log.id, &answers(&w.questions, &[5, 5, 5, 5, 4]))
        .unwrap();
    assert_eq!(grade.grade, 10);
    assert_eq!(ctx.service_log_service.get(log.id).unwrap().grade, Some(10));

    let verification = ctx.ledger_service.verify(w.client.id).unwrap();
    assert!(verification.is_valid());
    assert_eq!(verification.entries, 3);

    let doctor = ctx.doctor_service.run_checks().unwrap();
    assert_eq!(doctor.summary.errors, 0);
}

#[test]
fn test_package_mode_debits_package_pool() {
    let w = world();
    let log = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0002", "Package", 1))
        .unwrap();

    // 1 * (80 + 80 * 15%) = 92
    assert_eq!(log.amount, Decimal::from(92));
    let balances = w.ctx.ledger_service.balance(w.client.id).unwrap();
    assert_eq!(balances.package_hours, 4);
    assert_eq!(balances.package_money, Decimal::from(408));
    assert_eq!(balances.individual_hours, 10);
    assert_eq!(balances.individual_money, Decimal::from(1000));
}

#[test]
fn test_over_consumption_goes_negative() {
    let w = world();
    w.ctx
        .service_log_service
        .create(new_log(&w, "TK-0003", "Individual", 12))
        .unwrap();

    let balances = w.ctx.ledger_service.balance(w.client.id).unwrap();
    assert_eq!(balances.individual_hours, -2);
    assert_eq!(balances.individual_money, Decimal::from(-380));
    assert!(w.ctx.ledger_service.verify(w.client.id).unwrap().is_valid());
}

// ============================================================================
// Service log validation
// ============================================================================

#[test]
fn test_missing_technician_signature_is_unauthorized() {
    let w = world();
    let mut input = new_log(&w, "TK-0100", "Individual", 2);
    input.technician_signature = None;

    let err = w.ctx.service_log_service.create(input).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
    assert_eq!(w.ctx.ledger_service.entries(w.client.id).unwrap().len(), 2);
}

#[test]
fn test_asset_reference_must_be_exactly_one() {
    let w = world();

    let mut both = new_log(&w, "TK-0101", "Individual", 2);
    both.system_id = Some(w.system_id);
    assert!(matches!(
        w.ctx.service_log_service.create(both),
        Err(Error::InvalidArgument(_))
    ));

    let mut neither = new_log(&w, "TK-0102", "Individual", 2);
    neither.equipment_id = None;
    assert!(matches!(
        w.ctx.service_log_service.create(neither),
        Err(Error::InvalidArgument(_))
    ));

    // A system reference alone is fine
    let mut system_only = new_log(&w, "TK-0103", "Individual", 1);
    system_only.equipment_id = None;
    system_only.system_id = Some(w.system_id);
    w.ctx.service_log_service.create(system_only).unwrap();
}

#[test]
fn test_inactive_asset_is_unauthorized() {
    let w = world();
    w.ctx
        .directory_service
        .set_asset_active(AssetKind::Equipment, w.equipment_id, false)
        .unwrap();

    let err = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0104", "Individual", 2))
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
}

#[test]
fn test_blank_technician_signature_is_invalid() {
    let w = world();
    let mut input = new_log(&w, "TK-0105", "Individual", 2);
    input.technician_signature = Some(blank_png());

    let err = w.ctx.service_log_service.create(input).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
}

#[test]
fn test_duplicate_ticket_leaves_balances_untouched() {
    let w = world();
    w.ctx
        .service_log_service
        .create(new_log(&w, "TK-0200", "Individual", 2))
        .unwrap();
    let before = w.ctx.ledger_service.balance(w.client.id).unwrap();

    let err = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0200", "Package", 3))
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    assert_eq!(w.ctx.ledger_service.balance(w.client.id).unwrap(), before);
    assert_eq!(w.ctx.ledger_service.entries(w.client.id).unwrap().len(), 3);
    assert_eq!(w.ctx.service_log_service.list(Some(w.client.id)).unwrap().len(), 1);
}

#[test]
fn test_admin_delete_keeps_debit() {
    let w = world();
    let log = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0300", "Individual", 2))
        .unwrap();

    let err = w.ctx.service_log_service.delete(log.id, w.technician_id).unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    w.ctx.service_log_service.delete(log.id, w.admin_id).unwrap();
    assert!(w.ctx.service_log_service.list(None).unwrap().is_empty());
    assert_eq!(
        w.ctx.ledger_service.balance(w.client.id).unwrap().individual_money,
        Decimal::from(770)
    );
}

// ============================================================================
// Signature workflow
// ============================================================================

#[test]
fn test_validate_is_idempotent_for_fresh_links() {
    let w = world();
    let link = w.ctx.signature_service.create_remote_link(None).unwrap();

    for _ in 0..3 {
        let validation = w.ctx.signature_service.validate_token(token_of(&link.url)).unwrap();
        assert!(validation.valid);
        assert!(!validation.regenerated);
        assert_eq!(validation.signature_id, link.id);
    }
    assert!(!w.ctx.repository.get_signature(link.id).unwrap().unwrap().used);
}

#[test]
fn test_expired_link_is_regenerated_once() {
    let w = world();
    let log = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0400", "Individual", 2))
        .unwrap();

    let links = SignatureLinks::new(&w.ctx.config.base_url).unwrap();
    let mut stale = Signature::remote(&links, Some(log.id));
    stale.created_at = Utc::now() - Duration::hours(3);
    w.ctx.repository.insert_signature(&stale).unwrap();

    let outcome = w.ctx.signature_service.validate_token(&stale.token).unwrap();
    assert!(!outcome.valid);
    assert!(outcome.regenerated);
    let new_url = outcome.new_url.clone().unwrap();
    assert!(new_url.contains("/firmar/"));
    assert_ne!(token_of(&new_url), stale.token);

    // The old token is gone for good
    let again = w.ctx.signature_service.validate_token(&stale.token);
    assert!(matches!(again, Err(Error::NotFound(_))));

    // The replacement keeps the owner and can be finalized
    let replacement = w.ctx.repository.get_signature(outcome.signature_id).unwrap().unwrap();
    assert_eq!(replacement.service_log_id, Some(log.id));
    w.ctx
        .signature_service
        .finalize(outcome.signature_id, &signature_png())
        .unwrap();
    assert_eq!(
        w.ctx.service_log_service.get(log.id).unwrap().client_signature_id,
        Some(outcome.signature_id)
    );

    // Burned draft cannot be finalized either
    let burned = w.ctx.signature_service.finalize(stale.id, &signature_png());
    assert!(matches!(burned, Err(Error::Conflict(_))));
}

#[test]
fn test_finalize_rejects_bad_images_before_lookup() {
    let w = world();
    let link = w.ctx.signature_service.create_remote_link(None).unwrap();

    for bad in ["", "not base64 at all!", "aGVsbG8gd29ybGQ=", blank_png().as_str()] {
        let err = w.ctx.signature_service.finalize(link.id, bad).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)), "accepted {:?}", bad);
    }
    // Image check comes before existence
    let err = w.ctx.signature_service.finalize(Uuid::new_v4(), "").unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));

    assert!(w.ctx.repository.get_signature(link.id).unwrap().unwrap().image.is_none());
}

// ============================================================================
// Survey scoring
// ============================================================================

#[test]
fn test_grade_scenarios() {
    let w = world();
    let log = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0500", "Individual", 1))
        .unwrap();

    let partial = w
        .ctx
        .survey_service
        .submit_grade(log.id, &answers(&w.questions[..3], &[1, 2, 3]));
    assert!(matches!(partial, Err(Error::InvalidArgument(_))));

    // mean 2.0 -> 4
    let grade = w
        .ctx
        .survey_service
        .submit_grade(log.id, &answers(&w.questions, &[1, 2, 3, 2, 2]))
        .unwrap();
    assert_eq!(grade.grade, 4);
    assert_eq!(grade.mean, Decimal::from(2));

    let again = w
        .ctx
        .survey_service
        .submit_grade(log.id, &answers(&w.questions, &[5, 5, 5, 5, 5]));
    assert!(matches!(again, Err(Error::Conflict(_))));
}

// ============================================================================
// Pricing and persistence
// ============================================================================

#[test]
fn test_pricing_cache_serves_snapshot_until_invalidated() {
    let w = world();
    let before = w.ctx.pricing.snapshot().unwrap();

    // Changed directly in storage, bypassing the provider
    let mut raised = before.pricing.clone();
    raised.price_per_individual_hour = Decimal::from(150);
    w.ctx.repository.save_pricing(&raised).unwrap();

    let log = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0600", "Individual", 1))
        .unwrap();
    assert_eq!(log.amount, Decimal::from(115));

    w.ctx.pricing.invalidate();
    let log = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0601", "Individual", 1))
        .unwrap();
    assert_eq!(log.amount, Decimal::new(1725, 1));

    // Stored amount is not re-priced later
    assert_eq!(
        w.ctx.service_log_service.list(Some(w.client.id)).unwrap().len(),
        2
    );
}

#[test]
fn test_fractional_pricing_charges_exactly_what_is_debited() {
    let w = world();
    w.ctx
        .pricing
        .update(Pricing {
            price_per_individual_hour: Decimal::from(100),
            price_per_package_hour: Decimal::new(80333333, 6), // 80.333333
            commission_percent: Decimal::new(125, 1),          // 12.5
        })
        .unwrap();

    let before = w.ctx.ledger_service.balance(w.client.id).unwrap();
    let log = w
        .ctx
        .service_log_service
        .create(new_log(&w, "TK-0650", "Package", 3))
        .unwrap();
    let after = w.ctx.ledger_service.balance(w.client.id).unwrap();

    // 3 * 90.374999625 = 271.124998875
    assert_eq!(log.amount, Decimal::new(271124999, 6));
    let stored = w.ctx.service_log_service.get(log.id).unwrap();
    assert_eq!(stored.amount, log.amount);
    assert_eq!(before.package_money - after.package_money, log.amount);
    assert_eq!(after.package_money, Decimal::new(228875001, 6));
    assert_eq!(before.package_hours - after.package_hours, 3);

    let entries = w.ctx.ledger_service.entries(w.client.id).unwrap();
    let debit = entries.iter().find(|e| e.reference_id == Some(log.id)).unwrap();
    assert_eq!(debit.money_delta, -log.amount);
    assert!(w.ctx.ledger_service.verify(w.client.id).unwrap().is_valid());
}

#[test]
fn test_data_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let client_id = {
        let ctx = BitacoraContext::new(dir.path(), EntryPoint::Service).unwrap();
        let client = ctx
            .directory_service
            .create_client(NewClient {
                company_name: "Globex".to_string(),
                tax_id: "GLX-1".to_string(),
                ..Default::default()
            })
            .unwrap();
        ctx.ledger_service
            .record_payment(client.id, BalancePool::Package, 10, Decimal::new(80050, 2))
            .unwrap();
        client.id
    };

    for _ in 0..3 {
        let ctx = BitacoraContext::new(dir.path(), EntryPoint::Service).unwrap();
        let balances = ctx.ledger_service.balance(client_id).unwrap();
        assert_eq!(balances.package_hours, 10);
        assert_eq!(balances.package_money, Decimal::new(80050, 2));
        assert!(ctx.ledger_service.verify(client_id).unwrap().is_valid());
    }
}
