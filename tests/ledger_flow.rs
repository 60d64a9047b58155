//! End-to-end flow through the command layer against an on-disk ledger.

use chrono::NaiveDate;

use chitbook_lib::commands;
use chitbook_lib::db::LedgerDb;
use chitbook_lib::error::ErrorType;
use chitbook_lib::services::funds::NewFund;
use chitbook_lib::services::payments::NewPayment;
use chitbook_lib::services::payouts::PayoutRequest;
use chitbook_lib::services::users::{self, NewUser};
use chitbook_lib::types::{Config, PayableStatus, PaymentMethod, PaymentType, Role};
use chitbook_lib::AppState;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn open_state(dir: &tempfile::TempDir) -> (AppState, String) {
    let db = LedgerDb::open_at(dir.path().join("chitbook.db")).expect("open ledger");
    let admin = users::bootstrap_admin(&db, "Owner", "owner@example.com").expect("admin");
    (AppState::with_db(Config::default(), Some(db)), admin.id)
}

fn monthly(member_id: &str, month: u32, amount: i64) -> NewPayment {
    NewPayment {
        fund_member_id: member_id.to_string(),
        amount,
        payment_date: date(2025, month, 5),
        payment_type: PaymentType::Monthly,
        month_number: month,
        payment_method: PaymentMethod::Cash,
        notes: None,
    }
}

#[test]
fn full_fund_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let (state, admin) = open_state(&dir);

    let agent = commands::create_user(
        &state,
        &admin,
        NewUser {
            name: "Collector".to_string(),
            email: "agent@example.com".to_string(),
            phone: None,
            role: Role::Agent,
        },
    )
    .unwrap();
    let asha = commands::register(&state, "Asha", "asha@example.com", None).unwrap();
    let bala = commands::register(&state, "Bala", "bala@example.com", None).unwrap();

    let fund = commands::create_fund(
        &state,
        &admin,
        NewFund {
            name: "Lakh 2025".to_string(),
            amount: 100_000,
            start_date: date(2025, 1, 1),
            base_commission: None,
            monthly_bonus: None,
        },
    )
    .unwrap();
    assert_eq!(fund.monthly_contribution, 5_000);

    let asha_m = commands::add_fund_member(&state, &admin, &fund.id, &asha.id, None).unwrap();
    let bala_m = commands::add_fund_member(&state, &admin, &fund.id, &bala.id, None).unwrap();

    for month in 1..=3 {
        commands::record_payment(&state, &agent.id, monthly(&asha_m.id, month, 5_000)).unwrap();
        commands::record_payment(&state, &agent.id, monthly(&bala_m.id, month, 5_000)).unwrap();
    }
    // A second receipt for the same month counts once toward months paid.
    commands::record_payment(&state, &agent.id, monthly(&asha_m.id, 3, 1_000)).unwrap();

    let history = commands::get_payment_history(&state, &asha.id, &asha_m.id).unwrap();
    assert_eq!(history.totals.months_paid, 3);
    assert_eq!(history.totals.paid_amount, 16_000);
    assert!(commands::get_payment_history(&state, &bala.id, &asha_m.id).is_err());

    // Withdrawing in month 6 with 3 months paid: 2 months late.
    let request = PayoutRequest {
        fund_member_id: asha_m.id.clone(),
        withdrawal_month: Some(6),
        commission: None,
    };
    let preview = commands::preview_payout(&state, &agent.id, request.clone()).unwrap();
    assert!(preview.payable);
    assert_eq!(preview.breakdown.penalty, 2_000);
    // 16,000 + 3 × 1,000 + (84,000 − 5,000) − 2,000
    assert_eq!(preview.breakdown.payout_amount, 96_000);

    let receipt = commands::process_payout(&state, &admin, request.clone()).unwrap();
    assert_eq!(receipt.payable.amount, 96_000);
    let again = commands::process_payout(&state, &admin, request).unwrap_err();
    assert_eq!(again.error_type, ErrorType::NonRetryable);

    let undo = commands::set_withdrawal_status(&state, &admin, &asha_m.id, false, None);
    assert!(undo.is_err());

    assert_eq!(commands::sync_receivables(&state, &admin).unwrap(), 7);
    assert_eq!(commands::sync_receivables(&state, &admin).unwrap(), 0);

    let paid = commands::mark_payable_paid(&state, &admin, &receipt.payable.id).unwrap();
    assert_eq!(paid.status, PayableStatus::Paid);

    let summary = commands::fund_summary(&state, &admin, &fund.id).unwrap();
    assert_eq!(summary.member_count, 2);
    assert_eq!(summary.withdrawn_count, 1);
    assert_eq!(summary.total_collected, 31_000);
    assert_eq!(summary.pending_payable_count, 0);
    assert_eq!(summary.commission_earned, 5_000);

    let today = chrono::Utc::now().date_naive();
    let gst = commands::gst_report(&state, &admin, date(2025, 1, 1), today).unwrap();
    assert_eq!(gst.totals.monthly_collections, 31_000);
    assert_eq!(gst.totals.gst, 900);
    assert_eq!(gst.totals.cgst, 450);
    assert_eq!(gst.totals.sgst, 450);

    let closed = commands::close_fund(&state, &admin, &fund.id).unwrap();
    assert!(commands::record_payment(&state, &agent.id, monthly(&bala_m.id, 4, 5_000)).is_err());
    assert!(commands::close_fund(&state, &admin, &closed.id).is_err());
}

#[test]
fn group_attach_splits_fund() {
    let dir = tempfile::tempdir().unwrap();
    let (state, admin) = open_state(&dir);

    let a = commands::register(&state, "Anil", "anil@example.com", None).unwrap();
    let b = commands::register(&state, "Bhavna", "bhavna@example.com", None).unwrap();
    let fund = commands::create_fund(
        &state,
        &admin,
        NewFund {
            name: "Two Lakh".to_string(),
            amount: 200_000,
            start_date: date(2025, 3, 1),
            base_commission: None,
            monthly_bonus: None,
        },
    )
    .unwrap();

    let group = commands::create_group(&state, &admin, "Rao Brothers", None).unwrap();
    commands::set_group_share(&state, &admin, &group.id, &a.id, 6_000).unwrap();
    let partial = commands::set_group_share(&state, &admin, &group.id, &b.id, 3_000).unwrap();
    assert!(!partial.complete);
    assert!(commands::attach_group_to_fund(&state, &admin, &group.id, &fund.id).is_err());

    commands::set_group_share(&state, &admin, &group.id, &b.id, 4_000).unwrap();
    let members = commands::attach_group_to_fund(&state, &admin, &group.id, &fund.id).unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(members[0].custom_fund_amount, Some(120_000));
    assert_eq!(members[1].custom_fund_amount, Some(80_000));
    assert_eq!(members[0].share_identifier.as_deref(), Some("rao-brothers-1"));

    let summary = commands::get_contribution_summary(&state, &a.id, &members[0].id).unwrap();
    assert_eq!(summary.plan.monthly_contribution, 6_000);

    // A member cannot manage groups.
    let err = commands::create_group(&state, &a.id, "Mine", None).unwrap_err();
    assert_eq!(err.error_type, ErrorType::RequiresUserAction);
}
