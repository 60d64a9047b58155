use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::db::{DbFund, LedgerDb};
use crate::error::ServiceError;
use crate::services::funds::get_fund;
use crate::types::{GstConfig, PayableStatus, PaymentType};
use crate::util::apply_bps;

/// Totals for one calendar month (`YYYY-MM`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GstMonth {
    pub month: String,
    pub monthly_collections: i64,
    pub withdrawal_collections: i64,
    pub payouts: i64,
    /// Taxable value.
    pub commission: i64,
    pub gst: i64,
    pub cgst: i64,
    pub sgst: i64,
}

impl GstMonth {
    fn new(month: String) -> Self {
        GstMonth {
            month,
            ..Default::default()
        }
    }

    fn apply_tax(&mut self, rate_bps: u32) {
        self.gst = apply_bps(self.commission, rate_bps);
        let (cgst, sgst) = split_gst(self.gst);
        self.cgst = cgst;
        self.sgst = sgst;
    }

    fn add(&mut self, other: &GstMonth) -> Result<(), ServiceError> {
        accumulate(&mut self.monthly_collections, other.monthly_collections, "collections")?;
        accumulate(
            &mut self.withdrawal_collections,
            other.withdrawal_collections,
            "collections",
        )?;
        accumulate(&mut self.payouts, other.payouts, "payouts")?;
        accumulate(&mut self.commission, other.commission, "commission")?;
        accumulate(&mut self.gst, other.gst, "gst")?;
        accumulate(&mut self.cgst, other.cgst, "gst")?;
        accumulate(&mut self.sgst, other.sgst, "gst")
    }
}

fn accumulate(total: &mut i64, value: i64, what: &'static str) -> Result<(), ServiceError> {
    *total = total
        .checked_add(value)
        .ok_or(ServiceError::Overflow(what))?;
    Ok(())
}

fn checked_sum(
    values: impl IntoIterator<Item = i64>,
    what: &'static str,
) -> Result<i64, ServiceError> {
    values.into_iter().try_fold(0_i64, |acc, v| {
        acc.checked_add(v).ok_or(ServiceError::Overflow(what))
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GstSummary {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub rate_bps: u32,
    pub months: Vec<GstMonth>,
    pub totals: GstMonth,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FundSummary {
    pub fund: DbFund,
    pub member_count: usize,
    pub withdrawn_count: usize,
    pub total_collected: i64,
    pub total_payouts: i64,
    pub pending_payable_count: usize,
    pub pending_payable_amount: i64,
    pub commission_earned: i64,
}

/// CGST and SGST halves; SGST takes the odd unit.
pub fn split_gst(gst: i64) -> (i64, i64) {
    let cgst = gst / 2;
    (cgst, gst - cgst)
}

fn month_key(date: &str) -> String {
    date.chars().take(7).collect()
}

/// Collections, payouts and GST on commission for `[from, to]`, by month.
///
/// GST is computed per month on that month's commission; the totals row
/// sums the monthly figures.
pub fn gst_summary(
    db: &LedgerDb,
    gst: &GstConfig,
    from: NaiveDate,
    to: NaiveDate,
) -> Result<GstSummary, ServiceError> {
    if from > to {
        return Err(ServiceError::Validation(format!(
            "report start {from} is after its end {to}"
        )));
    }

    let mut months: BTreeMap<String, GstMonth> = BTreeMap::new();

    for payment in db.list_payments_between(from, to)? {
        let key = payment.payment_date.format("%Y-%m").to_string();
        let row = months
            .entry(key.clone())
            .or_insert_with(|| GstMonth::new(key));
        match payment.payment_type {
            PaymentType::Monthly => {
                accumulate(&mut row.monthly_collections, payment.amount, "collections")?
            }
            PaymentType::Withdrawal => {
                accumulate(&mut row.withdrawal_collections, payment.amount, "collections")?
            }
        }
    }

    for payable in db.list_payables_between(from, to)? {
        let key = month_key(&payable.created_at);
        let row = months
            .entry(key.clone())
            .or_insert_with(|| GstMonth::new(key));
        accumulate(&mut row.payouts, payable.amount, "payouts")?;
        accumulate(&mut row.commission, payable.commission, "commission")?;
    }

    let mut totals = GstMonth::new("total".to_string());
    let months = months
        .into_values()
        .map(|mut m| {
            m.apply_tax(gst.rate_bps);
            totals.add(&m)?;
            Ok(m)
        })
        .collect::<Result<Vec<GstMonth>, ServiceError>>()?;

    Ok(GstSummary {
        from,
        to,
        rate_bps: gst.rate_bps,
        months,
        totals,
    })
}

pub fn fund_summary(db: &LedgerDb, fund_id: &str) -> Result<FundSummary, ServiceError> {
    let fund = get_fund(db, fund_id)?;
    let members = db.list_fund_members(&fund.id)?;
    let payments = db.list_fund_payments(&fund.id)?;
    let payables = db.list_payables(Some(&fund.id))?;

    let pending: Vec<_> = payables
        .iter()
        .filter(|p| p.status == PayableStatus::Pending)
        .collect();

    Ok(FundSummary {
        member_count: members.len(),
        withdrawn_count: members.iter().filter(|m| m.is_withdrawn).count(),
        total_collected: checked_sum(payments.iter().map(|p| p.amount), "collections")?,
        total_payouts: checked_sum(payables.iter().map(|p| p.amount), "payouts")?,
        pending_payable_count: pending.len(),
        pending_payable_amount: checked_sum(pending.iter().map(|p| p.amount), "payouts")?,
        commission_earned: checked_sum(payables.iter().map(|p| p.commission), "commission")?,
        fund,
    })
}
