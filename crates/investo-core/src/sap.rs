//! SAP task classification and cost arithmetic.
//!
//! SAP returns cost and commitment line items per project, each tagged with
//! a composite task id (`Posid`). Items under the first sub-task belong to
//! planning work and are summed into the `project_task` buckets; everything
//! else, including items posted on the bare project id, is construction work
//! and goes to the `production_task` buckets.
//!
//! Two task id encodings exist:
//!
//! | Form | Example | Planning when |
//! |------|---------|---------------|
//! | dotted (legacy) | `2814I03976.01` | first segment after the id is `01` |
//! | fixed-width | `2814I0397600101` | first three digits after the id are `001` |
//!
//! All sums use `BigDecimal`.

use std::str::FromStr;
use std::sync::LazyLock;

use bigdecimal::{BigDecimal, Zero};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::defaults::{SAP_DATETIME_FORMAT, SAP_DECIMAL_SCALE};
use crate::error::{Error, Result};
use crate::models::SapCostScope;

static DOTTED_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\.(\d+)(?:\.|$)").expect("valid dotted suffix regex"));

static FIXED_WIDTH_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{3})\d*$").expect("valid fixed-width suffix regex"));

/// Bucket a line item is summed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskGroup {
    /// Planning work (first sub-task).
    ProjectTask,
    /// Construction and all other work.
    ProductionTask,
}

/// Classify a SAP task id belonging to project `sap_id`.
pub fn classify_task(sap_id: &str, posid: &str) -> TaskGroup {
    let Some(suffix) = posid.trim().strip_prefix(sap_id.trim()) else {
        return TaskGroup::ProductionTask;
    };

    if let Some(caps) = DOTTED_SUFFIX.captures(suffix) {
        return if &caps[1] == "01" {
            TaskGroup::ProjectTask
        } else {
            TaskGroup::ProductionTask
        };
    }

    if let Some(caps) = FIXED_WIDTH_SUFFIX.captures(suffix) {
        return if &caps[1] == "001" {
            TaskGroup::ProjectTask
        } else {
            TaskGroup::ProductionTask
        };
    }

    TaskGroup::ProductionTask
}

/// Parse a SAP amount string such as `"111.000"`.
pub fn parse_amount(raw: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(raw.trim()).ok()
}

/// Zero at the stored decimal scale.
pub fn zero_amount() -> BigDecimal {
    BigDecimal::zero().with_scale(SAP_DECIMAL_SCALE)
}

/// One cost or commitment line item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SapLineItem {
    pub posid: String,
    pub amount: BigDecimal,
}

impl SapLineItem {
    pub fn new(posid: impl Into<String>, amount: BigDecimal) -> Self {
        Self {
            posid: posid.into(),
            amount,
        }
    }
}

/// Result of one remote SAP call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SapFetch {
    Items(Vec<SapLineItem>),
    /// The remote answered with a non-success status; counts as zero.
    Failed { status: u16 },
}

impl SapFetch {
    pub fn items(&self) -> &[SapLineItem] {
        match self {
            SapFetch::Items(items) => items,
            SapFetch::Failed { .. } => &[],
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, SapFetch::Failed { .. })
    }
}

/// The four aggregate buckets of a SAP cost row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SapTotals {
    pub project_task_costs: BigDecimal,
    pub project_task_commitments: BigDecimal,
    pub production_task_costs: BigDecimal,
    pub production_task_commitments: BigDecimal,
}

impl Default for SapTotals {
    fn default() -> Self {
        Self::zero()
    }
}

impl SapTotals {
    pub fn zero() -> Self {
        Self {
            project_task_costs: zero_amount(),
            project_task_commitments: zero_amount(),
            production_task_costs: zero_amount(),
            production_task_commitments: zero_amount(),
        }
    }

    /// Field-wise sum.
    pub fn add(&self, other: &SapTotals) -> SapTotals {
        SapTotals {
            project_task_costs: &self.project_task_costs + &other.project_task_costs,
            project_task_commitments: &self.project_task_commitments
                + &other.project_task_commitments,
            production_task_costs: &self.production_task_costs + &other.production_task_costs,
            production_task_commitments: &self.production_task_commitments
                + &other.production_task_commitments,
        }
    }

    /// Same values at the stored scale.
    pub fn rescaled(&self) -> SapTotals {
        SapTotals {
            project_task_costs: self.project_task_costs.with_scale(SAP_DECIMAL_SCALE),
            project_task_commitments: self.project_task_commitments.with_scale(SAP_DECIMAL_SCALE),
            production_task_costs: self.production_task_costs.with_scale(SAP_DECIMAL_SCALE),
            production_task_commitments: self
                .production_task_commitments
                .with_scale(SAP_DECIMAL_SCALE),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.project_task_costs.is_zero()
            && self.project_task_commitments.is_zero()
            && self.production_task_costs.is_zero()
            && self.production_task_commitments.is_zero()
    }
}

/// Sum the cost and commitment items of one SAP project into its buckets.
pub fn summarize(sap_id: &str, costs: &[SapLineItem], commitments: &[SapLineItem]) -> SapTotals {
    let mut totals = SapTotals::zero();

    for item in costs {
        match classify_task(sap_id, &item.posid) {
            TaskGroup::ProjectTask => {
                totals.project_task_costs = &totals.project_task_costs + &item.amount
            }
            TaskGroup::ProductionTask => {
                totals.production_task_costs = &totals.production_task_costs + &item.amount
            }
        }
    }

    for item in commitments {
        match classify_task(sap_id, &item.posid) {
            TaskGroup::ProjectTask => {
                totals.project_task_commitments = &totals.project_task_commitments + &item.amount
            }
            TaskGroup::ProductionTask => {
                totals.production_task_commitments =
                    &totals.production_task_commitments + &item.amount
            }
        }
    }

    totals.rescaled()
}

/// Group aggregate from the totals of each distinct SAP id in the group.
///
/// A single contributor is copied as-is; several are summed.
pub fn combine_group(contributions: &[SapTotals]) -> SapTotals {
    match contributions {
        [] => SapTotals::zero(),
        [single] => single.clone(),
        many => many
            .iter()
            .fold(SapTotals::zero(), |acc, totals| acc.add(totals))
            .rescaled(),
    }
}

/// Date window of a SAP query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SapWindow {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl SapWindow {
    /// Window for `scope` when the earliest participating project starts
    /// planning in `earliest_start_year` and today is `today`.
    ///
    /// Cumulative windows run from Jan 1 of the start year through the end
    /// of next year; current-year windows cover this calendar year.
    pub fn for_scope(scope: SapCostScope, earliest_start_year: i32, today: NaiveDate) -> Result<Self> {
        let (start_year, end_year) = match scope {
            SapCostScope::Cumulative => (earliest_start_year, today.year() + 1),
            SapCostScope::CurrentYear => (today.year(), today.year()),
        };

        let start = NaiveDate::from_ymd_opt(start_year, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| Error::InvalidInput(format!("invalid start year {}", start_year)))?;
        let end = NaiveDate::from_ymd_opt(end_year, 12, 31)
            .and_then(|d| d.and_hms_opt(23, 59, 59))
            .ok_or_else(|| Error::InvalidInput(format!("invalid end year {}", end_year)))?;

        Ok(Self { start, end })
    }

    pub fn start_str(&self) -> String {
        self.start.format(SAP_DATETIME_FORMAT).to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format(SAP_DATETIME_FORMAT).to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_classify_known_task_ids() {
        let sap_id = "2814I03976";
        assert_eq!(classify_task(sap_id, "2814I03976.01"), TaskGroup::ProjectTask);
        assert_eq!(classify_task(sap_id, "2814I0397600101"), TaskGroup::ProjectTask);
        assert_eq!(classify_task(sap_id, "2814I03976"), TaskGroup::ProductionTask);
    }

    #[test]
    fn test_classify_is_order_independent() {
        let sap_id = "2814I03976";
        let ids = ["2814I03976", "2814I0397600101", "2814I03976.01"];
        let forward: Vec<_> = ids.iter().map(|p| classify_task(sap_id, p)).collect();
        let backward: Vec<_> = ids.iter().rev().map(|p| classify_task(sap_id, p)).collect();
        assert_eq!(forward, backward.into_iter().rev().collect::<Vec<_>>());
    }

    #[test]
    fn test_classify_other_sub_tasks_are_production() {
        let sap_id = "2814I03976";
        assert_eq!(classify_task(sap_id, "2814I03976.02"), TaskGroup::ProductionTask);
        assert_eq!(classify_task(sap_id, "2814I03976.011"), TaskGroup::ProductionTask);
        assert_eq!(classify_task(sap_id, "2814I0397600201"), TaskGroup::ProductionTask);
        assert_eq!(
            classify_task(sap_id, "2814I03976.01.03"),
            TaskGroup::ProjectTask
        );
    }

    #[test]
    fn test_classify_foreign_or_garbled_ids_are_production() {
        let sap_id = "2814I03976";
        assert_eq!(classify_task(sap_id, "2814I99999.01"), TaskGroup::ProductionTask);
        assert_eq!(classify_task(sap_id, "2814I03976-01"), TaskGroup::ProductionTask);
        assert_eq!(classify_task(sap_id, ""), TaskGroup::ProductionTask);
    }

    #[test]
    fn test_summarize_buckets() {
        let sap_id = "2814I00708";
        let costs = vec![
            SapLineItem::new("2814I00708.01", dec("111.000")),
            SapLineItem::new("2814I00708.02", dec("10.500")),
            SapLineItem::new("2814I00708", dec("1.250")),
        ];
        let commitments = vec![SapLineItem::new("2814I0070800101", dec("333.000"))];

        let totals = summarize(sap_id, &costs, &commitments);
        assert_eq!(totals.project_task_costs, dec("111.000"));
        assert_eq!(totals.production_task_costs, dec("11.750"));
        assert_eq!(totals.project_task_commitments, dec("333.000"));
        assert_eq!(totals.production_task_commitments, dec("0"));
    }

    #[test]
    fn test_summarize_avoids_float_drift() {
        let items: Vec<_> = (0..10)
            .map(|_| SapLineItem::new("X.01", dec("0.100")))
            .collect();
        let totals = summarize("X", &items, &[]);
        assert_eq!(totals.project_task_costs, dec("1.000"));
    }

    #[test]
    fn test_summarize_empty_is_zero() {
        let totals = summarize("2814I00708", &[], &[]);
        assert!(totals.is_zero());
        assert_eq!(totals.production_task_costs.to_string(), "0.000");
    }

    #[test]
    fn test_combine_group_sums_multiple_ids() {
        let a = SapTotals {
            project_task_costs: dec("100.000"),
            ..SapTotals::zero()
        };
        let b = SapTotals {
            project_task_costs: dec("50.000"),
            ..SapTotals::zero()
        };
        let combined = combine_group(&[a, b]);
        assert_eq!(combined.project_task_costs, dec("150.000"));
    }

    #[test]
    fn test_combine_group_copies_single_id() {
        let a = SapTotals {
            project_task_costs: dec("100.000"),
            production_task_commitments: dec("7.125"),
            ..SapTotals::zero()
        };
        let combined = combine_group(std::slice::from_ref(&a));
        assert_eq!(combined, a);
    }

    #[test]
    fn test_combine_group_empty_is_zero() {
        assert!(combine_group(&[]).is_zero());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount(" 111.000 "), Some(dec("111.000")));
        assert_eq!(parse_amount("-5.5"), Some(dec("-5.5")));
        assert_eq!(parse_amount("abc"), None);
    }

    #[test]
    fn test_window_cumulative() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let window = SapWindow::for_scope(SapCostScope::Cumulative, 2021, today).unwrap();
        assert_eq!(window.start_str(), "2021-01-01T00:00:00");
        assert_eq!(window.end_str(), "2027-12-31T23:59:59");
    }

    #[test]
    fn test_window_current_year_ignores_start_year() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 14).unwrap();
        let window = SapWindow::for_scope(SapCostScope::CurrentYear, 2019, today).unwrap();
        assert_eq!(window.start_str(), "2026-01-01T00:00:00");
        assert_eq!(window.end_str(), "2026-12-31T23:59:59");
    }

    #[test]
    fn test_fetch_failed_has_no_items() {
        let failed = SapFetch::Failed { status: 503 };
        assert!(failed.is_failed());
        assert!(failed.items().is_empty());
    }
}
