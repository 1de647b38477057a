//! Balance history reconstruction.
//!
//! Rebuilds an account's day-by-day balance for one month by replaying its
//! operations. Nothing is persisted: the series must be reproducible from the
//! operation set alone. The start-of-month balance is derived by subtracting
//! the effects of every operation dated on or after the month start from the
//! stored balance, so no snapshot table is needed.

use chrono::{Datelike, NaiveDate};
use std::collections::BTreeMap;
use uuid::Uuid;

use sea_orm::{Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*};

use crate::{EngineError, Operation, ResultEngine, operations};

use super::{Engine, with_tx};

/// Inputs for [`Engine::balance_history`].
///
/// `today` and `is_current_month` are caller input: the reconstructor never
/// reads the clock, so histories are reproducible under test with fixed
/// dates.
#[derive(Clone, Debug)]
pub struct HistoryQuery {
    pub account_id: Uuid,
    pub year: i32,
    pub month: u32,
    /// True when the requested month is the ongoing one; enables the
    /// forecast series.
    pub is_current_month: bool,
    /// The current date, required for the forecast.
    pub today: Option<NaiveDate>,
    /// End-of-month balance the burndown reference line aims at. Defaults to
    /// the month's starting balance (a flat pace line).
    pub target_end_balance_minor: Option<i64>,
}

impl HistoryQuery {
    #[must_use]
    pub fn new(account_id: Uuid, year: i32, month: u32) -> Self {
        Self {
            account_id,
            year,
            month,
            is_current_month: false,
            today: None,
            target_end_balance_minor: None,
        }
    }

    /// Marks the query as targeting the ongoing month.
    #[must_use]
    pub fn current_month(mut self, today: NaiveDate) -> Self {
        self.is_current_month = true;
        self.today = Some(today);
        self
    }

    #[must_use]
    pub fn target_end_balance(mut self, target_minor: i64) -> Self {
        self.target_end_balance_minor = Some(target_minor);
        self
    }
}

/// One point of a history series: the balance at the end of `day`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HistoryPoint {
    pub day: u32,
    pub balance_minor: i64,
}

/// The reconstructed series for one account and month.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BalanceHistory {
    /// Day numbers of the month, `1..=days_in_month`; the chart's x axis.
    pub labels: Vec<u32>,
    /// Sparse running balance: one point per day with at least one
    /// operation, plus day-1 and last-day anchors.
    pub actual: Vec<HistoryPoint>,
    /// Two-point pace reference from the starting balance to the target.
    pub burndown: [HistoryPoint; 2],
    /// Previous month's balances aligned on the same day offsets; days
    /// without operations are absent, not zero.
    pub prev_month: Vec<HistoryPoint>,
    /// Projection from today to month end, `Some` only for the current
    /// month: current balance minus average daily net spend times the days
    /// remaining.
    pub forecast: Option<[HistoryPoint; 2]>,
}

fn month_start(year: i32, month: u32) -> ResultEngine<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
        .ok_or_else(|| EngineError::InvalidAmount(format!("invalid month: {year}-{month}")))
}

fn next_month_start(year: i32, month: u32) -> ResultEngine<NaiveDate> {
    if month == 12 {
        month_start(year + 1, 1)
    } else {
        month_start(year, month + 1)
    }
}

fn prev_month_of(year: i32, month: u32) -> (i32, u32) {
    if month == 1 { (year - 1, 12) } else { (year, month - 1) }
}

fn days_in_month(year: i32, month: u32) -> ResultEngine<u32> {
    let start = month_start(year, month)?;
    let next = next_month_start(year, month)?;
    Ok(next.signed_duration_since(start).num_days() as u32)
}

/// Folds operations into per-day signed deltas for one account.
fn deltas_by_day(
    ops: &[Operation],
    account_id: Uuid,
    from: NaiveDate,
    to: NaiveDate,
) -> BTreeMap<u32, i64> {
    let mut days: BTreeMap<u32, i64> = BTreeMap::new();
    for op in ops {
        if op.occurred_on < from || op.occurred_on >= to {
            continue;
        }
        let effect = op.effect_on(account_id);
        if effect != 0 {
            *days.entry(op.occurred_on.day()).or_insert(0) += effect;
        }
    }
    days
}

/// Walks per-day deltas into a sparse running-balance series.
fn running_series(start_balance: i64, days: &BTreeMap<u32, i64>) -> Vec<HistoryPoint> {
    let mut running = start_balance;
    let mut points = Vec::with_capacity(days.len());
    for (day, delta) in days {
        running += delta;
        points.push(HistoryPoint {
            day: *day,
            balance_minor: running,
        });
    }
    points
}

impl Engine {
    /// Reconstructs the balance history of one account for one month.
    pub async fn balance_history(&self, query: &HistoryQuery) -> ResultEngine<BalanceHistory> {
        let account_id = query.account_id;
        with_tx!(self, |db_tx| {
            let account_model = self.require_account(&db_tx, account_id).await?;

            let start = month_start(query.year, query.month)?;
            let end = next_month_start(query.year, query.month)?;
            let day_count = days_in_month(query.year, query.month)?;
            let (prev_year, prev_month) = prev_month_of(query.year, query.month);
            let prev_start = month_start(prev_year, prev_month)?;
            let prev_day_count = days_in_month(prev_year, prev_month)?;

            // Everything from the previous month on is enough to seed both
            // series and derive the start-of-month balances.
            let models: Vec<operations::Model> = operations::Entity::find()
                .filter(
                    Condition::any()
                        .add(operations::Column::AccountId.eq(account_id.to_string()))
                        .add(
                            operations::Column::DestinationAccountId
                                .eq(account_id.to_string()),
                        ),
                )
                .filter(operations::Column::OccurredOn.gte(prev_start))
                .order_by_asc(operations::Column::OccurredOn)
                .all(&db_tx)
                .await?;
            let mut ops = Vec::with_capacity(models.len());
            for model in models {
                ops.push(Operation::try_from(model)?);
            }

            let effects_since = |date: NaiveDate| -> i64 {
                ops.iter()
                    .filter(|op| op.occurred_on >= date)
                    .map(|op| op.effect_on(account_id))
                    .sum()
            };

            let start_balance = account_model.balance_minor - effects_since(start);
            let prev_start_balance = account_model.balance_minor - effects_since(prev_start);

            // Actual series: sparse, with boundary anchors.
            let month_days = deltas_by_day(&ops, account_id, start, end);
            let mut actual = running_series(start_balance, &month_days);
            if actual.first().is_none_or(|point| point.day != 1) {
                actual.insert(
                    0,
                    HistoryPoint {
                        day: 1,
                        balance_minor: start_balance,
                    },
                );
            }
            let end_balance = actual.last().map_or(start_balance, |p| p.balance_minor);
            if actual.last().is_none_or(|point| point.day != day_count) {
                actual.push(HistoryPoint {
                    day: day_count,
                    balance_minor: end_balance,
                });
            }

            let burndown = [
                HistoryPoint {
                    day: 1,
                    balance_minor: start_balance,
                },
                HistoryPoint {
                    day: day_count,
                    balance_minor: query.target_end_balance_minor.unwrap_or(start_balance),
                },
            ];

            // Previous month overlay: no anchors, absent days stay absent.
            let prev_days = deltas_by_day(&ops, account_id, prev_start, start);
            let prev_series = running_series(prev_start_balance, &prev_days);
            debug_assert!(prev_series.iter().all(|p| p.day <= prev_day_count));

            let forecast = match (query.is_current_month, query.today) {
                (true, Some(today)) if today >= start && today < end => {
                    let balance_today = start_balance
                        + month_days
                            .iter()
                            .filter(|(day, _)| **day <= today.day())
                            .map(|(_, delta)| delta)
                            .sum::<i64>();
                    let elapsed = i64::from(today.day());
                    let net_spend = start_balance - balance_today;
                    let daily = net_spend / elapsed;
                    let remaining = i64::from(day_count - today.day());
                    Some([
                        HistoryPoint {
                            day: today.day(),
                            balance_minor: balance_today,
                        },
                        HistoryPoint {
                            day: day_count,
                            balance_minor: balance_today - daily * remaining,
                        },
                    ])
                }
                _ => None,
            };

            Ok(BalanceHistory {
                labels: (1..=day_count).collect(),
                actual,
                burndown,
                prev_month: prev_series,
                forecast,
            })
        })
    }
}
