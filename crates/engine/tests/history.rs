use chrono::NaiveDate;
use sea_orm::Database;
use uuid::Uuid;

use engine::{Currency, Engine, ExpenseCmd, HistoryPoint, HistoryQuery, IncomeCmd};
use migration::MigratorTrait;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build().await.unwrap()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn usd() -> Currency {
    Currency::try_from("USD").unwrap()
}

fn point(day: u32, balance_minor: i64) -> HistoryPoint {
    HistoryPoint { day, balance_minor }
}

/// Seeds the recurring fixture: opening 100.00, +50.00 on Feb 1, -20.00 on
/// Feb 28, -10.00 on Mar 5.
async fn seeded_account(engine: &Engine) -> Uuid {
    let id = engine.new_account("Cash", usd(), 100_00).await.unwrap();
    engine
        .income(IncomeCmd::new(id, 50_00, date(2026, 2, 1)))
        .await
        .unwrap();
    engine
        .expense(ExpenseCmd::new(id, 20_00, date(2026, 2, 28)))
        .await
        .unwrap();
    engine
        .expense(ExpenseCmd::new(id, 10_00, date(2026, 3, 5)))
        .await
        .unwrap();
    id
}

#[tokio::test]
async fn sparse_series_has_one_point_per_operation_day() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    // February 2026 has 28 days; operations on days 1 and 28 only, which
    // also happen to be the boundary anchors: exactly two points.
    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 2))
        .await
        .unwrap();
    assert_eq!(history.actual, vec![point(1, 150_00), point(28, 130_00)]);
    assert_eq!(history.labels.len(), 28);
    assert_eq!(history.labels.first(), Some(&1));
    assert_eq!(history.labels.last(), Some(&28));
}

#[tokio::test]
async fn boundary_anchors_are_added_when_missing() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    // March has a single operation on day 5: anchors appear on day 1 and 31.
    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 3))
        .await
        .unwrap();
    assert_eq!(
        history.actual,
        vec![point(1, 130_00), point(5, 120_00), point(31, 120_00)]
    );
}

#[tokio::test]
async fn start_balance_is_derived_not_snapshotted() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    // The stored balance (120.00) includes the March expense; reconstructing
    // February must subtract everything dated on or after Feb 1 to land on
    // the 100.00 opening.
    assert_eq!(engine.account(id).await.unwrap().balance_minor, 120_00);

    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 2))
        .await
        .unwrap();
    assert_eq!(history.actual.first(), Some(&point(1, 150_00)));
    assert_eq!(history.burndown[0], point(1, 100_00));
}

#[tokio::test]
async fn months_without_operations_are_flat_anchors() {
    let engine = engine_with_db().await;
    let id = engine.new_account("Cash", usd(), 40_00).await.unwrap();

    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 4))
        .await
        .unwrap();
    assert_eq!(history.actual, vec![point(1, 40_00), point(30, 40_00)]);
    assert!(history.prev_month.is_empty());
    assert!(history.forecast.is_none());
}

#[tokio::test]
async fn prev_month_series_aligns_by_day_offset() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    // Viewing March: the overlay replays February on the same day offsets,
    // with silent days absent rather than zeroed.
    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 3))
        .await
        .unwrap();
    assert_eq!(
        history.prev_month,
        vec![point(1, 150_00), point(28, 130_00)]
    );
}

#[tokio::test]
async fn burndown_runs_from_start_to_target() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 3).target_end_balance(90_00))
        .await
        .unwrap();
    assert_eq!(history.burndown, [point(1, 130_00), point(31, 90_00)]);

    // Without a target the pace line is flat at the starting balance.
    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 3))
        .await
        .unwrap();
    assert_eq!(history.burndown, [point(1, 130_00), point(31, 130_00)]);
}

#[tokio::test]
async fn forecast_projects_average_daily_spend() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    // On Mar 10 the month spent 10.00 over 10 days: 0.10/day across the 21
    // remaining days projects 99.00 at month end.
    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 3).current_month(date(2026, 3, 10)))
        .await
        .unwrap();
    assert_eq!(
        history.forecast,
        Some([point(10, 120_00), point(31, 99_00)])
    );
}

#[tokio::test]
async fn forecast_requires_the_current_month_flag() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 3))
        .await
        .unwrap();
    assert!(history.forecast.is_none());

    // A "today" outside the requested month disables the projection too.
    let history = engine
        .balance_history(&HistoryQuery::new(id, 2026, 3).current_month(date(2026, 4, 2)))
        .await
        .unwrap();
    assert!(history.forecast.is_none());
}

#[tokio::test]
async fn history_is_reproducible() {
    let engine = engine_with_db().await;
    let id = seeded_account(&engine).await;

    let first = engine
        .balance_history(&HistoryQuery::new(id, 2026, 2))
        .await
        .unwrap();
    let second = engine
        .balance_history(&HistoryQuery::new(id, 2026, 2))
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn invalid_month_is_rejected() {
    let engine = engine_with_db().await;
    let id = engine.new_account("Cash", usd(), 0).await.unwrap();

    assert!(engine.balance_history(&HistoryQuery::new(id, 2026, 13)).await.is_err());
    assert!(engine.balance_history(&HistoryQuery::new(id, 2026, 0)).await.is_err());
}
