use chrono::NaiveDate;
use sea_orm::Database;
use uuid::Uuid;

use engine::{
    CategoryKind, Currency, Engine, EngineError, ExpenseCmd, FlowKind, IncomeCmd, LedgerEvent,
    OperationKind, OperationListFilter, Rate, SplitOperationCmd, TransferCmd, UpdateOperationCmd,
};
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

fn eur() -> Currency {
    Currency::try_from("EUR").unwrap()
}

async fn account(engine: &Engine, name: &str, currency: Currency, opening: i64) -> Uuid {
    engine.new_account(name, currency, opening).await.unwrap()
}

async fn entry_category(engine: &Engine, name: &str, flow: FlowKind) -> Uuid {
    engine
        .new_category(name, CategoryKind::Entry, flow, None)
        .await
        .unwrap()
}

#[tokio::test]
async fn expense_income_delete_keep_balance_consistent() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 0).await;

    engine
        .income(IncomeCmd::new(cash, 1000, date(2026, 3, 1)))
        .await
        .unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 1000);

    let lunch = engine
        .expense(ExpenseCmd::new(cash, 200, date(2026, 3, 2)).note("lunch"))
        .await
        .unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 800);

    engine.delete_operation(lunch, date(2026, 3, 2)).await.unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 1000);
}

#[tokio::test]
async fn balance_equals_fold_of_operations() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 500).await;
    let bank = account(&engine, "Bank", usd(), 0).await;

    engine
        .income(IncomeCmd::new(cash, 2000, date(2026, 3, 1)))
        .await
        .unwrap();
    engine
        .expense(ExpenseCmd::new(cash, 350, date(2026, 3, 3)))
        .await
        .unwrap();
    engine
        .transfer(TransferCmd::new(cash, bank, 1000, date(2026, 3, 5)))
        .await
        .unwrap();
    engine
        .set_account_balance(cash, 1500, date(2026, 3, 6))
        .await
        .unwrap();

    // Replay every operation by hand and compare with the stored balance.
    let filter = OperationListFilter {
        include_adjustments: true,
        ..Default::default()
    };
    let ops = engine
        .list_operations_for_account(cash, 100, &filter)
        .await
        .unwrap();
    let fold: i64 = ops.iter().map(|op| op.effect_on(cash)).sum();
    let stored = engine.account(cash).await.unwrap();
    assert_eq!(stored.balance_minor, stored.opening_balance_minor + fold);
    assert_eq!(stored.balance_minor, 1500);
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 0).await;

    let err = engine
        .expense(ExpenseCmd::new(cash, 0, date(2026, 3, 1)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("amount_minor must be > 0".to_string())
    );

    let err = engine
        .income(IncomeCmd::new(Uuid::new_v4(), 100, date(2026, 3, 1)))
        .await
        .unwrap_err();
    assert_eq!(err, EngineError::KeyNotFound("account not exists".to_string()));

    let err = engine
        .transfer(TransferCmd::new(cash, cash, 100, date(2026, 3, 1)))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::InvalidAmount("from_account_id and to_account_id must differ".to_string())
    );
}

#[tokio::test]
async fn same_currency_transfer_mirrors_amount() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 1000).await;
    let bank = account(&engine, "Bank", usd(), 0).await;

    let id = engine
        .transfer(TransferCmd::new(cash, bank, 250, date(2026, 3, 1)))
        .await
        .unwrap();

    let op = engine.operation(id).await.unwrap();
    assert_eq!(op.kind, OperationKind::Transfer);
    assert_eq!(op.destination_amount_minor, Some(250));
    assert_eq!(op.rate_micro, None);

    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 750);
    assert_eq!(engine.account(bank).await.unwrap().balance_minor, 250);
}

#[tokio::test]
async fn cross_currency_transfer_derives_destination_from_rate() {
    let engine = engine_with_db().await;
    let dollars = account(&engine, "Dollars", usd(), 100_00).await;
    let euros = account(&engine, "Euros", eur(), 0).await;

    // 100 USD at 0.85 ⇒ 85.00 EUR.
    let id = engine
        .transfer(
            TransferCmd::new(dollars, euros, 100_00, date(2026, 3, 1))
                .rate(Rate::parse("0.85").unwrap()),
        )
        .await
        .unwrap();

    let op = engine.operation(id).await.unwrap();
    assert_eq!(op.destination_amount_minor, Some(85_00));
    assert_eq!(op.rate_micro, Some(850_000));

    assert_eq!(engine.account(dollars).await.unwrap().balance_minor, 0);
    assert_eq!(engine.account(euros).await.unwrap().balance_minor, 85_00);
}

#[tokio::test]
async fn editing_destination_amount_recomputes_rate() {
    let engine = engine_with_db().await;
    let dollars = account(&engine, "Dollars", usd(), 100_00).await;
    let euros = account(&engine, "Euros", eur(), 0).await;

    let id = engine
        .transfer(
            TransferCmd::new(dollars, euros, 100_00, date(2026, 3, 1))
                .rate(Rate::parse("0.85").unwrap()),
        )
        .await
        .unwrap();

    // Editing the destination amount to 90.00 drives the rate to 0.900000.
    engine
        .update_operation(UpdateOperationCmd::new(id).destination_amount(90_00))
        .await
        .unwrap();

    let op = engine.operation(id).await.unwrap();
    assert_eq!(op.rate_micro, Some(900_000));
    assert_eq!(op.destination_amount_minor, Some(90_00));

    // The old +85.00 effect was reversed and +90.00 applied.
    assert_eq!(engine.account(euros).await.unwrap().balance_minor, 90_00);
    assert_eq!(engine.account(dollars).await.unwrap().balance_minor, 0);
}

#[tokio::test]
async fn inconsistent_transfer_triple_is_rejected() {
    let engine = engine_with_db().await;
    let dollars = account(&engine, "Dollars", usd(), 100_00).await;
    let euros = account(&engine, "Euros", eur(), 0).await;

    let err = engine
        .transfer(
            TransferCmd::new(dollars, euros, 100_00, date(2026, 3, 1))
                .rate(Rate::parse("0.85").unwrap())
                .destination_amount(90_00),
        )
        .await
        .unwrap_err();
    assert_eq!(
        err,
        EngineError::Inconsistent("destination amount does not reconcile with rate".to_string())
    );

    // Nothing was applied.
    assert_eq!(engine.account(dollars).await.unwrap().balance_minor, 100_00);
    assert_eq!(engine.account(euros).await.unwrap().balance_minor, 0);
}

#[tokio::test]
async fn update_reverses_old_effect_and_applies_new() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 1000).await;

    let id = engine
        .expense(ExpenseCmd::new(cash, 100, date(2026, 3, 2)))
        .await
        .unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 900);

    engine
        .update_operation(UpdateOperationCmd::new(id).amount(150).note("bigger lunch"))
        .await
        .unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 850);

    let op = engine.operation(id).await.unwrap();
    assert_eq!(op.amount_minor, 150);
    assert_eq!(op.note.as_deref(), Some("bigger lunch"));
}

#[tokio::test]
async fn note_only_update_does_not_move_balances() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 1000).await;
    let id = engine
        .expense(ExpenseCmd::new(cash, 100, date(2026, 3, 2)))
        .await
        .unwrap();

    engine
        .update_operation(UpdateOperationCmd::new(id).note("relabeled"))
        .await
        .unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 900);
}

#[tokio::test]
async fn split_preserves_balance_and_reclassifies() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 1000).await;
    let groceries = entry_category(&engine, "Groceries", FlowKind::Expense).await;
    let snacks = entry_category(&engine, "Snacks", FlowKind::Expense).await;

    let id = engine
        .expense(ExpenseCmd::new(cash, 500, date(2026, 3, 2)).category(groceries))
        .await
        .unwrap();
    let before = engine.account(cash).await.unwrap().balance_minor;

    let sibling = engine
        .split_operation(SplitOperationCmd::new(id, 200, snacks))
        .await
        .unwrap();

    let after = engine.account(cash).await.unwrap().balance_minor;
    assert_eq!(before, after);

    let original = engine.operation(id).await.unwrap();
    assert_eq!(original.amount_minor, 300);
    assert_eq!(original.category_id, Some(groceries));

    let new_op = engine.operation(sibling).await.unwrap();
    assert_eq!(new_op.amount_minor, 200);
    assert_eq!(new_op.category_id, Some(snacks));
    assert_eq!(new_op.occurred_on, original.occurred_on);
    assert_eq!(new_op.kind, original.kind);
}

#[tokio::test]
async fn split_validates_amount_and_category() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 1000).await;
    let snacks = entry_category(&engine, "Snacks", FlowKind::Expense).await;
    let salary = entry_category(&engine, "Salary", FlowKind::Income).await;

    let id = engine
        .expense(ExpenseCmd::new(cash, 500, date(2026, 3, 2)))
        .await
        .unwrap();

    // Split amount must be strictly inside (0, amount).
    assert!(
        engine
            .split_operation(SplitOperationCmd::new(id, 500, snacks))
            .await
            .is_err()
    );
    assert!(
        engine
            .split_operation(SplitOperationCmd::new(id, 0, snacks))
            .await
            .is_err()
    );

    // Category flow must match the operation kind.
    assert!(
        engine
            .split_operation(SplitOperationCmd::new(id, 100, salary))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn adjustments_are_immutable_and_day_locked() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 1000).await;
    let created = date(2026, 3, 2);

    engine.set_account_balance(cash, 5000, created).await.unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 5000);

    let filter = OperationListFilter {
        include_adjustments: true,
        ..Default::default()
    };
    let ops = engine
        .list_operations_for_account(cash, 10, &filter)
        .await
        .unwrap();
    let adjustment = ops
        .iter()
        .find(|op| op.kind == OperationKind::Adjustment)
        .unwrap();
    assert_eq!(adjustment.amount_minor, 4000);

    // Editing an adjustment is refused outright.
    let err = engine
        .update_operation(UpdateOperationCmd::new(adjustment.id).amount(1))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AdjustmentLocked(_)));

    // Deleting it on a later day is refused; on the creation day it works.
    let err = engine
        .delete_operation(adjustment.id, date(2026, 3, 3))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::AdjustmentLocked(_)));
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 5000);

    engine.delete_operation(adjustment.id, created).await.unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 1000);
}

#[tokio::test]
async fn same_day_balance_edits_fold_into_one_adjustment() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 1000).await;
    let today = date(2026, 3, 2);

    engine.set_account_balance(cash, 5000, today).await.unwrap();
    engine.set_account_balance(cash, 6000, today).await.unwrap();
    assert_eq!(engine.account(cash).await.unwrap().balance_minor, 6000);

    let filter = OperationListFilter {
        include_adjustments: true,
        ..Default::default()
    };
    let ops = engine
        .list_operations_for_account(cash, 10, &filter)
        .await
        .unwrap();
    let adjustments: Vec<_> = ops
        .iter()
        .filter(|op| op.kind == OperationKind::Adjustment)
        .collect();
    assert_eq!(adjustments.len(), 1);
    assert_eq!(adjustments[0].amount_minor, 5000);

    // Setting the balance back to its pre-edit value removes the adjustment.
    engine.set_account_balance(cash, 1000, today).await.unwrap();
    let ops = engine
        .list_operations_for_account(cash, 10, &filter)
        .await
        .unwrap();
    assert!(ops.iter().all(|op| op.kind != OperationKind::Adjustment));
}

#[tokio::test]
async fn listing_excludes_adjustments_by_default() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 0).await;

    engine
        .income(IncomeCmd::new(cash, 1000, date(2026, 3, 1)))
        .await
        .unwrap();
    engine
        .set_account_balance(cash, 2000, date(2026, 3, 2))
        .await
        .unwrap();

    let ops = engine
        .list_operations_for_account(cash, 10, &OperationListFilter::default())
        .await
        .unwrap();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].kind, OperationKind::Income);

    let filter = OperationListFilter {
        include_adjustments: true,
        ..Default::default()
    };
    let ops = engine
        .list_operations_for_account(cash, 10, &filter)
        .await
        .unwrap();
    assert_eq!(ops.len(), 2);
}

#[tokio::test]
async fn list_pagination_walks_newest_to_oldest() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 0).await;

    for day in 1..=3 {
        engine
            .income(IncomeCmd::new(cash, 100 * i64::from(day), date(2026, 3, day)))
            .await
            .unwrap();
    }

    let filter = OperationListFilter::default();
    let (page, cursor) = engine
        .list_operations_for_account_page(cash, 2, None, &filter)
        .await
        .unwrap();
    assert_eq!(page.len(), 2);
    assert_eq!(page[0].occurred_on, date(2026, 3, 3));
    assert_eq!(page[1].occurred_on, date(2026, 3, 2));
    let cursor = cursor.unwrap();

    let (page, cursor) = engine
        .list_operations_for_account_page(cash, 2, Some(&cursor), &filter)
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].occurred_on, date(2026, 3, 1));
    assert!(cursor.is_none());
}

#[tokio::test]
async fn totals_exclude_adjustments_and_transfers() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 0).await;
    let bank = account(&engine, "Bank", usd(), 0).await;

    engine
        .income(IncomeCmd::new(cash, 1000, date(2026, 3, 1)))
        .await
        .unwrap();
    engine
        .expense(ExpenseCmd::new(cash, 200, date(2026, 3, 2)))
        .await
        .unwrap();
    engine
        .transfer(TransferCmd::new(cash, bank, 300, date(2026, 3, 3)))
        .await
        .unwrap();
    engine
        .set_account_balance(cash, 9000, date(2026, 3, 4))
        .await
        .unwrap();

    let (income, expense) = engine
        .account_totals(cash, date(2026, 3, 1), date(2026, 4, 1))
        .await
        .unwrap();
    assert_eq!(income, 1000);
    assert_eq!(expense, 200);
}

#[tokio::test]
async fn balance_affecting_writes_publish_reload() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 0).await;
    let mut events = engine.subscribe();

    engine
        .income(IncomeCmd::new(cash, 1000, date(2026, 3, 1)))
        .await
        .unwrap();
    assert_eq!(events.try_recv().unwrap(), LedgerEvent::ReloadAll);

    engine
        .set_account_balance(cash, 500, date(2026, 3, 2))
        .await
        .unwrap();
    assert_eq!(events.try_recv().unwrap(), LedgerEvent::ReloadAll);

    // A no-op balance edit publishes nothing.
    engine
        .set_account_balance(cash, 500, date(2026, 3, 2))
        .await
        .unwrap();
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn shadow_category_never_reaches_pickers() {
    let engine = engine_with_db().await;
    let cash = account(&engine, "Cash", usd(), 0).await;
    entry_category(&engine, "Groceries", FlowKind::Expense).await;

    engine
        .set_account_balance(cash, 1000, date(2026, 3, 1))
        .await
        .unwrap();

    let picker = engine
        .list_categories(FlowKind::Expense, false)
        .await
        .unwrap();
    assert_eq!(picker.len(), 1);
    assert_eq!(picker[0].name, "Groceries");

    let all = engine.list_categories(FlowKind::Expense, true).await.unwrap();
    assert_eq!(all.len(), 2);
    let shadow = all.iter().find(|c| c.shadow).unwrap();

    // The shadow category cannot be attached to a user operation.
    let err = engine
        .expense(ExpenseCmd::new(cash, 100, date(2026, 3, 2)).category(shadow.id))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCategory(_)));
}
