use base64::Engine as _;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use sea_orm::{
    ActiveValue, Condition, DatabaseTransaction, QueryFilter, QueryOrder, QuerySelect,
    TransactionTrait, prelude::*,
};

use crate::{
    Amount, EngineError, ExpenseCmd, FlowKind, IncomeCmd, Operation, OperationKind, Rate,
    ResultEngine, SplitOperationCmd, TransferCmd, UpdateOperationCmd,
    conversion::{convert_amount, rate_from_amounts, reconciles, RATE_EPSILON_MICRO},
    operations,
};

use super::{Engine, model_currency, normalize_optional_text, with_tx};

/// Filters for listing operations.
///
/// `from` is inclusive and `to` is exclusive (`[from, to)`).
#[derive(Clone, Debug, Default)]
pub struct OperationListFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    /// If present, acts as an allow-list of kinds to return.
    pub kinds: Option<Vec<OperationKind>>,
    /// If true, includes adjustment operations (default: false). Adjustments
    /// still count toward balances and history; they are only hidden from
    /// expense/income listings and summaries.
    pub include_adjustments: bool,
}

fn validate_list_filter(filter: &OperationListFilter) -> ResultEngine<()> {
    if let (Some(from), Some(to)) = (filter.from, filter.to)
        && from >= to
    {
        return Err(EngineError::InvalidAmount(
            "invalid range: from must be < to".to_string(),
        ));
    }
    if filter.kinds.as_ref().is_some_and(|k| k.is_empty()) {
        return Err(EngineError::InvalidAmount(
            "kinds must not be empty".to_string(),
        ));
    }
    Ok(())
}

trait ApplyOpFilters: QueryFilter + Sized {
    fn apply_op_filters(self, filter: &OperationListFilter) -> Self;
}

impl<T> ApplyOpFilters for T
where
    T: QueryFilter + Sized,
{
    fn apply_op_filters(mut self, filter: &OperationListFilter) -> Self {
        if let Some(from) = filter.from {
            self = self.filter(operations::Column::OccurredOn.gte(from));
        }
        if let Some(to) = filter.to {
            self = self.filter(operations::Column::OccurredOn.lt(to));
        }

        if let Some(kinds) = &filter.kinds {
            let kinds: Vec<String> = kinds.iter().map(|k| k.as_str().to_string()).collect();
            self = self.filter(operations::Column::Kind.is_in(kinds));
        } else if !filter.include_adjustments {
            self = self
                .filter(operations::Column::Kind.ne(OperationKind::Adjustment.as_str()));
        }

        self
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct OperationsCursor {
    occurred_on: NaiveDate,
    operation_id: String,
}

impl OperationsCursor {
    fn encode(&self) -> ResultEngine<String> {
        let bytes = serde_json::to_vec(self)
            .map_err(|_| EngineError::InvalidAmount("invalid operations cursor".to_string()))?;
        Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    fn decode(input: &str) -> ResultEngine<Self> {
        let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
            .decode(input.as_bytes())
            .map_err(|_| EngineError::InvalidAmount("invalid operations cursor".to_string()))?;
        serde_json::from_slice::<Self>(&bytes)
            .map_err(|_| EngineError::InvalidAmount("invalid operations cursor".to_string()))
    }
}

fn apply_optional_text_patch(existing: Option<String>, patch: Option<&str>) -> Option<String> {
    match patch {
        None => existing,
        Some(value) => normalize_optional_text(Some(value)),
    }
}

impl Engine {
    /// Applies signed balance deltas to accounts inside the transaction,
    /// skipping zero deltas. Overflow is a ledger inconsistency and aborts.
    pub(super) async fn apply_account_deltas(
        &self,
        db_tx: &DatabaseTransaction,
        deltas: &HashMap<Uuid, i64>,
    ) -> ResultEngine<()> {
        for (account_id, delta) in deltas {
            if *delta == 0 {
                continue;
            }
            let account_model = self.require_account(db_tx, *account_id).await?;
            let new_balance =
                account_model.balance_minor.checked_add(*delta).ok_or_else(|| {
                    tracing::error!(account = %account_id, "balance overflow while applying deltas");
                    EngineError::Inconsistent("balance overflow".to_string())
                })?;
            let active = crate::accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                balance_minor: ActiveValue::Set(new_balance),
                ..Default::default()
            };
            active.update(db_tx).await?;
        }
        Ok(())
    }

    /// Loads an operation row or fails with `KeyNotFound`.
    pub(super) async fn require_operation(
        &self,
        db_tx: &DatabaseTransaction,
        operation_id: Uuid,
    ) -> ResultEngine<operations::Model> {
        operations::Entity::find_by_id(operation_id.to_string())
            .one(db_tx)
            .await?
            .ok_or_else(|| EngineError::KeyNotFound("operation not exists".to_string()))
    }

    async fn create_simple_operation(
        &self,
        db_tx: &DatabaseTransaction,
        kind: OperationKind,
        account_id: Uuid,
        amount_minor: i64,
        category_id: Option<Uuid>,
        occurred_on: NaiveDate,
        note: Option<String>,
    ) -> ResultEngine<Uuid> {
        self.require_account(db_tx, account_id).await?;
        let flow = match kind {
            OperationKind::Expense => FlowKind::Expense,
            OperationKind::Income => FlowKind::Income,
            _ => {
                return Err(EngineError::InvalidAmount(
                    "invalid kind for simple operation".to_string(),
                ));
            }
        };
        if let Some(category_id) = category_id {
            self.require_entry_category(db_tx, category_id, flow).await?;
        }

        let op = Operation::new(
            kind,
            account_id,
            None,
            category_id,
            amount_minor,
            None,
            None,
            occurred_on,
            normalize_optional_text(note.as_deref()),
        )?;

        let mut deltas: HashMap<Uuid, i64> = HashMap::new();
        for (account, delta) in op.effects() {
            *deltas.entry(account).or_insert(0) += delta;
        }

        operations::ActiveModel::from(&op).insert(db_tx).await?;
        self.apply_account_deltas(db_tx, &deltas).await?;

        Ok(op.id)
    }

    /// Create an expense operation (decreases the account balance).
    pub async fn expense(&self, cmd: ExpenseCmd) -> ResultEngine<Uuid> {
        let ExpenseCmd {
            account_id,
            amount_minor,
            category_id,
            occurred_on,
            note,
        } = cmd;
        let id = with_tx!(self, |db_tx| {
            self.create_simple_operation(
                &db_tx,
                OperationKind::Expense,
                account_id,
                amount_minor,
                category_id,
                occurred_on,
                note,
            )
            .await
        })?;
        tracing::debug!(operation = %id, account = %account_id, "expense recorded");
        self.publish_reload();
        Ok(id)
    }

    /// Create an income operation (increases the account balance).
    pub async fn income(&self, cmd: IncomeCmd) -> ResultEngine<Uuid> {
        let IncomeCmd {
            account_id,
            amount_minor,
            category_id,
            occurred_on,
            note,
        } = cmd;
        let id = with_tx!(self, |db_tx| {
            self.create_simple_operation(
                &db_tx,
                OperationKind::Income,
                account_id,
                amount_minor,
                category_id,
                occurred_on,
                note,
            )
            .await
        })?;
        tracing::debug!(operation = %id, account = %account_id, "income recorded");
        self.publish_reload();
        Ok(id)
    }

    /// Create a transfer between two accounts.
    ///
    /// Same-currency pairs move `amount_minor` verbatim. Cross-currency pairs
    /// resolve the (amount, rate, destination amount) triple from whichever
    /// values the command carries; a triple that does not reconcile within
    /// one destination minor unit aborts as a ledger inconsistency.
    pub async fn transfer(&self, cmd: TransferCmd) -> ResultEngine<Uuid> {
        if cmd.from_account_id == cmd.to_account_id {
            return Err(EngineError::InvalidAmount(
                "from_account_id and to_account_id must differ".to_string(),
            ));
        }
        let TransferCmd {
            from_account_id,
            to_account_id,
            amount_minor,
            rate,
            destination_amount_minor,
            occurred_on,
            note,
        } = cmd;

        let id = with_tx!(self, |db_tx| {
            let from_model = self.require_account(&db_tx, from_account_id).await?;
            let to_model = self.require_account(&db_tx, to_account_id).await?;
            let source = model_currency(&from_model.currency)?;
            let destination = model_currency(&to_model.currency)?;

            if amount_minor <= 0 {
                return Err(EngineError::InvalidAmount(
                    "amount_minor must be > 0".to_string(),
                ));
            }

            let (rate_micro, resolved_destination) = resolve_transfer_triple(
                Amount::new(amount_minor),
                rate,
                destination_amount_minor.map(Amount::new),
                None,
                &source,
                &destination,
            )?;

            let op = Operation::new(
                OperationKind::Transfer,
                from_account_id,
                Some(to_account_id),
                None,
                amount_minor,
                rate_micro,
                Some(resolved_destination.minor()),
                occurred_on,
                normalize_optional_text(note.as_deref()),
            )?;

            let mut deltas: HashMap<Uuid, i64> = HashMap::new();
            for (account, delta) in op.effects() {
                *deltas.entry(account).or_insert(0) += delta;
            }

            operations::ActiveModel::from(&op).insert(&db_tx).await?;
            self.apply_account_deltas(&db_tx, &deltas).await?;

            Ok(op.id)
        })?;
        tracing::debug!(
            operation = %id,
            from = %from_account_id,
            to = %to_account_id,
            "transfer recorded"
        );
        self.publish_reload();
        Ok(id)
    }

    /// Updates an existing operation (amount, category, date, note, and for
    /// transfers the conversion triple).
    ///
    /// The old signed effects are reversed and the new ones applied in the
    /// same transaction, so the balance invariant holds at every commit
    /// point. Adjustment operations are immutable.
    pub async fn update_operation(&self, cmd: UpdateOperationCmd) -> ResultEngine<()> {
        let operation_id = cmd.operation_id;
        with_tx!(self, |db_tx| {
            let model = self.require_operation(&db_tx, operation_id).await?;
            let old = Operation::try_from(model)?;

            if old.kind == OperationKind::Adjustment {
                return Err(EngineError::AdjustmentLocked(
                    "adjustment operations cannot be edited".to_string(),
                ));
            }

            let new_amount = cmd.amount_minor.unwrap_or(old.amount_minor);
            if new_amount <= 0 {
                return Err(EngineError::InvalidAmount(
                    "amount_minor must be > 0".to_string(),
                ));
            }
            let new_occurred_on = cmd.occurred_on.unwrap_or(old.occurred_on);
            let new_note = apply_optional_text_patch(old.note.clone(), cmd.note.as_deref());

            let mut new_op = old.clone();
            new_op.amount_minor = new_amount;
            new_op.occurred_on = new_occurred_on;
            new_op.note = new_note;

            match old.kind {
                OperationKind::Expense | OperationKind::Income => {
                    if cmd.rate.is_some() || cmd.destination_amount_minor.is_some() {
                        return Err(EngineError::InvalidAmount(
                            "invalid update: unexpected transfer fields".to_string(),
                        ));
                    }
                    if let Some(category_id) = cmd.category_id {
                        let flow = if old.kind == OperationKind::Expense {
                            FlowKind::Expense
                        } else {
                            FlowKind::Income
                        };
                        self.require_entry_category(&db_tx, category_id, flow).await?;
                        new_op.category_id = Some(category_id);
                    }
                }
                OperationKind::Transfer => {
                    if cmd.category_id.is_some() {
                        return Err(EngineError::InvalidCategory(
                            "transfers cannot have a category".to_string(),
                        ));
                    }
                    let destination_id = old.destination_account_id.ok_or_else(|| {
                        EngineError::Inconsistent("transfer missing destination".to_string())
                    })?;
                    let from_model = self.require_account(&db_tx, old.account_id).await?;
                    let to_model = self.require_account(&db_tx, destination_id).await?;
                    let source = model_currency(&from_model.currency)?;
                    let destination = model_currency(&to_model.currency)?;

                    let (rate_micro, resolved_destination) = resolve_transfer_triple(
                        Amount::new(new_amount),
                        cmd.rate,
                        cmd.destination_amount_minor.map(Amount::new),
                        old.rate_micro.map(Rate::new),
                        &source,
                        &destination,
                    )?;
                    new_op.rate_micro = rate_micro;
                    new_op.destination_amount_minor = Some(resolved_destination.minor());
                }
                OperationKind::Adjustment => unreachable!("rejected above"),
            }

            let mut deltas: HashMap<Uuid, i64> = HashMap::new();
            for (account, delta) in old.effects() {
                *deltas.entry(account).or_insert(0) -= delta;
            }
            for (account, delta) in new_op.effects() {
                *deltas.entry(account).or_insert(0) += delta;
            }

            let active = operations::ActiveModel {
                id: ActiveValue::Set(operation_id.to_string()),
                amount_minor: ActiveValue::Set(new_op.amount_minor),
                category_id: ActiveValue::Set(new_op.category_id.map(|id| id.to_string())),
                rate_micro: ActiveValue::Set(new_op.rate_micro),
                destination_amount_minor: ActiveValue::Set(new_op.destination_amount_minor),
                occurred_on: ActiveValue::Set(new_op.occurred_on),
                note: ActiveValue::Set(new_op.note.clone()),
                ..Default::default()
            };
            active.update(&db_tx).await?;

            self.apply_account_deltas(&db_tx, &deltas).await?;
            Ok(())
        })?;
        tracing::debug!(operation = %operation_id, "operation updated");
        self.publish_reload();
        Ok(())
    }

    /// Deletes an operation, reversing its signed effect on the account(s)
    /// in the same transaction.
    ///
    /// Adjustment operations may only be deleted on the calendar day they
    /// were created (`today` is caller input, never computed here), so
    /// historical balance corrections cannot be silently erased.
    pub async fn delete_operation(&self, operation_id: Uuid, today: NaiveDate) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let model = self.require_operation(&db_tx, operation_id).await?;
            let op = Operation::try_from(model)?;

            if op.kind == OperationKind::Adjustment && op.occurred_on != today {
                return Err(EngineError::AdjustmentLocked(
                    "adjustments can only be deleted on the day they were created".to_string(),
                ));
            }

            let mut deltas: HashMap<Uuid, i64> = HashMap::new();
            for (account, delta) in op.effects() {
                *deltas.entry(account).or_insert(0) -= delta;
            }

            operations::Entity::delete_by_id(operation_id.to_string())
                .exec(&db_tx)
                .await?;
            self.apply_account_deltas(&db_tx, &deltas).await?;
            Ok(())
        })?;
        tracing::debug!(operation = %operation_id, "operation deleted");
        self.publish_reload();
        Ok(())
    }

    /// Splits an operation: deducts `split_amount_minor` from it and inserts
    /// a sibling of the same kind/account/date under the given category.
    ///
    /// The split only reclassifies category attribution; the net balance
    /// effect is zero. Returns the new sibling's id.
    pub async fn split_operation(&self, cmd: SplitOperationCmd) -> ResultEngine<Uuid> {
        let SplitOperationCmd {
            operation_id,
            split_amount_minor,
            category_id,
        } = cmd;
        let id = with_tx!(self, |db_tx| {
            let model = self.require_operation(&db_tx, operation_id).await?;
            let op = Operation::try_from(model)?;

            match op.kind {
                OperationKind::Expense | OperationKind::Income => {}
                OperationKind::Transfer => {
                    return Err(EngineError::InvalidAmount(
                        "transfers cannot be split".to_string(),
                    ));
                }
                OperationKind::Adjustment => {
                    return Err(EngineError::AdjustmentLocked(
                        "adjustment operations cannot be split".to_string(),
                    ));
                }
            }

            if split_amount_minor <= 0 || split_amount_minor >= op.amount_minor {
                return Err(EngineError::InvalidAmount(
                    "split amount must be > 0 and < the operation amount".to_string(),
                ));
            }

            let flow = if op.kind == OperationKind::Expense {
                FlowKind::Expense
            } else {
                FlowKind::Income
            };
            self.require_entry_category(&db_tx, category_id, flow).await?;

            let sibling = Operation::new(
                op.kind,
                op.account_id,
                None,
                Some(category_id),
                split_amount_minor,
                None,
                None,
                op.occurred_on,
                None,
            )?;

            let original = operations::ActiveModel {
                id: ActiveValue::Set(operation_id.to_string()),
                amount_minor: ActiveValue::Set(op.amount_minor - split_amount_minor),
                ..Default::default()
            };
            original.update(&db_tx).await?;
            operations::ActiveModel::from(&sibling).insert(&db_tx).await?;

            Ok(sibling.id)
        })?;
        tracing::debug!(operation = %operation_id, sibling = %id, "operation split");
        self.publish_reload();
        Ok(id)
    }

    /// Returns a single operation (detail view).
    pub async fn operation(&self, operation_id: Uuid) -> ResultEngine<Operation> {
        with_tx!(self, |db_tx| {
            let model = self.require_operation(&db_tx, operation_id).await?;
            Operation::try_from(model)
        })
    }

    /// Lists recent operations that affect a given account (as source or
    /// destination).
    pub async fn list_operations_for_account(
        &self,
        account_id: Uuid,
        limit: u64,
        filter: &OperationListFilter,
    ) -> ResultEngine<Vec<Operation>> {
        let (items, _next) = self
            .list_operations_for_account_page(account_id, limit, None, filter)
            .await?;
        Ok(items)
    }

    /// Lists recent operations that affect a given account, with
    /// cursor-based pagination.
    ///
    /// Pagination is newest → older by `(occurred_on DESC, operation_id
    /// DESC)`.
    pub async fn list_operations_for_account_page(
        &self,
        account_id: Uuid,
        limit: u64,
        cursor: Option<&str>,
        filter: &OperationListFilter,
    ) -> ResultEngine<(Vec<Operation>, Option<String>)> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            validate_list_filter(filter)?;

            let limit_plus_one = limit.saturating_add(1);
            let mut query = operations::Entity::find()
                .filter(
                    Condition::any()
                        .add(operations::Column::AccountId.eq(account_id.to_string()))
                        .add(
                            operations::Column::DestinationAccountId
                                .eq(account_id.to_string()),
                        ),
                )
                .order_by_desc(operations::Column::OccurredOn)
                .order_by_desc(operations::Column::Id)
                .limit(limit_plus_one);

            if let Some(cursor) = cursor {
                let cursor = OperationsCursor::decode(cursor)?;
                query = query.filter(
                    Condition::any()
                        .add(operations::Column::OccurredOn.lt(cursor.occurred_on))
                        .add(
                            Condition::all()
                                .add(operations::Column::OccurredOn.eq(cursor.occurred_on))
                                .add(operations::Column::Id.lt(cursor.operation_id)),
                        ),
                );
            }
            query = query.apply_op_filters(filter);

            let rows: Vec<operations::Model> = query.all(&db_tx).await?;
            let has_more = rows.len() > limit as usize;

            let mut out: Vec<Operation> = Vec::with_capacity(rows.len().min(limit as usize));
            for model in rows.into_iter().take(limit as usize) {
                out.push(Operation::try_from(model)?);
            }

            let next_cursor = out.last().map(|op| OperationsCursor {
                occurred_on: op.occurred_on,
                operation_id: op.id.to_string(),
            });
            let next_cursor = if has_more {
                next_cursor.map(|c| c.encode()).transpose()?
            } else {
                None
            };

            Ok((out, next_cursor))
        })
    }

    /// Returns `(income_minor, expense_minor)` totals for an account within
    /// `[from, to)`.
    ///
    /// Adjustments and transfers are excluded: summaries report what the user
    /// earned and spent, not corrections or money moved between own accounts.
    pub async fn account_totals(
        &self,
        account_id: Uuid,
        from: NaiveDate,
        to: NaiveDate,
    ) -> ResultEngine<(i64, i64)> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            if from >= to {
                return Err(EngineError::InvalidAmount(
                    "invalid range: from must be < to".to_string(),
                ));
            }

            let rows: Vec<operations::Model> = operations::Entity::find()
                .filter(operations::Column::AccountId.eq(account_id.to_string()))
                .filter(operations::Column::OccurredOn.gte(from))
                .filter(operations::Column::OccurredOn.lt(to))
                .filter(operations::Column::Kind.is_in([
                    OperationKind::Income.as_str(),
                    OperationKind::Expense.as_str(),
                ]))
                .all(&db_tx)
                .await?;

            let mut income_minor = 0i64;
            let mut expense_minor = 0i64;
            for model in rows {
                let op = Operation::try_from(model)?;
                match op.kind {
                    OperationKind::Income => income_minor += op.amount_minor,
                    OperationKind::Expense => expense_minor += op.amount_minor,
                    _ => {}
                }
            }
            Ok((income_minor, expense_minor))
        })
    }
}

/// Resolves the (rate, destination amount) pair of a transfer from whichever
/// values the caller supplied.
///
/// `stored_rate` is the rate already persisted on the operation (updates
/// only); it absorbs sub-epsilon wobble when the destination amount drives
/// the derivation, and serves as the fallback when neither field was edited.
fn resolve_transfer_triple(
    amount: Amount,
    rate: Option<Rate>,
    destination_amount: Option<Amount>,
    stored_rate: Option<Rate>,
    source: &crate::Currency,
    destination: &crate::Currency,
) -> ResultEngine<(Option<i64>, Amount)> {
    if source == destination {
        return Ok((None, amount));
    }

    match (rate, destination_amount) {
        (Some(rate), Some(destination_amount)) => {
            if !rate.is_positive() || !destination_amount.is_positive() {
                return Err(EngineError::InvalidAmount(
                    "rate and destination amount must be > 0".to_string(),
                ));
            }
            if !reconciles(amount, rate, destination_amount, source, destination)? {
                tracing::error!(
                    amount = amount.minor(),
                    rate = rate.micros(),
                    destination = destination_amount.minor(),
                    "transfer triple does not reconcile"
                );
                return Err(EngineError::Inconsistent(
                    "destination amount does not reconcile with rate".to_string(),
                ));
            }
            Ok((Some(rate.micros()), destination_amount))
        }
        (Some(rate), None) => {
            if !rate.is_positive() {
                return Err(EngineError::InvalidAmount(
                    "exchange rate must be > 0".to_string(),
                ));
            }
            let destination_amount = convert_amount(amount, rate, source, destination)?;
            Ok((Some(rate.micros()), destination_amount))
        }
        (None, Some(destination_amount)) => {
            if !destination_amount.is_positive() {
                return Err(EngineError::InvalidAmount(
                    "destination amount must be > 0".to_string(),
                ));
            }
            let recomputed = rate_from_amounts(amount, destination_amount, source, destination)?;
            let rate = match stored_rate {
                Some(stored)
                    if (recomputed.micros() - stored.micros()).abs() <= RATE_EPSILON_MICRO =>
                {
                    stored
                }
                _ => recomputed,
            };
            Ok((Some(rate.micros()), destination_amount))
        }
        (None, None) => {
            let rate = stored_rate.ok_or_else(|| {
                EngineError::InvalidAmount(
                    "exchange rate or destination amount required".to_string(),
                )
            })?;
            let destination_amount = convert_amount(amount, rate, source, destination)?;
            Ok((Some(rate.micros()), destination_amount))
        }
    }
}
