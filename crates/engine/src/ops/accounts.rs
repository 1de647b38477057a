use chrono::NaiveDate;
use std::collections::HashSet;
use uuid::Uuid;

use sea_orm::{
    ActiveValue, Condition, QueryFilter, QueryOrder, TransactionTrait, prelude::*,
    sea_query::Expr,
};

use crate::{
    Account, Currency, EngineError, Operation, OperationKind, ResultEngine, accounts, operations,
};

use super::{Engine, model_currency, normalize_required_name, parse_model_uuid, with_tx};

impl Engine {
    /// Return an account snapshot from DB.
    pub async fn account(&self, account_id: Uuid) -> ResultEngine<Account> {
        with_tx!(self, |db_tx| {
            let model = self.require_account(&db_tx, account_id).await?;
            Account::try_from(model)
        })
    }

    /// Lists accounts ordered by display position.
    pub async fn list_accounts(&self, include_hidden: bool) -> ResultEngine<Vec<Account>> {
        with_tx!(self, |db_tx| {
            let mut query = accounts::Entity::find()
                .order_by_asc(accounts::Column::Position)
                .order_by_asc(accounts::Column::Id);
            if !include_hidden {
                query = query.filter(accounts::Column::Hidden.eq(false));
            }
            let models = query.all(&db_tx).await?;
            let mut out = Vec::with_capacity(models.len());
            for model in models {
                out.push(Account::try_from(model)?);
            }
            Ok(out)
        })
    }

    /// Add a new account.
    ///
    /// `opening_balance_minor` is the seed the balance starts from; it is not
    /// an operation and survives history reconstruction as the base value.
    pub async fn new_account(
        &self,
        name: &str,
        currency: Currency,
        opening_balance_minor: i64,
    ) -> ResultEngine<Uuid> {
        let name = normalize_required_name(name, "account")?;
        let id = with_tx!(self, |db_tx| {
            let exists = accounts::Entity::find()
                .filter(Expr::cust("LOWER(name)").eq(name.to_lowercase()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(name.to_string()));
            }

            let next_position = accounts::Entity::find()
                .order_by_desc(accounts::Column::Position)
                .one(&db_tx)
                .await?
                .map_or(0, |model| model.position + 1);

            let account = Account::new(name.clone(), currency, opening_balance_minor, next_position);
            let account_id = account.id;
            accounts::ActiveModel::from(&account).insert(&db_tx).await?;
            Ok(account_id)
        })?;
        tracing::info!(account = %id, "account created");
        Ok(id)
    }

    /// Renames an existing account. Does not touch the ledger.
    pub async fn rename_account(&self, account_id: Uuid, new_name: &str) -> ResultEngine<()> {
        let new_name = normalize_required_name(new_name, "account")?;
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;

            let exists = accounts::Entity::find()
                .filter(Expr::cust("LOWER(name)").eq(new_name.to_lowercase()))
                .filter(accounts::Column::Id.ne(account_id.to_string()))
                .one(&db_tx)
                .await?
                .is_some();
            if exists {
                return Err(EngineError::ExistingKey(new_name));
            }

            let active = accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                name: ActiveValue::Set(new_name),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Changes an account's currency code in place. Does not touch the
    /// ledger: existing minor-unit values are reinterpreted, not converted.
    pub async fn set_account_currency(
        &self,
        account_id: Uuid,
        currency: Currency,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            let active = accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                currency: ActiveValue::Set(currency.code().to_string()),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Hides/unhides an account in listings. Does not touch the ledger.
    pub async fn set_account_hidden(&self, account_id: Uuid, hidden: bool) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.require_account(&db_tx, account_id).await?;
            let active = accounts::ActiveModel {
                id: ActiveValue::Set(account_id.to_string()),
                hidden: ActiveValue::Set(hidden),
                ..Default::default()
            };
            active.update(&db_tx).await?;
            Ok(())
        })
    }

    /// Remaps display positions to the given order. Pure presentation: every
    /// account must appear exactly once, and no balance is touched.
    pub async fn reorder_accounts(&self, order: &[Uuid]) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            let models = accounts::Entity::find().all(&db_tx).await?;
            if models.len() != order.len() {
                return Err(EngineError::InvalidAmount(
                    "reorder must list every account exactly once".to_string(),
                ));
            }
            let mut known: HashSet<Uuid> = HashSet::with_capacity(models.len());
            for model in &models {
                known.insert(parse_model_uuid(&model.id, "account")?);
            }
            for id in order {
                if !known.remove(id) {
                    return Err(EngineError::KeyNotFound("account not exists".to_string()));
                }
            }

            for (index, id) in order.iter().enumerate() {
                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(id.to_string()),
                    position: ActiveValue::Set(index as i32),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
            }
            Ok(())
        })
    }

    /// Sets an account balance directly, recording the difference as an
    /// adjustment ("shadow") operation dated `today`.
    ///
    /// If an adjustment for `today` already exists, the delta folds into it;
    /// an adjustment whose delta reaches zero is removed. The stored balance
    /// lands exactly on `target_minor`.
    pub async fn set_account_balance(
        &self,
        account_id: Uuid,
        target_minor: i64,
        today: NaiveDate,
    ) -> ResultEngine<()> {
        let changed = with_tx!(self, |db_tx| {
            let account_model = self.require_account(&db_tx, account_id).await?;
            let delta = target_minor - account_model.balance_minor;
            if delta == 0 {
                Ok(false)
            } else {
                let existing = operations::Entity::find()
                    .filter(operations::Column::AccountId.eq(account_id.to_string()))
                    .filter(operations::Column::Kind.eq(OperationKind::Adjustment.as_str()))
                    .filter(operations::Column::OccurredOn.eq(today))
                    .one(&db_tx)
                    .await?;

                match existing {
                    Some(model) => {
                        let folded = model.amount_minor + delta;
                        if folded == 0 {
                            operations::Entity::delete_by_id(model.id).exec(&db_tx).await?;
                        } else {
                            let active = operations::ActiveModel {
                                id: ActiveValue::Set(model.id),
                                amount_minor: ActiveValue::Set(folded),
                                ..Default::default()
                            };
                            active.update(&db_tx).await?;
                        }
                    }
                    None => {
                        let shadow_category = self.shadow_category_id(&db_tx).await?;
                        let op = Operation::new(
                            OperationKind::Adjustment,
                            account_id,
                            None,
                            Some(shadow_category),
                            delta,
                            None,
                            None,
                            today,
                            None,
                        )?;
                        operations::ActiveModel::from(&op).insert(&db_tx).await?;
                    }
                }

                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(account_id.to_string()),
                    balance_minor: ActiveValue::Set(target_minor),
                    ..Default::default()
                };
                active.update(&db_tx).await?;
                Ok(true)
            }
        })?;
        if changed {
            tracing::info!(account = %account_id, balance = target_minor, "balance adjusted");
            self.publish_reload();
        }
        Ok(())
    }

    /// Deletes an account.
    ///
    /// With zero operations the row is removed directly. Otherwise
    /// `transfer_to` must name a distinct account of the **same currency**;
    /// every operation referencing the deleted account is re-homed onto it,
    /// and its balance grows by the re-homed operations' signed effects plus
    /// the deleted account's opening seed, so no historical total is lost.
    /// Re-homing, the balance update, and the account removal commit in one
    /// transaction.
    ///
    /// Refusals are named so callers can react: [`EngineError::NoSameCurrencyTarget`]
    /// when no candidate account shares the currency (prompt the user to
    /// create one), [`EngineError::TransferTargetRequired`] when candidates
    /// exist but none was chosen.
    pub async fn delete_account(
        &self,
        account_id: Uuid,
        transfer_to: Option<Uuid>,
    ) -> ResultEngine<()> {
        let rehomed = with_tx!(self, |db_tx| {
            let account_model = self.require_account(&db_tx, account_id).await?;
            let currency = model_currency(&account_model.currency)?;

            let referencing: Vec<operations::Model> = operations::Entity::find()
                .filter(
                    Condition::any()
                        .add(operations::Column::AccountId.eq(account_id.to_string()))
                        .add(
                            operations::Column::DestinationAccountId
                                .eq(account_id.to_string()),
                        ),
                )
                .all(&db_tx)
                .await?;

            if referencing.is_empty() {
                accounts::Entity::delete_by_id(account_id.to_string())
                    .exec(&db_tx)
                    .await?;
                Ok(false)
            } else {
                let target_id = match transfer_to {
                    Some(target_id) => target_id,
                    None => {
                        let candidate = accounts::Entity::find()
                            .filter(accounts::Column::Id.ne(account_id.to_string()))
                            .filter(accounts::Column::Currency.eq(currency.code()))
                            .one(&db_tx)
                            .await?;
                        return Err(match candidate {
                            Some(_) => EngineError::TransferTargetRequired(
                                account_model.name.clone(),
                            ),
                            None => {
                                EngineError::NoSameCurrencyTarget(currency.code().to_string())
                            }
                        });
                    }
                };

                if target_id == account_id {
                    return Err(EngineError::InvalidAmount(
                        "transfer target must be a different account".to_string(),
                    ));
                }
                let target_model = self.require_account(&db_tx, target_id).await?;
                let target_currency = model_currency(&target_model.currency)?;
                if target_currency != currency {
                    return Err(EngineError::CurrencyMismatch(format!(
                        "account currency is {}, got {}",
                        currency.code(),
                        target_currency.code()
                    )));
                }

                // The deleted account's share of each operation moves onto
                // the target, together with its opening seed, so the balance
                // invariant keeps holding on the survivor.
                let mut rehomed_delta = account_model.opening_balance_minor;
                for model in &referencing {
                    let op = Operation::try_from(model.clone())?;
                    rehomed_delta += op.effect_on(account_id);
                }

                for model in referencing {
                    let mut active = operations::ActiveModel {
                        id: ActiveValue::Set(model.id.clone()),
                        ..Default::default()
                    };
                    if model.account_id == account_id.to_string() {
                        active.account_id = ActiveValue::Set(target_id.to_string());
                    }
                    if model.destination_account_id.as_deref()
                        == Some(account_id.to_string().as_str())
                    {
                        active.destination_account_id =
                            ActiveValue::Set(Some(target_id.to_string()));
                    }
                    active.update(&db_tx).await?;
                }

                let new_balance = target_model
                    .balance_minor
                    .checked_add(rehomed_delta)
                    .ok_or_else(|| EngineError::Inconsistent("balance overflow".to_string()))?;
                let active = accounts::ActiveModel {
                    id: ActiveValue::Set(target_id.to_string()),
                    balance_minor: ActiveValue::Set(new_balance),
                    opening_balance_minor: ActiveValue::Set(
                        target_model.opening_balance_minor + account_model.opening_balance_minor,
                    ),
                    ..Default::default()
                };
                active.update(&db_tx).await?;

                accounts::Entity::delete_by_id(account_id.to_string())
                    .exec(&db_tx)
                    .await?;
                Ok(true)
            }
        })?;
        tracing::info!(account = %account_id, rehomed, "account deleted");
        if rehomed {
            self.publish_reload();
        }
        Ok(())
    }
}
