//! Operation primitives.
//!
//! An `Operation` is a single ledger entry: an expense, an income, a transfer
//! between two accounts, or a system-generated adjustment (a manual balance
//! correction). Every balance change in the engine is the signed effect of an
//! operation; see [`Operation::effects`].
//!
//! Amounts are stored as integer **minor units** of the source account's
//! currency. Transfers additionally carry a destination amount in the
//! destination account's currency and, when the currencies differ, the
//! exchange rate as integer micro-units.

use chrono::NaiveDate;
use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Expense,
    Income,
    Transfer,
    /// Manual balance correction. Dated the day it is created, carries a
    /// signed amount, and may only be deleted that same day.
    Adjustment,
}

impl OperationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
            Self::Transfer => "transfer",
            Self::Adjustment => "adjustment",
        }
    }
}

impl TryFrom<&str> for OperationKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            "transfer" => Ok(Self::Transfer),
            "adjustment" => Ok(Self::Adjustment),
            other => Err(EngineError::InvalidAmount(format!(
                "invalid operation kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    pub id: Uuid,
    pub kind: OperationKind,
    /// Source account; the only account for non-transfers.
    pub account_id: Uuid,
    /// Destination account (transfers only).
    pub destination_account_id: Option<Uuid>,
    /// Category (non-transfers only; adjustments use the shadow category).
    pub category_id: Option<Uuid>,
    /// Minor units of the source account's currency. Positive for every kind
    /// except `Adjustment`, whose amount is the signed balance delta.
    pub amount_minor: i64,
    /// Exchange rate in micro-units (cross-currency transfers only).
    pub rate_micro: Option<i64>,
    /// Minor units of the destination account's currency (transfers only).
    pub destination_amount_minor: Option<i64>,
    pub occurred_on: NaiveDate,
    pub note: Option<String>,
}

impl Operation {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: OperationKind,
        account_id: Uuid,
        destination_account_id: Option<Uuid>,
        category_id: Option<Uuid>,
        amount_minor: i64,
        rate_micro: Option<i64>,
        destination_amount_minor: Option<i64>,
        occurred_on: NaiveDate,
        note: Option<String>,
    ) -> Result<Self, EngineError> {
        match kind {
            OperationKind::Adjustment => {
                if amount_minor == 0 {
                    return Err(EngineError::InvalidAmount(
                        "adjustment delta must not be 0".to_string(),
                    ));
                }
            }
            _ => {
                if amount_minor <= 0 {
                    return Err(EngineError::InvalidAmount(
                        "amount_minor must be > 0".to_string(),
                    ));
                }
            }
        }
        Ok(Self {
            id: Uuid::new_v4(),
            kind,
            account_id,
            destination_account_id,
            category_id,
            amount_minor,
            rate_micro,
            destination_amount_minor,
            occurred_on,
            note,
        })
    }

    /// Signed balance deltas this operation applies, one `(account, delta)`
    /// pair per affected account. Reversing an operation is applying the
    /// negated deltas.
    #[must_use]
    pub fn effects(&self) -> Vec<(Uuid, i64)> {
        match self.kind {
            OperationKind::Expense => vec![(self.account_id, -self.amount_minor)],
            OperationKind::Income => vec![(self.account_id, self.amount_minor)],
            OperationKind::Adjustment => vec![(self.account_id, self.amount_minor)],
            OperationKind::Transfer => {
                let destination_amount = self
                    .destination_amount_minor
                    .unwrap_or(self.amount_minor);
                let mut effects = vec![(self.account_id, -self.amount_minor)];
                if let Some(destination) = self.destination_account_id {
                    effects.push((destination, destination_amount));
                }
                effects
            }
        }
    }

    /// Signed effect of this operation on one specific account.
    #[must_use]
    pub fn effect_on(&self, account_id: Uuid) -> i64 {
        self.effects()
            .into_iter()
            .filter(|(account, _)| *account == account_id)
            .map(|(_, delta)| delta)
            .sum()
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "operations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub kind: String,
    pub account_id: String,
    pub destination_account_id: Option<String>,
    pub category_id: Option<String>,
    pub amount_minor: i64,
    pub rate_micro: Option<i64>,
    pub destination_amount_minor: Option<i64>,
    pub occurred_on: Date,
    pub note: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountId",
        to = "super::accounts::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Accounts,
    #[sea_orm(
        belongs_to = "super::categories::Entity",
        from = "Column::CategoryId",
        to = "super::categories::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Categories,
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::categories::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Categories.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Operation> for ActiveModel {
    fn from(op: &Operation) -> Self {
        Self {
            id: ActiveValue::Set(op.id.to_string()),
            kind: ActiveValue::Set(op.kind.as_str().to_string()),
            account_id: ActiveValue::Set(op.account_id.to_string()),
            destination_account_id: ActiveValue::Set(
                op.destination_account_id.map(|id| id.to_string()),
            ),
            category_id: ActiveValue::Set(op.category_id.map(|id| id.to_string())),
            amount_minor: ActiveValue::Set(op.amount_minor),
            rate_micro: ActiveValue::Set(op.rate_micro),
            destination_amount_minor: ActiveValue::Set(op.destination_amount_minor),
            occurred_on: ActiveValue::Set(op.occurred_on),
            note: ActiveValue::Set(op.note.clone()),
        }
    }
}

impl TryFrom<Model> for Operation {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("operation not exists".to_string()))?,
            kind: OperationKind::try_from(model.kind.as_str())?,
            account_id: Uuid::parse_str(&model.account_id)
                .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?,
            destination_account_id: model
                .destination_account_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| EngineError::KeyNotFound("account not exists".to_string()))?,
            category_id: model
                .category_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| EngineError::InvalidCategory("invalid category id".to_string()))?,
            amount_minor: model.amount_minor,
            rate_micro: model.rate_micro,
            destination_amount_minor: model.destination_amount_minor,
            occurred_on: model.occurred_on,
            note: model.note,
        })
    }
}
