//! Category tree for classifying operations.
//!
//! Categories form a tree of arbitrary depth. `folder` nodes are purely
//! navigational; only `entry` nodes may be attached to operations. The
//! synthetic shadow category backing adjustment operations is flagged
//! `shadow` and never offered in pickers.

use sea_orm::{ActiveValue, entity::prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::EngineError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Folder,
    Entry,
}

impl CategoryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Folder => "folder",
            Self::Entry => "entry",
        }
    }
}

impl TryFrom<&str> for CategoryKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "folder" => Ok(Self::Folder),
            "entry" => Ok(Self::Entry),
            other => Err(EngineError::InvalidCategory(format!(
                "invalid category kind: {other}"
            ))),
        }
    }
}

/// Whether a category classifies money going out or coming in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowKind {
    Expense,
    Income,
}

impl FlowKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl TryFrom<&str> for FlowKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "expense" => Ok(Self::Expense),
            "income" => Ok(Self::Income),
            other => Err(EngineError::InvalidCategory(format!(
                "invalid flow kind: {other}"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub kind: CategoryKind,
    pub flow: FlowKind,
    pub parent_id: Option<Uuid>,
    /// `true` only for the synthetic category of adjustment operations.
    pub shadow: bool,
}

impl Category {
    pub fn new(name: String, kind: CategoryKind, flow: FlowKind, parent_id: Option<Uuid>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            kind,
            flow,
            parent_id,
            shadow: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub kind: String,
    pub flow: String,
    pub parent_id: Option<String>,
    pub shadow: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::operations::Entity")]
    Operations,
}

impl Related<super::operations::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Operations.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl From<&Category> for ActiveModel {
    fn from(category: &Category) -> Self {
        Self {
            id: ActiveValue::Set(category.id.to_string()),
            name: ActiveValue::Set(category.name.clone()),
            kind: ActiveValue::Set(category.kind.as_str().to_string()),
            flow: ActiveValue::Set(category.flow.as_str().to_string()),
            parent_id: ActiveValue::Set(category.parent_id.map(|id| id.to_string())),
            shadow: ActiveValue::Set(category.shadow),
        }
    }
}

impl TryFrom<Model> for Category {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&model.id)
                .map_err(|_| EngineError::KeyNotFound("category not exists".to_string()))?,
            name: model.name,
            kind: CategoryKind::try_from(model.kind.as_str())?,
            flow: FlowKind::try_from(model.flow.as_str())?,
            parent_id: model
                .parent_id
                .as_deref()
                .map(Uuid::parse_str)
                .transpose()
                .map_err(|_| EngineError::InvalidCategory("invalid parent id".to_string()))?,
            shadow: model.shadow,
        })
    }
}
