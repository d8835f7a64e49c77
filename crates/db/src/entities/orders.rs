//! `SeaORM` Entity for orders table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub contributor_account_id: Uuid,
    pub collective_account_id: Uuid,
    pub host_account_id: Uuid,
    pub host_currency: String,
    pub host_country: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((7, 4)))", nullable)]
    pub host_fee_percent: Option<Decimal>,
    pub total_amount: i64,
    pub currency: String,
    pub platform_tip: i64,
    pub expected_amount: Option<i64>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub tax: Option<Json>,
    #[sea_orm(column_type = "Decimal(Some((7, 4)))", nullable)]
    pub tier_host_fee_percent: Option<Decimal>,
    #[sea_orm(column_type = "JsonBinary", nullable)]
    pub payment_method: Option<Json>,
    pub status: String,
    pub subscription_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_one = "super::subscriptions::Entity")]
    Subscriptions,
}

impl Related<super::subscriptions::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Subscriptions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
