//! `SeaORM` Entity for subscriptions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub order_id: Uuid,
    pub amount: i64,
    pub currency: String,
    pub billing_interval: String,
    pub is_active: bool,
    pub activated_at: Option<DateTimeWithTimeZone>,
    pub next_charge_date: Option<DateTimeWithTimeZone>,
    pub next_period_start: Option<DateTimeWithTimeZone>,
    pub charge_number: i32,
    pub charge_retry_count: i32,
    pub quantity: Option<i32>,
    pub deactivated_at: Option<DateTimeWithTimeZone>,
    pub claim_token: Option<Uuid>,
    pub claim_expires_at: Option<DateTimeWithTimeZone>,
    pub claim_charging: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::orders::Entity",
        from = "Column::OrderId",
        to = "super::orders::Column::Id",
        on_delete = "Cascade"
    )]
    Orders,
}

impl Related<super::orders::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Orders.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
