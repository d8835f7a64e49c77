//! `SeaORM` Entity for transactions table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub transaction_group: Uuid,
    pub entry_type: String,
    pub kind: String,
    pub amount: i64,
    pub currency: String,
    pub amount_in_host_currency: i64,
    pub host_currency: String,
    #[sea_orm(column_type = "Decimal(Some((19, 10)))")]
    pub host_currency_fx_rate: Decimal,
    pub net_amount_in_collective_currency: i64,
    pub tax_amount: i64,
    pub from_account_id: Uuid,
    pub to_account_id: Uuid,
    pub host_account_id: Uuid,
    pub order_id: Option<Uuid>,
    pub expense_id: Option<Uuid>,
    pub is_refund: bool,
    pub is_debt: bool,
    pub refund_transaction_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub cleared_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "JsonBinary")]
    pub data: Json,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::RefundTransactionId",
        to = "Column::Id"
    )]
    RefundedTransaction,
}

impl ActiveModelBehavior for ActiveModel {}
