//! Orders, expenses and the services that pay them.
//!
//! `OrderService` charges a contribution and records it in the ledger; it is
//! also the collaborator the billing scheduler charges recurring orders
//! through. `ExpenseService` pays a collective's expenses out, after checking
//! the collective can cover them.

mod expense_service;
mod order_service;
mod types;

pub use expense_service::{ExpenseFees, ExpenseService, PayExpenseOutcome, PayoutMethod};
pub use order_service::{ExecutedOrder, OrderService};
pub use types::{Expense, ExpenseStatus, Host, Order, OrderStatus};
