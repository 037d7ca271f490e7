pub mod category;
pub mod company;
pub mod quote;
pub mod recurring;
pub mod transaction;
pub mod user;

pub use category::Category;
pub use company::Company;
pub use quote::{Quote, QuoteItem, QuoteTemplate};
pub use recurring::RecurringTransaction;
pub use transaction::Transaction;
pub use user::User;
