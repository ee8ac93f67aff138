pub mod auth;
pub mod coins;
pub mod config;
pub mod engine;
pub mod http;
pub mod ledger;
pub mod model;
pub mod notify;
pub mod signature;
pub mod store;
pub mod voucher;

pub use coins::Coins;
pub use engine::Ledger;
pub use model::AccountId;
