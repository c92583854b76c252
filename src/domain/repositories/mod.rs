pub mod ledger_gateway;
pub mod transaction_source;
