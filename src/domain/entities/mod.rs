pub mod activity;
pub mod transaction;
