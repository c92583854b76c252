pub mod circuit_breaker;
pub mod gateway;
pub mod json_source;
pub mod retry;
