pub mod currency;
pub mod gateway_response;
pub mod invoicing;
pub mod orders;
pub mod transactions;
