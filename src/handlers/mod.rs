pub mod auth;
pub mod cache;
pub mod clients;
pub mod common;
pub mod invoices;
pub mod orders;
pub mod products;
pub mod stock;
