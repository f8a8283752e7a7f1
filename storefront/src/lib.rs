// storefront/src/lib.rs

//! licenseshop: order–payment orchestration for a software-license storefront.
//!
//! A checkout persists a `pending` order with its items, charges it through the payment
//! gateway (card or PIX), maps the processor's answer onto the order and issues licenses
//! once the payment is approved. Orders left pending are advanced later by the
//! reconciliation pipeline, driven by payment notifications and a periodic sweep.

pub mod config;
pub mod errors;
pub mod gateway;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod store;
pub mod web;
