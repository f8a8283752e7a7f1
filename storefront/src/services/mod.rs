// storefront/src/services/mod.rs

pub mod checkout;
pub mod entitlements;
pub mod notifier;
pub mod reconciler;
pub mod reconciliation;
