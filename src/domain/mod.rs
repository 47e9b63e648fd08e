//! Checkout domain: aggregates, value objects, pricing and order placement.
pub mod aggregates;
pub mod checkout;
pub mod events;
pub mod pricing;
pub mod value_objects;
