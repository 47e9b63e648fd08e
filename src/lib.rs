//! Pharmacy Checkout
//!
//! Cart-to-order transaction engine for an online pharmacy storefront.
//!
//! ## Features
//! - Per-customer cart with selection and a running selected total
//! - Atomic checkout: order snapshot, stock decrement, cart consumption
//! - VNPay redirect signing and callback reconciliation
//! - Best-effort order confirmation mail
//! - Staff order lifecycle and reporting

pub mod api;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod notification;
pub mod payment;
pub mod services;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use domain::aggregates::cart::CartError;
pub use domain::aggregates::order::OrderError;
pub use domain::aggregates::product::ProductError;
pub use notification::NotificationError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum CommerceError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Product(#[from] ProductError),

    #[error("cart not found")]
    CartNotFound,

    #[error("cart already exists for this customer")]
    CartAlreadyExists,

    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("delivery profile {0} not found")]
    ProfileNotFound(Uuid),

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("authentication required")]
    Unauthenticated,

    #[error("invalid payment signature")]
    InvalidSignature,

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Coarse classification used for HTTP mapping and logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Forbidden,
    Unauthenticated,
    Security,
    Transient,
    Internal,
}

impl CommerceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommerceError::Cart(e) => match e {
                CartError::InvalidQuantity(_) | CartError::EmptyCheckoutSelection => ErrorKind::Validation,
                CartError::InsufficientStock { .. } | CartError::OutOfStock { .. } => ErrorKind::Conflict,
                CartError::ItemNotFound(_) | CartError::ProductNotFound(_) => ErrorKind::NotFound,
            },
            CommerceError::Order(e) => match e {
                OrderError::UnknownValue { .. } => ErrorKind::Validation,
                OrderError::InvalidTransition { .. }
                | OrderError::NotCancellable(_)
                | OrderError::NotGatewayOrder(_)
                | OrderError::AmountMismatch { .. } => ErrorKind::Conflict,
            },
            CommerceError::Product(_) | CommerceError::CartAlreadyExists => ErrorKind::Conflict,
            CommerceError::CartNotFound | CommerceError::OrderNotFound(_) | CommerceError::ProfileNotFound(_) => {
                ErrorKind::NotFound
            }
            CommerceError::Validation(_) => ErrorKind::Validation,
            CommerceError::Forbidden(_) => ErrorKind::Forbidden,
            CommerceError::Unauthenticated => ErrorKind::Unauthenticated,
            CommerceError::InvalidSignature => ErrorKind::Security,
            CommerceError::Notification(_) => ErrorKind::Transient,
            CommerceError::Storage(_) | CommerceError::Database(_) => ErrorKind::Internal,
        }
    }
}

pub type Result<T> = std::result::Result<T, CommerceError>;
