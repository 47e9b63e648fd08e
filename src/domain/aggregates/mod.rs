//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;
pub mod customer;

pub use product::{Product, ProductError};
pub use order::{Order, OrderCommand, OrderDetail, OrderError, OrderStatus, PaymentMethod, PaymentStatus, Transition};
pub use cart::{Cart, CartChange, CartCommand, CartError, CartItem};
pub use customer::{CustomerContext, DeliveryProfile, Role};
