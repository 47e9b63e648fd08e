//! Cart service
use std::sync::Arc;

use tracing::{info, instrument};
use uuid::Uuid;

use crate::domain::aggregates::{Cart, CartCommand, CustomerContext};
use crate::store::CommerceStore;
use crate::Result;

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CommerceStore>,
}

impl CartService {
    pub fn new(store: Arc<dyn CommerceStore>) -> Self {
        Self { store }
    }

    /// Called once when a customer registers.
    #[instrument(skip(self))]
    pub async fn create_cart(&self, customer_id: Uuid) -> Result<Cart> {
        let cart = self.store.create_cart(customer_id).await?;
        info!(cart_id = %cart.id(), "cart created");
        Ok(cart)
    }

    pub async fn get_cart(&self, customer: &CustomerContext) -> Result<Cart> {
        self.store.load_cart(customer.user_id).await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.user_id))]
    pub async fn add_item(&self, customer: &CustomerContext, product_id: Uuid, quantity: i64) -> Result<Cart> {
        self.apply(customer, CartCommand::AddItem { product_id, quantity }).await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.user_id))]
    pub async fn update_quantity(&self, customer: &CustomerContext, item_id: Uuid, quantity: i64) -> Result<Cart> {
        self.apply(customer, CartCommand::UpdateQuantity { item_id, quantity }).await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.user_id))]
    pub async fn set_selection(&self, customer: &CustomerContext, item_id: Uuid, selected: bool) -> Result<Cart> {
        self.apply(customer, CartCommand::SetSelection { item_id, selected }).await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.user_id))]
    pub async fn select_all(&self, customer: &CustomerContext, selected: bool) -> Result<Cart> {
        self.apply(customer, CartCommand::SelectAll { selected }).await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.user_id))]
    pub async fn remove_item(&self, customer: &CustomerContext, item_id: Uuid) -> Result<Cart> {
        self.apply(customer, CartCommand::RemoveItem { item_id }).await
    }

    #[instrument(skip(self, customer), fields(customer_id = %customer.user_id))]
    pub async fn clear(&self, customer: &CustomerContext) -> Result<Cart> {
        self.apply(customer, CartCommand::Clear).await
    }

    /// The cart as it would be checked out: selected items only.
    pub async fn checkout_items(&self, customer: &CustomerContext) -> Result<Cart> {
        let cart = self.store.load_cart(customer.user_id).await?;
        let selected = cart.selected_items().cloned().collect();
        Ok(Cart::from_parts(cart.id(), cart.customer_id(), cart.total(), selected, cart.created_at(), cart.updated_at()))
    }

    pub async fn item_count(&self, customer: &CustomerContext) -> Result<u64> {
        Ok(self.store.load_cart(customer.user_id).await?.item_count())
    }

    async fn apply(&self, customer: &CustomerContext, command: CartCommand) -> Result<Cart> {
        let (cart, change) = self.store.apply_cart_command(customer.user_id, &command).await?;
        info!(?change, total = %cart.total(), "cart updated");
        Ok(cart)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::{CartError, Product};
    use crate::domain::value_objects::Money;
    use crate::store::MemoryStore;
    use crate::CommerceError;

    async fn service() -> (CartService, CustomerContext, Product) {
        let store = Arc::new(MemoryStore::new());
        let product = Product::create("Siro ho", Money::new(45_000), 3);
        store.insert_product(product.clone()).await;
        let service = CartService::new(store);
        let customer = CustomerContext::customer(Uuid::new_v4(), "c@example.vn");
        service.create_cart(customer.user_id).await.unwrap();
        (service, customer, product)
    }

    #[tokio::test]
    async fn test_checkout_items_only_lists_selected() {
        let (service, customer, product) = service().await;
        let cart = service.add_item(&customer, product.id(), 2).await.unwrap();
        assert_eq!(service.checkout_items(&customer).await.unwrap().items().len(), 0);

        let item = cart.items()[0].id;
        service.set_selection(&customer, item, true).await.unwrap();
        let checkout = service.checkout_items(&customer).await.unwrap();
        assert_eq!(checkout.items().len(), 1);
        assert_eq!(checkout.total(), Money::new(90_000));
        assert_eq!(service.item_count(&customer).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_over_stock_add_is_rejected() {
        let (service, customer, product) = service().await;
        let err = service.add_item(&customer, product.id(), 4).await.unwrap_err();
        assert!(matches!(err, CommerceError::Cart(CartError::InsufficientStock { available: 3, .. })));
        assert!(service.get_cart(&customer).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_items_of_other_carts_are_not_found() {
        let (service, customer, product) = service().await;
        let cart = service.add_item(&customer, product.id(), 1).await.unwrap();
        let other = CustomerContext::customer(Uuid::new_v4(), "d@example.vn");
        service.create_cart(other.user_id).await.unwrap();
        let err = service.remove_item(&other, cart.items()[0].id).await.unwrap_err();
        assert!(matches!(err, CommerceError::Cart(CartError::ItemNotFound(_))));
    }
}
