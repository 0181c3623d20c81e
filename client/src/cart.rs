//! # Cart State
//!
//! Local shopping-cart contents, mirrored to the hub as `store:update`
//! messages. A `store:sync` snapshot from the hub replaces the local cart
//! and product catalog.

use crate::manager::ConnectionManager;
use crate::router::Subscription;
use parking_lot::RwLock;
use serde::Deserialize;
use skaia_protocol::{CartItem, Envelope, MessageType, Product, StoreAction, StorePayload};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Default)]
struct CartState {
    items: Vec<CartItem>,
    products: Vec<Product>,
}

#[derive(Clone)]
pub struct CartStore {
    state: Arc<RwLock<CartState>>,
    manager: ConnectionManager,
    user_id: Option<String>,
}

impl CartStore {
    pub fn new(manager: ConnectionManager) -> Self {
        Self {
            state: Arc::new(RwLock::new(CartState::default())),
            manager,
            user_id: None,
        }
    }

    /// Tags outbound updates with `user_id`.
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Starts applying `store:sync` snapshots from the hub.
    pub fn attach(&self) -> Subscription {
        let state = self.state.clone();
        self.manager.on(MessageType::StoreSync, move |payload| {
            match StorePayload::deserialize(payload) {
                Ok(snapshot) => {
                    let mut state = state.write();
                    if let Some(cart) = snapshot.cart {
                        state.items = cart;
                    }
                    if let Some(products) = snapshot.products {
                        state.products = products;
                    }
                }
                Err(e) => warn!(error = %e, "ignoring malformed store:sync payload"),
            }
        })
    }

    /// Adds one unit of `product` and mirrors the change to the hub.
    pub fn add_product(&self, product: &Product) {
        {
            let mut state = self.state.write();
            match state.items.iter_mut().find(|item| item.id == product.id) {
                Some(item) => item.quantity += 1,
                None => state.items.push(CartItem::from(product)),
            }
        }
        self.mirror(&StoreAction::AddToCart {
            product: product.clone(),
        });
    }

    /// Removes the line for `product_id`. Returns `false` if it was not in
    /// the cart.
    pub fn remove(&self, product_id: &str) -> bool {
        let removed = {
            let mut state = self.state.write();
            let before = state.items.len();
            state.items.retain(|item| item.id != product_id);
            state.items.len() != before
        };
        if removed {
            self.mirror(&StoreAction::RemoveFromCart {
                product_id: product_id.to_string(),
            });
        }
        removed
    }

    /// Sets the quantity of an existing line. Zero is ignored; use
    /// [`remove`](Self::remove) instead.
    pub fn set_quantity(&self, product_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return false;
        }
        let mut state = self.state.write();
        match state.items.iter_mut().find(|item| item.id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn items(&self) -> Vec<CartItem> {
        self.state.read().items.clone()
    }

    /// Catalog from the most recent `store:sync`.
    pub fn products(&self) -> Vec<Product> {
        self.state.read().products.clone()
    }

    /// Total number of units, as shown on the header badge.
    pub fn count(&self) -> u32 {
        self.state.read().items.iter().map(|item| item.quantity).sum()
    }

    pub fn total(&self) -> f64 {
        self.state.read().items.iter().map(CartItem::line_total).sum()
    }

    fn mirror(&self, action: &StoreAction) {
        match Envelope::from_payload(MessageType::StoreUpdate, action) {
            Ok(envelope) => {
                let envelope = match &self.user_id {
                    Some(user_id) => envelope.with_user(user_id.clone()),
                    None => envelope,
                };
                self.manager.send(&envelope);
            }
            Err(e) => warn!(error = %e, "failed to encode store update"),
        }
    }
}
