use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::ProductStore;
use crate::error::AppResult;
use crate::models::{NewProduct, Product};

/// Vec-backed store; insertion order is the Vec order.
#[derive(Default)]
pub struct MemoryProductStore {
    products: RwLock<Vec<Product>>,
}

#[async_trait]
impl ProductStore for MemoryProductStore {
    async fn list(&self) -> AppResult<Vec<Product>> {
        Ok(self.products.read().await.clone())
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Product>> {
        Ok(self.products.read().await.iter().find(|p| p.id == id).cloned())
    }

    async fn insert(&self, product: &NewProduct) -> AppResult<Product> {
        let product = Product {
            id: Uuid::new_v4(),
            name: product.name.clone(),
            price: product.price,
            inventory: product.inventory,
            created_at: product.created_at,
        };
        self.products.write().await.push(product.clone());
        Ok(product)
    }
}
