//! Ownership Checks
//!
//! Whether a resource belongs to a seller, answered independently of how the
//! resource was queried.

use uuid::Uuid;

use crate::error::Result;
use crate::store::{AccountDirectory, SaleStore};

pub async fn owns_sale(store: &dyn SaleStore, sale_id: Uuid, seller_id: &str) -> Result<bool> {
    Ok(store
        .get_sale(sale_id)
        .await?
        .is_some_and(|sale| sale.seller_id == seller_id))
}

pub async fn owns_event(store: &dyn SaleStore, event_id: Uuid, seller_id: &str) -> Result<bool> {
    Ok(store
        .get_event(event_id)
        .await?
        .is_some_and(|event| event.seller_id == seller_id))
}

pub async fn owns_product(
    directory: &dyn AccountDirectory,
    product_id: &str,
    seller_id: &str,
) -> Result<bool> {
    Ok(directory
        .product(product_id)
        .await?
        .is_some_and(|product| product.seller_id == seller_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryAccountDirectory, MemorySaleStore};
    use crate::model::{Buyer, DeliveryType, GatewayKind, PaymentMethod, Product, Sale};
    use rust_decimal_macros::dec;

    fn product() -> Product {
        Product {
            id: "prod_1".into(),
            seller_id: "seller_1".into(),
            name: "Ebook".into(),
            price: dec!(19.90),
            delivery: DeliveryType::EmailOnly,
            active: true,
            delivery_url: None,
        }
    }

    #[tokio::test]
    async fn test_sale_ownership() {
        let store = MemorySaleStore::new();
        let buyer = Buyer {
            name: "Rui".into(),
            email: "rui@example.com".into(),
            document: None,
            phone: None,
        };
        let sale = Sale::new(&product(), buyer, dec!(19.90), GatewayKind::Beehive, PaymentMethod::Pix);
        store.insert_sale(&sale).await.unwrap();

        assert!(owns_sale(&store, sale.id, "seller_1").await.unwrap());
        assert!(!owns_sale(&store, sale.id, "seller_2").await.unwrap());
        assert!(!owns_sale(&store, Uuid::new_v4(), "seller_1").await.unwrap());
    }

    #[tokio::test]
    async fn test_product_ownership() {
        let directory = MemoryAccountDirectory::new().with_product(product());
        assert!(owns_product(&directory, "prod_1", "seller_1").await.unwrap());
        assert!(!owns_product(&directory, "prod_1", "seller_2").await.unwrap());
    }
}
