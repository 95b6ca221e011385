//! Product fetch and publication.

use rust_decimal::Decimal;
use serde::Deserialize;
use shopfleet_core::{
    InventoryItemId, InventoryPolicy, ProductStatus, ShopifyProductId, ShopifyVariantId,
};
use tracing::instrument;

use super::{AdminClient, Connection, UserError, queries, user_error_message};
use crate::shopify::{ImagePayload, OptionPayload, ProductPayload, ShopifyError, VariantPayload};

#[derive(Debug, Deserialize)]
struct ProductData {
    product: Option<ProductNode>,
}

#[derive(Debug, Deserialize)]
struct ProductNode {
    id: ShopifyProductId,
    title: String,
    handle: String,
    status: ProductStatus,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    options: Vec<ProductOption>,
    #[serde(default)]
    images: Connection<ImageNode>,
    #[serde(default)]
    variants: Connection<VariantNode>,
}

#[derive(Debug, Deserialize)]
struct ProductOption {
    name: String,
    position: usize,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ImageNode {
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VariantNode {
    id: ShopifyVariantId,
    #[serde(default)]
    sku: Option<String>,
    price: Decimal,
    #[serde(default)]
    inventory_quantity: Option<i64>,
    #[serde(default)]
    inventory_policy: InventoryPolicy,
    #[serde(default)]
    inventory_item: Option<InventoryItemRef>,
    #[serde(default)]
    selected_options: Vec<SelectedOption>,
    #[serde(default)]
    image: Option<ImageNode>,
}

#[derive(Debug, Deserialize)]
struct InventoryItemRef {
    id: InventoryItemId,
}

#[derive(Debug, Deserialize)]
struct SelectedOption {
    name: String,
    value: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishData {
    publishable_publish: Option<PublishPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PublishPayload {
    #[serde(default)]
    user_errors: Vec<UserError>,
}

/// Reshape a GraphQL product into the webhook payload shape.
fn convert_product(product: ProductNode) -> ProductPayload {
    let options = &product.options;
    let option_value = |variant: &VariantNode, position: usize| {
        let name = &options.iter().find(|o| o.position == position)?.name;
        variant
            .selected_options
            .iter()
            .find(|s| &s.name == name)
            .map(|s| s.value.clone())
    };

    let mut images: Vec<ImagePayload> = product
        .images
        .nodes
        .iter()
        .map(|i| ImagePayload {
            id: None,
            src: i.url.clone(),
            variant_ids: vec![],
        })
        .collect();

    let variants = product
        .variants
        .nodes
        .iter()
        .map(|v| {
            if let Some(image) = &v.image {
                images.push(ImagePayload {
                    id: None,
                    src: image.url.clone(),
                    variant_ids: vec![v.id.as_u64()],
                });
            }
            VariantPayload {
                id: v.id,
                sku: v.sku.clone(),
                price: v.price,
                option1: option_value(v, 1),
                option2: option_value(v, 2),
                option3: option_value(v, 3),
                inventory_quantity: v.inventory_quantity,
                inventory_item_id: v.inventory_item.as_ref().map(|i| i.id),
                inventory_policy: Some(v.inventory_policy),
                image_id: None,
            }
        })
        .collect();

    ProductPayload {
        id: product.id,
        title: product.title,
        handle: Some(product.handle),
        status: Some(product.status),
        tags: product.tags,
        variants,
        options: product
            .options
            .into_iter()
            .map(|o| OptionPayload {
                name: o.name,
                position: Some(o.position),
                values: o.values,
            })
            .collect(),
        images,
    }
}

impl AdminClient {
    /// Get a product by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(
        &self,
        id: ShopifyProductId,
    ) -> Result<Option<ProductPayload>, ShopifyError> {
        let data: ProductData = self
            .execute(queries::PRODUCT, serde_json::json!({ "id": id.to_gid() }))
            .await?;

        Ok(data.product.map(convert_product))
    }

    /// Publish a product to the online store channel.
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::UserError` if Shopify rejects the publication.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn publish_to_online_store(&self, id: ShopifyProductId) -> Result<(), ShopifyError> {
        let publication_id = self.online_store_publication().await?;

        let data: PublishData = self
            .execute(
                queries::PUBLISHABLE_PUBLISH,
                serde_json::json!({
                    "id": id.to_gid(),
                    "input": [{ "publicationId": publication_id }],
                }),
            )
            .await?;

        if let Some(payload) = data.publishable_publish
            && let Some(message) = user_error_message(&payload.user_errors)
        {
            return Err(ShopifyError::UserError(message));
        }

        tracing::info!("Published product to online store");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_product_maps_options_by_name() {
        let data: ProductData = serde_json::from_value(serde_json::json!({
            "product": {
                "id": "gid://shopify/Product/42",
                "title": "Classic Tee",
                "handle": "classic-tee",
                "status": "DRAFT",
                "tags": ["summer"],
                "options": [
                    { "name": "Color", "position": 2, "values": ["Black"] },
                    { "name": "Size", "position": 1, "values": ["M"] }
                ],
                "images": { "nodes": [ { "url": "https://cdn/tee.jpg" } ] },
                "variants": { "nodes": [{
                    "id": "gid://shopify/ProductVariant/7",
                    "sku": "X-M-BLK",
                    "price": "22.00",
                    "inventoryQuantity": 5,
                    "inventoryPolicy": "CONTINUE",
                    "inventoryItem": { "id": "gid://shopify/InventoryItem/9" },
                    "selectedOptions": [
                        { "name": "Size", "value": "M" },
                        { "name": "Color", "value": "Black" }
                    ],
                    "image": { "url": "https://cdn/tee-black.jpg" }
                }] }
            }
        }))
        .unwrap();

        let payload = convert_product(data.product.unwrap());
        assert_eq!(payload.id, ShopifyProductId::new(42));
        assert_eq!(payload.status(), ProductStatus::Draft);

        let variant = &payload.variants[0];
        assert_eq!(variant.option1.as_deref(), Some("M"));
        assert_eq!(variant.option2.as_deref(), Some("Black"));
        assert_eq!(variant.inventory_item_id, Some(InventoryItemId::new(9)));
        assert_eq!(variant.inventory_policy, Some(InventoryPolicy::Continue));

        assert_eq!(payload.images.len(), 2);
        assert_eq!(payload.images[1].variant_ids, vec![7]);
    }
}
