//! GraphQL documents for the Shopify Admin API.

/// Sales channel publications, used to find the online store.
pub const PUBLICATIONS: &str = r"
query Publications {
  publications(first: 25) {
    nodes {
      id
      name
    }
  }
}
";

/// A product's market catalogs and online-store publication.
pub const PRODUCT_MARKETS: &str = r"
query ProductMarkets($id: ID!, $onlineStore: ID!) {
  product(id: $id) {
    publishedOnPublication(publicationId: $onlineStore)
    resourcePublicationsV2(first: 50, onlyPublished: false) {
      nodes {
        isPublished
        publication {
          catalog {
            ... on MarketCatalog {
              markets(first: 50) {
                nodes {
                  regions(first: 250) {
                    nodes {
                      ... on MarketRegionCountry {
                        code
                        currency {
                          currencyCode
                        }
                      }
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
";

/// Delivery profiles with their locations, zones, and flat rates.
pub const DELIVERY_PROFILES: &str = r"
query DeliveryProfiles {
  deliveryProfiles(first: 20) {
    nodes {
      default
      profileLocationGroups {
        locationGroup {
          locations(first: 100) {
            nodes {
              id
            }
          }
        }
        locationGroupZones(first: 100) {
          nodes {
            zone {
              countries {
                code {
                  countryCode
                  restOfWorld
                }
              }
            }
            methodDefinitions(first: 25) {
              nodes {
                name
                active
                rateProvider {
                  ... on DeliveryRateDefinition {
                    price {
                      amount
                      currencyCode
                    }
                  }
                }
              }
            }
          }
        }
      }
    }
  }
}
";

/// Shipping quote for a prospective order.
pub const DRAFT_ORDER_CALCULATE: &str = r"
mutation DraftOrderCalculate($input: DraftOrderInput!) {
  draftOrderCalculate(input: $input) {
    calculatedDraftOrder {
      availableShippingRates {
        title
        price {
          amount
          currencyCode
        }
      }
    }
    userErrors {
      field
      message
    }
  }
}
";

/// Inventory levels for a batch of variants.
pub const VARIANT_INVENTORY: &str = r#"
query VariantInventory($ids: [ID!]!) {
  nodes(ids: $ids) {
    ... on ProductVariant {
      id
      inventoryPolicy
      inventoryItem {
        tracked
        inventoryLevels(first: 50) {
          nodes {
            location {
              id
            }
            quantities(names: ["available"]) {
              name
              quantity
            }
          }
        }
      }
    }
  }
}
"#;

/// A product with everything the pipeline mirrors.
pub const PRODUCT: &str = r"
query Product($id: ID!) {
  product(id: $id) {
    id
    title
    handle
    status
    tags
    options {
      name
      position
      values
    }
    images(first: 50) {
      nodes {
        url
      }
    }
    variants(first: 100) {
      nodes {
        id
        sku
        price
        inventoryQuantity
        inventoryPolicy
        inventoryItem {
          id
        }
        selectedOptions {
          name
          value
        }
        image {
          url
        }
      }
    }
  }
}
";

/// Publish a resource to sales channels.
pub const PUBLISHABLE_PUBLISH: &str = r"
mutation PublishablePublish($id: ID!, $input: [PublicationInput!]!) {
  publishablePublish(id: $id, input: $input) {
    userErrors {
      field
      message
    }
  }
}
";
