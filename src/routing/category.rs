//! Service categories produced by classification.

use serde::{Deserialize, Serialize};

/// Which backend service type should handle a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Payment,
    Order,
    User,
    Product,
    /// Fallback when nothing else matches or classification fails.
    Default,
}

impl Category {
    /// Categories a classifier can positively identify, in tie-break order.
    pub const ROUTABLE: [Category; 4] = [
        Category::Payment,
        Category::Order,
        Category::User,
        Category::Product,
    ];

    pub fn keyword(&self) -> &'static str {
        match self {
            Category::Payment => "payment",
            Category::Order => "order",
            Category::User => "user",
            Category::Product => "product",
            Category::Default => "default",
        }
    }

    /// Registry service type served by this category.
    pub fn service_type(&self) -> &'static str {
        match self {
            Category::Payment => "payment-gateway",
            Category::Order => "order-gateway",
            Category::User => "user-gateway",
            Category::Product => "product-gateway",
            Category::Default => "default-gateway",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_service_type_mapping() {
        assert_eq!(Category::Payment.service_type(), "payment-gateway");
        assert_eq!(Category::Default.service_type(), "default-gateway");
    }

    #[test]
    fn test_serde_names() {
        let parsed: Category = serde_json::from_str("\"product\"").unwrap();
        assert_eq!(parsed, Category::Product);
        assert_eq!(serde_json::to_string(&Category::Order).unwrap(), "\"order\"");
    }
}
