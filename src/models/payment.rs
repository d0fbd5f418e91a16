use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct LocalizedText {
    pub zh: &'static str,
    pub en: &'static str,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Prices {
    #[serde(rename = "USD")]
    pub usd: f64,
    #[serde(rename = "CNY")]
    pub cny: f64,
    #[serde(rename = "EUR")]
    pub eur: f64,
    #[serde(rename = "GBP")]
    pub gbp: f64,
}

impl Prices {
    pub fn for_currency(&self, currency: &str) -> Option<f64> {
        match currency.to_ascii_uppercase().as_str() {
            "USD" => Some(self.usd),
            "CNY" => Some(self.cny),
            "EUR" => Some(self.eur),
            "GBP" => Some(self.gbp),
            _ => None,
        }
    }
}

/// A purchasable pack of generation credits.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaProduct {
    pub id: &'static str,
    pub name: LocalizedText,
    pub description: LocalizedText,
    pub quota: u32,
    pub prices: Prices,
    pub popular: bool,
    pub best_value: bool,
}

pub const QUOTA_PRODUCTS: &[QuotaProduct] = &[
    QuotaProduct {
        id: "starter-2",
        name: LocalizedText { zh: "体验包", en: "Starter Pack" },
        description: LocalizedText {
            zh: "适合偶尔需要生成照片",
            en: "Perfect for occasional use",
        },
        quota: 2,
        prices: Prices { usd: 1.99, cny: 4.99, eur: 1.79, gbp: 1.59 },
        popular: false,
        best_value: false,
    },
    QuotaProduct {
        id: "value-5",
        name: LocalizedText { zh: "超值包", en: "Value Pack" },
        description: LocalizedText {
            zh: "推荐给家庭使用，帮亲友一起生成",
            en: "Recommended for family use",
        },
        quota: 5,
        prices: Prices { usd: 3.99, cny: 9.99, eur: 3.59, gbp: 3.19 },
        popular: true,
        best_value: true,
    },
    QuotaProduct {
        id: "pro-12",
        name: LocalizedText { zh: "专业包", en: "Pro Pack" },
        description: LocalizedText {
            zh: "经常使用，性价比最高",
            en: "Frequent use, best value",
        },
        quota: 12,
        prices: Prices { usd: 7.99, cny: 19.99, eur: 7.19, gbp: 6.49 },
        popular: false,
        best_value: false,
    },
];

pub fn product_by_id(id: &str) -> Option<&'static QuotaProduct> {
    QUOTA_PRODUCTS.iter().find(|p| p.id == id)
}

pub fn format_price(amount: f64, currency: &str) -> String {
    let symbol = match currency {
        "USD" => "$",
        "CNY" => "¥",
        "EUR" => "€",
        "GBP" => "£",
        other => other,
    };
    format!("{}{:.2}", symbol, amount)
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub product_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub checkout_url: String,
    pub product: CheckoutProduct,
}

#[derive(Debug, Serialize)]
pub struct CheckoutProduct {
    pub id: &'static str,
    pub name: LocalizedText,
    pub quota: u32,
}

impl From<&QuotaProduct> for CheckoutProduct {
    fn from(product: &QuotaProduct) -> Self {
        Self {
            id: product.id,
            name: product.name,
            quota: product.quota,
        }
    }
}

/// Payment provider's checkout session, as returned on creation.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub checkout_url: String,
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSessionEnvelope {
    pub session: CheckoutSession,
}

/// Incoming webhook. The checkout may sit under `data.checkout` or at the top level.
#[derive(Debug, Deserialize)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
    #[serde(default)]
    pub checkout: Option<WebhookCheckout>,
}

impl WebhookEvent {
    pub fn checkout(&self) -> Option<&WebhookCheckout> {
        self.data
            .as_ref()
            .and_then(|data| data.checkout.as_ref())
            .or(self.checkout.as_ref())
    }
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    #[serde(default)]
    pub checkout: Option<WebhookCheckout>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookCheckout {
    #[serde(default)]
    pub product_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub metadata: Option<CheckoutMetadata>,
}

impl WebhookCheckout {
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.user_id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Deserialize)]
pub struct CheckoutMetadata {
    #[serde(default, rename = "userId")]
    pub user_id: Option<String>,
}
