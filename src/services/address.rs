use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// Shipping address supplied at checkout
#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct ShippingAddress {
    #[validate(length(min = 1, max = 200))]
    pub full_name: String,
    #[validate(length(min = 1, max = 255))]
    pub line1: String,
    #[serde(default)]
    #[validate(length(max = 255))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postal_code: String,
    #[validate(length(equal = 2))]
    pub country: String,
    #[serde(default)]
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}

/// External address validation. Runs before the checkout transaction opens.
pub trait AddressValidator: Send + Sync {
    fn validate(&self, address: &ShippingAddress) -> Result<(), String>;
}

/// Accepts any address that passed field validation
#[derive(Debug, Default, Clone)]
pub struct AcceptAllAddressValidator;

impl AddressValidator for AcceptAllAddressValidator {
    fn validate(&self, _address: &ShippingAddress) -> Result<(), String> {
        Ok(())
    }
}
