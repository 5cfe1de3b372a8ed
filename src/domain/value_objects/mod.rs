//! Value Objects for the bookstore

use serde::{Deserialize, Serialize};
use std::fmt;

const PATH_SEPARATOR: char = '/';

/// Canonical form of a book identifier.
///
/// Catalog keys arrive either bare (`works/OL123W`) or path-prefixed
/// (`/works/OL123W`). Both must address the same line item, so the leading
/// separator is stripped. The whole run is stripped, which keeps the function
/// idempotent for inputs like `//x`.
pub fn normalize(id: &str) -> &str {
    id.trim_start_matches(PATH_SEPARATOR)
}

/// Book identifier, always stored in canonical form.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BookId(String);

impl BookId {
    pub fn parse(raw: &str) -> Result<Self, BookIdError> {
        if raw.trim().is_empty() {
            return Err(BookIdError::Empty);
        }
        let canonical = normalize(raw);
        if canonical.trim().is_empty() {
            return Err(BookIdError::Empty);
        }
        Ok(Self(canonical.to_string()))
    }

    pub fn as_str(&self) -> &str { &self.0 }

    /// True when `raw` names this book once normalized.
    pub fn matches(&self, raw: &str) -> bool { normalize(raw) == self.0 }
}

impl fmt::Display for BookId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum BookIdError { Empty }
impl std::error::Error for BookIdError {}
impl fmt::Display for BookIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Book ID is required") }
}

/// Identity resolved by the session provider. Trusted as-is.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(value: impl Into<String>) -> Self { Self(value.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    CashOnDelivery,
}

impl PaymentMethod {
    /// Accepts both the machine name and the label shown at checkout.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "credit_card" | "credit card" | "card" => Some(Self::CreditCard),
            "paypal" => Some(Self::Paypal),
            "cod" | "cash_on_delivery" | "cash on delivery" => Some(Self::CashOnDelivery),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::CreditCard => "Credit Card",
            Self::Paypal => "PayPal",
            Self::CashOnDelivery => "Cash on Delivery",
        }
    }
}

/// Payment details as submitted at checkout. Carries raw card data: never
/// implement `Serialize` or `Debug` for it.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub method: Option<String>,
    pub card_number: Option<String>,
    pub last4: Option<String>,
    #[serde(alias = "cvc")]
    pub cvv: Option<String>,
    pub expiry: Option<String>,
}

/// The only payment shape that is ever persisted: `{method, last4?}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last4: Option<String>,
}

impl PaymentInfo {
    /// Reduces checkout input to the persistable subset. Card number, CVV and
    /// expiry never leave this function.
    pub fn from_input(input: PaymentInput) -> Result<Self, PaymentError> {
        let raw_method = input.method.as_deref().unwrap_or_default();
        if raw_method.trim().is_empty() {
            return Err(PaymentError::MissingMethod);
        }
        let method = PaymentMethod::parse(raw_method)
            .ok_or_else(|| PaymentError::UnknownMethod(raw_method.to_string()))?;

        let last4 = match method {
            PaymentMethod::CreditCard => input
                .last4
                .as_deref()
                .filter(|l| l.len() == 4 && l.chars().all(|c| c.is_ascii_digit()))
                .map(str::to_string)
                .or_else(|| input.card_number.as_deref().and_then(last_four_digits)),
            _ => None,
        };

        Ok(Self { method: method.label().to_string(), last4 })
    }
}

fn last_four_digits(card_number: &str) -> Option<String> {
    let digits: Vec<char> = card_number.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < 4 {
        return None;
    }
    Some(digits[digits.len() - 4..].iter().collect())
}

#[derive(Debug, Clone, PartialEq, Eq)] pub enum PaymentError { MissingMethod, UnknownMethod(String) }
impl std::error::Error for PaymentError {}
impl fmt::Display for PaymentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingMethod => write!(f, "Payment method is required"),
            Self::UnknownMethod(m) => write!(f, "Unsupported payment method: {m}"),
        }
    }
}
