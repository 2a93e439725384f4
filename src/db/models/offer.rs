//! Offer models: a pro's bid on a client reference.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    Offer,
    Accepted,
    Declined,
}

impl OfferStatus {
    pub const ALL: [OfferStatus; 3] = [
        OfferStatus::Offer,
        OfferStatus::Accepted,
        OfferStatus::Declined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Offer => "offer",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Declined => "declined",
        }
    }
}

impl std::fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OfferStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "Invalid status. Must be one of: {}",
                    Self::ALL.map(|s| s.as_str()).join(", ")
                )
            })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Offer {
    pub id: String,
    pub ref_id: String,
    pub pro_id: String,
    pub message: String,
    pub price_pln: i64,
    pub status: String,
    pub created_at: String,
    pub accepted_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OfferResponse {
    pub id: String,
    pub ref_id: String,
    pub pro_id: String,
    pub message: String,
    pub price_pln: i64,
    pub status: String,
    pub created_at: String,
    pub accepted_at: Option<String>,
}

impl From<Offer> for OfferResponse {
    fn from(o: Offer) -> Self {
        Self {
            id: o.id,
            ref_id: o.ref_id,
            pro_id: o.pro_id,
            message: o.message,
            price_pln: o.price_pln,
            status: o.status,
            created_at: o.created_at,
            accepted_at: o.accepted_at,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOfferRequest {
    pub message: String,
    pub price_pln: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offer_status_whitelist() {
        assert_eq!("accepted".parse::<OfferStatus>(), Ok(OfferStatus::Accepted));
        assert_eq!("declined".parse::<OfferStatus>(), Ok(OfferStatus::Declined));
        assert_eq!("offer".parse::<OfferStatus>(), Ok(OfferStatus::Offer));
        assert!("pending".parse::<OfferStatus>().is_err());
    }

    #[test]
    fn test_create_offer_camel_case() {
        let req: CreateOfferRequest =
            serde_json::from_str(r#"{"message":"Mogę jutro","pricePln":150}"#).unwrap();
        assert_eq!(req.price_pln, 150);
    }
}
