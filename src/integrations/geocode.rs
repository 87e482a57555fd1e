// src/integrations/geocode.rs — Geoapify reverse geocoding
//
// Uses the Geoapify reverse geocoding API
// (https://apidocs.geoapify.com/docs/geocoding/reverse-geocoding/).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::infra::errors::HaulbotError;
use crate::integrations::types::Geocoder;
use crate::pipeline::report::ResolvedAddress;

const GEOAPIFY_REVERSE_URL: &str = "https://api.geoapify.com/v1/geocode/reverse";

pub struct GeoapifyGeocoder {
    client: Client,
    api_key: String,
}

impl GeoapifyGeocoder {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct ReverseResp {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    properties: serde_json::Value,
}

#[async_trait]
impl Geocoder for GeoapifyGeocoder {
    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<ResolvedAddress, HaulbotError> {
        let resp = self
            .client
            .get(GEOAPIFY_REVERSE_URL)
            .query(&[
                ("lat", latitude.to_string().as_str()),
                ("lon", longitude.to_string().as_str()),
                ("apiKey", self.api_key.as_str()),
                ("lang", "ru"),
            ])
            .send()
            .await?;

        // Anything but 200 is a stage failure, never a placeholder fill.
        if !resp.status().is_success() {
            return Err(HaulbotError::GeocoderStatus {
                status: resp.status().as_u16(),
            });
        }

        let body: ReverseResp = resp.json().await?;
        let properties = body
            .features
            .into_iter()
            .next()
            .map(|f| f.properties)
            .unwrap_or_else(|| serde_json::json!({}));

        Ok(parse_properties(&properties))
    }
}

/// Map the feature properties onto the seven address fields, substituting
/// an explicit placeholder for every absent key.
fn parse_properties(properties: &serde_json::Value) -> ResolvedAddress {
    let field = |key: &str| -> String {
        properties
            .get(key)
            .and_then(|v| v.as_str())
            .map(String::from)
            .unwrap_or_else(|| format!("{key} не найдено"))
    };

    ResolvedAddress {
        formatted: field("formatted"),
        city: field("city"),
        county: field("county"),
        district: field("district"),
        suburb: field("suburb"),
        street: field("street"),
        house_number: field("housenumber"),
    }
}
