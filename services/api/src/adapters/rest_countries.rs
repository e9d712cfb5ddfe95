//! services/api/src/adapters/rest_countries.rs
//!
//! Adapter for the public REST Countries API. It implements the `CountryDirectory`
//! port from the `core` crate.

use async_trait::async_trait;
use chat_demo_core::domain::Country;
use chat_demo_core::ports::{CountryDirectory, PortError, PortResult};
use serde::Deserialize;

//=========================================================================================
// Wire Records
//=========================================================================================

#[derive(Deserialize)]
struct CountryRecord {
    name: NameRecord,
    #[serde(default)]
    idd: IddRecord,
    #[serde(default)]
    flag: String,
    #[serde(default)]
    cca2: String,
}

#[derive(Deserialize)]
struct NameRecord {
    common: String,
}

#[derive(Deserialize, Default)]
struct IddRecord {
    #[serde(default)]
    root: Option<String>,
    #[serde(default)]
    suffixes: Option<Vec<String>>,
}

impl CountryRecord {
    fn to_domain(self) -> Country {
        Country {
            name: self.name.common,
            flag: self.flag,
            code: self.cca2,
            dial_root: self.idd.root.unwrap_or_default(),
            dial_suffixes: self.idd.suffixes.unwrap_or_default(),
        }
    }
}

/// Parses the JSON array returned by the countries endpoint.
pub fn parse_countries(body: &str) -> PortResult<Vec<Country>> {
    let records: Vec<CountryRecord> = serde_json::from_str(body)?;
    Ok(records.into_iter().map(CountryRecord::to_domain).collect())
}

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `CountryDirectory` port over HTTP.
#[derive(Clone)]
pub struct RestCountriesAdapter {
    client: reqwest::Client,
    url: String,
}

impl RestCountriesAdapter {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl CountryDirectory for RestCountriesAdapter {
    async fn fetch_countries(&self) -> PortResult<Vec<Country>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to fetch countries: {}", e)))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "Failed to fetch countries: HTTP {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PortError::Unexpected(format!("Failed to read countries: {}", e)))?;
        parse_countries(&body)
    }
}
