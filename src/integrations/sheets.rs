// src/integrations/sheets.rs — Google Sheets ledger (REST API)
//
// Uses the Google Sheets API v4 (https://developers.google.com/sheets/api).
// Rows are appended to the spreadsheet's first worksheet, whose title is
// discovered from the spreadsheet metadata.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::infra::errors::HaulbotError;
use crate::integrations::types::Ledger;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

pub struct GoogleSheetsLedger {
    client: Client,
    spreadsheet_id: String,
    access_token: String,
}

impl GoogleSheetsLedger {
    pub fn new(spreadsheet_id: String, access_token: String) -> Self {
        Self {
            client: Client::new(),
            spreadsheet_id,
            access_token,
        }
    }

    /// Title of the first worksheet, defaulting to "Sheet1" when the
    /// metadata carries none.
    async fn first_sheet_title(&self) -> Result<String, HaulbotError> {
        let url = format!("{SHEETS_API_BASE}/spreadsheets/{}", self.spreadsheet_id);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .query(&[("fields", "sheets.properties.title")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(HaulbotError::Ledger(format!(
                "metadata request returned {status}: {body}"
            )));
        }

        let meta: SpreadsheetResp = resp.json().await?;
        Ok(meta
            .sheets
            .as_ref()
            .and_then(|s| s.first())
            .and_then(|s| s.properties.as_ref())
            .and_then(|p| p.title.clone())
            .unwrap_or_else(|| "Sheet1".into()))
    }
}

#[derive(Deserialize)]
struct SpreadsheetResp {
    sheets: Option<Vec<SheetMeta>>,
}

#[derive(Deserialize)]
struct SheetMeta {
    properties: Option<SheetProperties>,
}

#[derive(Deserialize)]
struct SheetProperties {
    title: Option<String>,
}

#[async_trait]
impl Ledger for GoogleSheetsLedger {
    async fn append_row(&self, cells: Vec<serde_json::Value>) -> Result<(), HaulbotError> {
        let sheet = self.first_sheet_title().await?;

        let url = format!(
            "{SHEETS_API_BASE}/spreadsheets/{}/values/{}:append",
            self.spreadsheet_id,
            urlencoded(&sheet)
        );
        let body = serde_json::json!({
            "majorDimension": "ROWS",
            "values": [cells],
        });

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.access_token)
            .query(&[("valueInputOption", "RAW")])
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(HaulbotError::Ledger(format!(
                "append returned {status}: {text}"
            )));
        }

        Ok(())
    }
}

/// Simple URL encoding for sheet names.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace('!', "%21")
        .replace('\'', "%27")
}
