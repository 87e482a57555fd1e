// src/integrations/disk.rs — Yandex Disk upload (REST API)
//
// Uses the Yandex Disk REST API (https://yandex.ru/dev/disk/api/):
// an upload href is requested first, then the bytes are PUT to it.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::infra::errors::HaulbotError;
use crate::integrations::types::BlobStorage;

const DISK_API_BASE: &str = "https://cloud-api.yandex.net/v1/disk";

pub struct YandexDiskStorage {
    client: Client,
    token: String,
    folder: String,
}

impl YandexDiskStorage {
    pub fn new(token: String, folder: String) -> Self {
        Self {
            client: Client::new(),
            token,
            folder,
        }
    }

    fn auth_header(&self) -> String {
        format!("OAuth {}", self.token)
    }
}

#[derive(Deserialize)]
struct UploadHref {
    href: String,
}

#[async_trait]
impl BlobStorage for YandexDiskStorage {
    async fn upload(&self, bytes: Vec<u8>, filename: &str) -> Result<(), HaulbotError> {
        let path = format!("/{}/{filename}", self.folder);

        let resp = self
            .client
            .get(format!("{DISK_API_BASE}/resources/upload"))
            .header("Authorization", self.auth_header())
            .query(&[("path", path.as_str()), ("overwrite", "true")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(HaulbotError::BlobStorage(format!(
                "upload href request returned {status}: {body}"
            )));
        }

        let href: UploadHref = resp.json().await?;

        let put = self.client.put(&href.href).body(bytes).send().await?;
        if !put.status().is_success() {
            return Err(HaulbotError::BlobStorage(format!(
                "upload PUT returned {}",
                put.status()
            )));
        }

        Ok(())
    }
}
