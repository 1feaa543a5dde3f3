//! Azure Event Grid blob-created events.
//!
//! Two event shapes arrive on the same endpoint: the subscription validation
//! event, which must be answered with its `validationCode`, and the
//! blob-created event, whose blob URL is split into account, container and
//! path and written into a fresh context under the configured keys.

use std::sync::LazyLock;

use hookrelay_core::{Config, Context};
use regex::Regex;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::{Decoded, ValidationError};
use crate::traits::EventDecoder;

static BLOB_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https://([a-zA-Z]+).blob.core.windows.net/(\w+)/(.+)$")
        .expect("blob URL pattern compiles")
});

#[derive(Debug, Default, Deserialize)]
struct Event {
    #[serde(default)]
    data: EventData,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventData {
    #[serde(default)]
    url: String,
    #[serde(default)]
    validation_code: String,
}

/// Context keys the decoder writes to. An empty key means "do not set".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlobContextKeys {
    pub blob_url: String,
    pub account: String,
    pub container: String,
    pub blob_path: String,
}

impl BlobContextKeys {
    /// Reads `blobUrlContextKey`, `accountContextKey`, `containerContextKey`
    /// and `blobPathContextKey`, each defaulting to empty.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self {
            blob_url: config.get_setting("blobUrlContextKey", "").to_string(),
            account: config.get_setting("accountContextKey", "").to_string(),
            container: config.get_setting("containerContextKey", "").to_string(),
            blob_path: config.get_setting("blobPathContextKey", "").to_string(),
        }
    }
}

/// [`EventDecoder`] for Event Grid blob storage notifications.
#[derive(Debug, Clone)]
pub struct BlobEventDecoder {
    keys: BlobContextKeys,
}

impl BlobEventDecoder {
    #[must_use]
    pub fn new(keys: BlobContextKeys) -> Self {
        Self { keys }
    }

    #[must_use]
    pub fn keys(&self) -> &BlobContextKeys {
        &self.keys
    }

    fn blob_context(&self, url: &str) -> Result<Context, ValidationError> {
        let captures = BLOB_URL
            .captures(url)
            .ok_or_else(|| ValidationError::InvalidBlobUrl {
                url: url.to_string(),
            })?;

        let mut ctx = Context::new();
        let parts = [
            (&self.keys.blob_url, url),
            (&self.keys.account, &captures[1]),
            (&self.keys.container, &captures[2]),
            (&self.keys.blob_path, &captures[3]),
        ];
        for (key, value) in parts {
            if key.is_empty() {
                continue;
            }
            debug!(key = %key, value = %value, "updating context");
            ctx.set(key.as_str(), value);
        }
        Ok(ctx)
    }
}

impl EventDecoder for BlobEventDecoder {
    fn decode(&self, body: &[u8]) -> Result<Decoded, ValidationError> {
        let event: Event = serde_json::from_slice(body)?;

        if !event.data.validation_code.is_empty() {
            debug!(validation_code = %event.data.validation_code, "received validation event");
            return Ok(Decoded::Reply(json!({
                "ValidationResponse": event.data.validation_code,
            })));
        }

        debug!(blob_url = %event.data.url, "received blob event");
        self.blob_context(&event.data.url).map(Decoded::Relay)
    }
}
