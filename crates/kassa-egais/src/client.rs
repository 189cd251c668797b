//! # UTM Client
//!
//! One multipart POST per cheque, field `xml_file`, bounded by the
//! configured timeout. Failures are returned, never retried.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use tracing::{debug, instrument};
use url::Url;

use crate::config::EgaisSettings;
use crate::error::{ReportingError, ReportingResult};

/// Multipart field the UTM reads the document from.
pub const XML_FIELD: &str = "xml_file";

/// What the UTM sent back, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtmResponse {
    pub status: u16,
    pub body: String,
}

impl UtmResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct UtmClient {
    http: reqwest::Client,
    endpoint: Url,
    timeout_secs: u64,
}

impl UtmClient {
    pub fn new(settings: &EgaisSettings) -> ReportingResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| ReportingError::InvalidConfig(format!("HTTP client: {}", e)))?;

        Ok(UtmClient {
            http,
            endpoint: settings.endpoint()?,
            timeout_secs: settings.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Posts one cheque document.
    ///
    /// Any HTTP status is returned as a response; only a failure to get an
    /// answer at all is an error.
    #[instrument(skip(self, xml), fields(endpoint = %self.endpoint, bytes = xml.len()))]
    pub async fn submit(&self, xml: &str) -> ReportingResult<UtmResponse> {
        let part = Part::text(xml.to_string())
            .file_name("cheque.xml")
            .mime_str("application/xml")
            .map_err(|e| ReportingError::Transport(format!("multipart: {}", e)))?;
        let form = Form::new().part(XML_FIELD, part);

        let resp = self
            .http
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        debug!(status, "UTM replied");

        Ok(UtmResponse { status, body })
    }

    fn transport_error(&self, err: reqwest::Error) -> ReportingError {
        if err.is_timeout() {
            ReportingError::Timeout(self.timeout_secs)
        } else {
            ReportingError::Transport(err.to_string())
        }
    }
}
