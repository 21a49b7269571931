use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Client,
    Method,
};
use serde::{de::DeserializeOwned, Serialize};
use wallet_payment_engine::GatewayError;

use crate::error::{map_reqwest_error, GatewayInitError};

/// A JSON REST client with a fixed base URL, default headers and explicit timeouts.
#[derive(Clone)]
pub(crate) struct RestClient {
    base_url: String,
    client: Arc<Client>,
}

impl RestClient {
    pub fn new(
        provider: &'static str,
        base_url: &str,
        authorization: &str,
        request_timeout: Duration,
        connect_timeout: Duration,
    ) -> Result<Self, GatewayInitError> {
        let init_err = |reason: String| GatewayInitError::Client { provider, reason };
        let mut headers = HeaderMap::with_capacity(3);
        let mut auth = HeaderValue::from_str(authorization).map_err(|e| init_err(e.to_string()))?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(request_timeout)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| init_err(e.to_string()))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self { base_url, client: Arc::new(client) })
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<&B>,
    ) -> Result<T, GatewayError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if !params.is_empty() {
            req = req.query(params);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let response = req.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if status.is_success() {
            trace!("REST query successful. {status}");
            response.json::<T>().await.map_err(map_reqwest_error)
        } else {
            let message = response.text().await.unwrap_or_default();
            debug!("REST query failed. {status}. {message}");
            Err(GatewayError::Rejected { status: status.as_u16(), message })
        }
    }
}
