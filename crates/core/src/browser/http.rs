use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::REFERER;
use reqwest::{Client, RequestBuilder};
use tracing::debug;
use url::Url;

use crate::config::BrowserConfig;

use super::{encode_pairs, with_query, Browser, BrowserError, Form, FormMethod, Page};

/// [`Browser`] backed by a reqwest client with its own cookie jar.
pub struct HttpBrowser {
    client: Client,
    send_referer: bool,
    page: Option<Page>,
}

impl HttpBrowser {
    pub fn new(config: &BrowserConfig) -> Result<Self, BrowserError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrowserError::Client(e.to_string()))?;

        Ok(Self {
            client,
            send_referer: config.send_referer,
            page: None,
        })
    }

    async fn fetch(&mut self, request: RequestBuilder, url: &Url) -> Result<(), BrowserError> {
        let request = match (&self.page, self.send_referer) {
            (Some(current), true) => request.header(REFERER, current.url.as_str()),
            _ => request,
        };

        let response = request.send().await.map_err(|e| map_error(e, url))?;

        let final_url = response.url().clone();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| map_error(e, url))?
            .to_vec();

        debug!(url = %final_url, status, bytes = body.len(), "Fetched page");

        self.page = Some(Page::new(final_url, status, headers, body));
        Ok(())
    }
}

fn map_error(e: reqwest::Error, url: &Url) -> BrowserError {
    let url = url.to_string();
    if e.is_timeout() {
        BrowserError::Timeout { url }
    } else if e.is_connect() {
        BrowserError::ConnectionFailed {
            url,
            reason: e.to_string(),
        }
    } else {
        BrowserError::Request {
            url,
            reason: e.to_string(),
        }
    }
}

#[async_trait]
impl Browser for HttpBrowser {
    fn page(&self) -> Option<&Page> {
        self.page.as_ref()
    }

    async fn open(&mut self, url: &Url) -> Result<(), BrowserError> {
        let request = self.client.get(url.clone());
        self.fetch(request, url).await
    }

    async fn open_form(
        &mut self,
        url: &Url,
        params: &[(String, String)],
    ) -> Result<(), BrowserError> {
        let target = with_query(url, params);
        let request = self.client.get(target.clone());
        self.fetch(request, &target).await
    }

    async fn submit(&mut self, form: &Form) -> Result<(), BrowserError> {
        match form.method {
            FormMethod::Get => self.open_form(&form.action, form.fields()).await,
            FormMethod::Post => {
                let request = self
                    .client
                    .post(form.action.clone())
                    .header(
                        reqwest::header::CONTENT_TYPE,
                        "application/x-www-form-urlencoded",
                    )
                    .body(encode_pairs(form.fields()));
                self.fetch(request, &form.action).await
            }
        }
    }
}
