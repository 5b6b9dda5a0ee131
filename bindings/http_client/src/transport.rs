use anyhow::Context;
use gale_core::prelude::{
    HttpMethod, HttpRequest, HttpResponse, RequestMeta, Transport, TransportError,
    TransportFuture,
};
use std::time::Duration;
use url::Url;

/// Sends requests to a real server with a shared [reqwest::Client], so connections are pooled
/// across virtual users.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let base_url =
            Url::parse(base_url).with_context(|| format!("Invalid base URL: {base_url}"))?;
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path)
            .map_err(|e| TransportError::Other(format!("Invalid path [{path}]: {e}")))
    }

    async fn send_request(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = self.url_for(&request.path)?;
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_err)?;

        Ok(HttpResponse {
            status: response.status().as_u16(),
        })
    }
}

impl Transport for ReqwestTransport {
    fn send<'a>(&'a self, request: &'a HttpRequest, _meta: RequestMeta) -> TransportFuture<'a> {
        Box::pin(self.send_request(request))
    }
}

fn map_reqwest_err(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(err.to_string())
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn meta() -> RequestMeta {
        RequestMeta {
            vu_id: 0,
            iteration: 1,
            active_vus: 1,
        }
    }

    #[tokio::test]
    async fn posts_json_body_and_reports_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/login"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({"username": "admin", "password": "1234"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let request = HttpRequest {
            method: HttpMethod::Post,
            path: "/api/login".to_string(),
            body: Some(serde_json::json!({"username": "admin", "password": "1234"})),
        };

        let response = transport.send(&request, meta()).await.unwrap();
        assert_eq!(200, response.status);
    }

    #[tokio::test]
    async fn error_statuses_are_responses_not_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/contact"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let transport = ReqwestTransport::new(&mock_server.uri(), Duration::from_secs(5)).unwrap();
        let request = HttpRequest {
            method: HttpMethod::Post,
            path: "/api/contact".to_string(),
            body: None,
        };

        let response = transport.send(&request, meta()).await.unwrap();
        assert_eq!(500, response.status);
    }

    #[tokio::test]
    async fn slow_responses_time_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let transport =
            ReqwestTransport::new(&mock_server.uri(), Duration::from_millis(100)).unwrap();
        let request = HttpRequest {
            method: HttpMethod::Post,
            path: "/api/login".to_string(),
            body: None,
        };

        let err = transport.send(&request, meta()).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)), "{err:?}");
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(ReqwestTransport::new("not a url", Duration::from_secs(1)).is_err());
    }
}
