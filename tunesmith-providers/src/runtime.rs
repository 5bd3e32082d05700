use crate::request::{Body, HttpRequest};
use anyhow::{Context, anyhow};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Turns a non-2xx response into an error carrying status and body.
    pub fn error_for_status(self, what: &str) -> anyhow::Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(anyhow!(
            "{what} failed: status={} body={}",
            self.status,
            String::from_utf8_lossy(&self.body)
        ))
    }
}

pub async fn execute(req: &HttpRequest) -> anyhow::Result<HttpResponse> {
    // Important: without an explicit timeout, a broken endpoint can hang the
    // whole turn indefinitely.
    let client = reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .timeout(Duration::from_secs(60))
        .build()
        .context("build http client")?;

    let mut headers = HeaderMap::new();
    for (k, v) in &req.headers {
        let name = HeaderName::from_bytes(k.as_bytes())
            .with_context(|| format!("invalid header name: {k}"))?;
        let value =
            HeaderValue::from_str(v).with_context(|| format!("invalid header value for {k}"))?;
        headers.insert(name, value);
    }

    log::debug!("http request: {req:?}");

    let builder = match req.method.as_str() {
        "GET" => client.get(&req.url),
        "POST" => client.post(&req.url),
        "PUT" => client.put(&req.url),
        "DELETE" => client.delete(&req.url),
        other => return Err(anyhow!("unsupported method: {other}")),
    }
    .headers(headers);

    let builder = match &req.body {
        Body::Empty => builder,
        Body::Json(s) | Body::FormUrlEncoded(s) => builder.body(s.clone()),
        Body::Multipart { bytes, .. } => builder.body(bytes.clone()),
    };

    let resp = builder.send().await.context("http request failed")?;
    let status = resp.status().as_u16();
    let body = resp
        .bytes()
        .await
        .context("failed reading response body")?
        .to_vec();

    log::debug!("http response: status={status} bytes={}", body.len());
    Ok(HttpResponse { status, body })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn sends_form_body_and_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let req = HttpRequest {
            method: "POST".into(),
            url: format!("{}/token", server.uri()),
            headers: vec![(
                "Content-Type".into(),
                "application/x-www-form-urlencoded".into(),
            )],
            body: Body::FormUrlEncoded("grant_type=client_credentials".into()),
        };
        let resp = execute(&req).await.unwrap();
        assert!(resp.is_success());
        assert_eq!(resp.body, b"ok");
    }

    #[tokio::test]
    async fn non_success_status_becomes_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
            .mount(&server)
            .await;

        let req = HttpRequest {
            method: "GET".into(),
            url: server.uri(),
            headers: vec![],
            body: Body::Empty,
        };
        let err = execute(&req)
            .await
            .unwrap()
            .error_for_status("search")
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("status=401"));
        assert!(msg.contains("bad token"));
    }

    #[test]
    fn rejects_unknown_method() {
        let req = HttpRequest {
            method: "BREW".into(),
            url: "http://localhost".into(),
            headers: vec![],
            body: Body::Empty,
        };
        let rt = tokio::runtime::Runtime::new().unwrap();
        assert!(rt.block_on(execute(&req)).is_err());
    }
}
