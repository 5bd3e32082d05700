use crate::request::{Body, HttpRequest, build_url, join_url};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

/// `POST {auth_base}/token` with HTTP basic client credentials.
pub fn build_token_request(auth_base_url: &str, creds: &ClientCredentials) -> HttpRequest {
    let basic = STANDARD.encode(format!("{}:{}", creds.client_id, creds.client_secret));

    HttpRequest {
        method: "POST".into(),
        url: join_url(auth_base_url, "/token"),
        headers: vec![
            ("Authorization".into(), format!("Basic {}", basic)),
            (
                "Content-Type".into(),
                "application/x-www-form-urlencoded".into(),
            ),
        ],
        body: Body::FormUrlEncoded("grant_type=client_credentials".into()),
    }
}

/// Album search returning only the top-ranked hit.
pub fn build_album_search_request(
    api_base_url: &str,
    access_token: &str,
    query: &str,
) -> anyhow::Result<HttpRequest> {
    let url = build_url(
        api_base_url,
        "/search",
        &[("q", query), ("type", "album"), ("limit", "1")],
    )?;

    Ok(HttpRequest {
        method: "GET".into(),
        url,
        headers: vec![
            ("Authorization".into(), format!("Bearer {}", access_token)),
            ("Accept".into(), "application/json".into()),
        ],
        body: Body::Empty,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_request_uses_basic_auth() {
        let req = build_token_request(
            "https://accounts.example.com/api/",
            &ClientCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        );
        assert_eq!(req.method, "POST");
        assert_eq!(req.url, "https://accounts.example.com/api/token");
        // base64("id:secret")
        assert_eq!(req.header("authorization"), Some("Basic aWQ6c2VjcmV0"));
        assert_eq!(
            req.body,
            Body::FormUrlEncoded("grant_type=client_credentials".into())
        );
    }

    #[test]
    fn search_request_carries_query_and_bearer() {
        let req =
            build_album_search_request("https://api.example.com/v1", "tok", "abbey road").unwrap();
        assert_eq!(req.method, "GET");
        assert_eq!(req.query_param("q").as_deref(), Some("abbey road"));
        assert_eq!(req.query_param("type").as_deref(), Some("album"));
        assert_eq!(req.query_param("limit").as_deref(), Some("1"));
        assert_eq!(req.header("authorization"), Some("Bearer tok"));
    }

    #[test]
    fn credentials_debug_hides_secret() {
        let creds = ClientCredentials {
            client_id: "id".into(),
            client_secret: "hunter2".into(),
        };
        assert!(!format!("{creds:?}").contains("hunter2"));
    }
}
