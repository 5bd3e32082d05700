use tunesmith_core::catalog::{AccessToken, AlbumItem};
use tunesmith_core::config::CatalogConfig;
use tunesmith_engine::traits::CatalogClient;
use tunesmith_providers::parse::{parse_access_token, parse_album_search};
use tunesmith_providers::runtime::execute;
use tunesmith_providers::spotify::{
    ClientCredentials, build_album_search_request, build_token_request,
};

#[derive(Debug, Clone)]
pub struct SpotifyCatalogClient {
    cfg: CatalogConfig,
    creds: ClientCredentials,
}

impl SpotifyCatalogClient {
    pub fn new(cfg: CatalogConfig, creds: ClientCredentials) -> Self {
        Self { cfg, creds }
    }
}

#[async_trait::async_trait]
impl CatalogClient for SpotifyCatalogClient {
    async fn exchange_token(&self) -> anyhow::Result<AccessToken> {
        let req = build_token_request(&self.cfg.auth_base_url, &self.creds);
        let resp = execute(&req).await?.error_for_status("Spotify token exchange")?;
        parse_access_token(&resp.body)
    }

    async fn search_albums(
        &self,
        token: &AccessToken,
        query: &str,
    ) -> anyhow::Result<Vec<AlbumItem>> {
        let req = build_album_search_request(&self.cfg.api_base_url, token.as_str(), query)?;
        let resp = execute(&req).await?.error_for_status("Spotify album search")?;
        parse_album_search(&resp.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> SpotifyCatalogClient {
        SpotifyCatalogClient::new(
            CatalogConfig {
                auth_base_url: format!("{}/api", server.uri()),
                api_base_url: format!("{}/v1", server.uri()),
            },
            ClientCredentials {
                client_id: "id".into(),
                client_secret: "secret".into(),
            },
        )
    }

    #[tokio::test]
    async fn exchanges_client_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header("Authorization", "Basic aWQ6c2VjcmV0"))
            .and(body_string("grant_type=client_credentials"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let token = client(&server).exchange_token().await.unwrap();
        assert_eq!(token.as_str(), "tok");
    }

    #[tokio::test]
    async fn searches_albums_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("q", "so what"))
            .and(query_param("type", "album"))
            .and(query_param("limit", "1"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"albums":{"items":[{"id":"kob","name":"kind of blue","artists":[],
                    "external_urls":{"spotify":"https://open/kob"},"release_date":"1959","images":[]}]}}"#,
                "application/json",
            ))
            .mount(&server)
            .await;

        let hits = client(&server)
            .search_albums(&AccessToken("tok".into()), "so what")
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "kob");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(401).set_body_string(r#"{"error":"invalid_client"}"#))
            .mount(&server)
            .await;

        let err = client(&server).exchange_token().await.unwrap_err();
        let msg = format!("{err:#}");
        assert!(msg.contains("401"));
        assert!(msg.contains("invalid_client"));
    }
}
