use crate::config::TransportConfig;
use crate::errors::FetchError;
use anyhow::{Context, Result};
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::header::HeaderValue;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct ApplianceClient {
    base_url: Url,
    host: String,
    http: Client,
    user: String,
    password: String,
}

impl ApplianceClient {
    /// Client for the REST management interface at `https://{host}:{port}/`.
    pub fn for_appliance(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        transport: &TransportConfig,
    ) -> Result<Self> {
        Self::new(&format!("https://{host}:{port}/"), user, password, transport)
    }

    pub fn new(
        base_url: &str,
        user: &str,
        password: &str,
        transport: &TransportConfig,
    ) -> Result<Self> {
        let parsed = Url::parse(base_url).context("parsing appliance URL")?;
        let host = parsed.host_str().unwrap_or_default().to_string();

        if !transport.verify_tls {
            warn!("TLS certificate verification is disabled for {}", host);
        }

        let http = Client::builder()
            .danger_accept_invalid_certs(!transport.verify_tls)
            .user_agent(HeaderValue::from_static("mqa-rest/0.1"))
            .pool_max_idle_per_host(0)
            .timeout(transport.timeout)
            .connect_timeout(transport.connect_timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            host,
            http,
            user: user.to_string(),
            password: password.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Issues a GET and buffers the whole body. Non-2xx statuses are returned
    /// as data: the appliance puts its failure reasons in the JSON body.
    pub fn get(&self, path: &str) -> Result<ResponseData, FetchError> {
        let url = self.url_for(path);
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .basic_auth(&self.user, Some(&self.password))
            .send()
            .map_err(|source| self.connectivity(source))?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|source| self.connectivity(source))?;
        debug!(status, bytes = body.len(), "response received");

        Ok(ResponseData { status, body })
    }

    fn url_for(&self, path: &str) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        format!("{}/{}", base, path.trim_start_matches('/'))
    }

    fn connectivity(&self, source: reqwest::Error) -> FetchError {
        FetchError::Connectivity {
            host: self.host.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use std::time::Duration;

    fn transport() -> TransportConfig {
        TransportConfig {
            verify_tls: true,
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(2),
        }
    }

    #[test]
    fn sends_basic_auth_and_returns_body() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/mgmt/status/default/SystemCpuStatus")
                .header("Authorization", "Basic YWRtaW46c2VjcmV0");
            then.status(200).body(r#"{"SystemCpuStatus": {"CpuUsage": 4}}"#);
        });

        let client = ApplianceClient::new(&server.base_url(), "admin", "secret", &transport())
            .unwrap();
        let response = client.get("/mgmt/status/default/SystemCpuStatus").unwrap();

        mock.assert();
        assert_eq!(response.status, 200);
        assert!(response.body.contains("CpuUsage"));
    }

    #[test]
    fn error_statuses_are_returned_as_data() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/mgmt/status/default/MQSystemResources");
            then.status(401)
                .body(r#"{"error": ["Authentication failure"]}"#);
        });

        let client =
            ApplianceClient::new(&server.base_url(), "admin", "wrong", &transport()).unwrap();
        let response = client.get("/mgmt/status/default/MQSystemResources").unwrap();

        assert_eq!(response.status, 401);
        assert!(response.body.contains("Authentication failure"));
    }

    #[test]
    fn refused_connection_names_the_host() {
        let client =
            ApplianceClient::for_appliance("127.0.0.1", 1, "admin", "secret", &transport())
                .unwrap();
        let err = client.get("/mgmt/status/default/SystemCpuStatus").unwrap_err();

        assert!(matches!(err, FetchError::Connectivity { .. }));
        assert_eq!(
            err.to_string(),
            "A connection could not be established to 127.0.0.1"
        );
    }

    #[test]
    fn keeps_path_segments_literal() {
        let client = ApplianceClient::for_appliance(
            "appliance.example",
            5554,
            "admin",
            "secret",
            &transport(),
        )
        .unwrap();
        assert_eq!(client.host(), "appliance.example");
        assert_eq!(
            client.url_for("/mgmt/filestore/default/mqerr/qmgrs/QM1/AMQERR02.LOG"),
            "https://appliance.example:5554/mgmt/filestore/default/mqerr/qmgrs/QM1/AMQERR02.LOG"
        );
    }
}
