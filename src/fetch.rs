// mqa-rest - CLI tools for the MQ Appliance REST management interface
// Copyright (C) 2024 mqa-rest contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Queue manager error log download.

use crate::client::ApplianceClient;
use crate::errors::FetchError;
use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use serde::Deserialize;
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_LOG_FILE: &str = "AMQERR01.LOG";

/// Standard alphabet, padding optional on decode.
const FILE_CONTENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub queue_manager: String,
    pub log_file: String,
}

impl DownloadRequest {
    /// `#` and `?` would start a URL fragment or query and address a
    /// different resource, so they are refused before any request is sent.
    pub fn resource_path(&self) -> Result<String, FetchError> {
        for name in [&self.queue_manager, &self.log_file] {
            if let Some(character) = name.chars().find(|c| matches!(c, '#' | '?')) {
                return Err(FetchError::InvalidName {
                    name: name.clone(),
                    character,
                });
            }
        }
        Ok(resource_path(&self.queue_manager, &self.log_file))
    }
}

/// Location of a queue manager's error log in the appliance filestore.
/// Names are substituted verbatim.
pub fn resource_path(queue_manager: &str, log_file: &str) -> String {
    format!("/mgmt/filestore/default/mqerr/qmgrs/{queue_manager}/{log_file}")
}

/// Filestore response once the `error` envelope has been ruled out.
#[derive(Debug, Deserialize)]
struct ServerResponse {
    file: Option<String>,
}

/// Checks the common `{"error": [...]}` envelope and returns the parsed object.
pub(crate) fn parse_envelope(body: &str) -> Result<serde_json::Map<String, Value>, FetchError> {
    let value: Value = serde_json::from_str(body).map_err(FetchError::InvalidJson)?;
    let Value::Object(map) = value else {
        return Err(FetchError::NotAnObject);
    };

    if let Some(errors) = map.get("error") {
        debug!("appliance reported errors: {}", errors);
        return Err(FetchError::Application(first_error_message(errors)));
    }

    Ok(map)
}

/// Only the first message is surfaced to the operator.
fn first_error_message(errors: &Value) -> String {
    let first = match errors {
        Value::Array(items) => items.first(),
        other => Some(other),
    };
    match first {
        Some(Value::String(message)) => message.clone(),
        Some(Value::Null) | None => "the appliance reported an unspecified error".to_string(),
        Some(other) => other.to_string(),
    }
}

/// Extracts and decodes the `file` payload of a filestore response.
pub fn decode_response(body: &str) -> Result<Vec<u8>, FetchError> {
    let map = parse_envelope(body)?;
    let response: ServerResponse = serde_json::from_value(Value::Object(map)).map_err(|source| {
        FetchError::UnexpectedShape {
            section: "file",
            source,
        }
    })?;

    let encoded = response.file.ok_or(FetchError::MissingFile)?;
    info!("Response received - decoding base64 file content...");

    let compact: Vec<u8> = encoded
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    FILE_CONTENT.decode(compact).map_err(FetchError::Encoding)
}

/// Writes the whole log at once, replacing any existing file. A failed write
/// removes the target rather than leaving it truncated.
pub fn save_log(path: &Path, contents: &[u8]) -> Result<(), FetchError> {
    let persistence = |source| FetchError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o666);
    }

    let mut file = options.open(path).map_err(persistence)?;
    if let Err(err) = file.write_all(contents).and_then(|()| file.flush()) {
        drop(file);
        let _ = fs::remove_file(path);
        return Err(persistence(err));
    }
    Ok(())
}

pub struct LogFetcher<'a> {
    client: &'a ApplianceClient,
}

impl<'a> LogFetcher<'a> {
    pub fn new(client: &'a ApplianceClient) -> Self {
        Self { client }
    }

    /// Downloads the requested log into `out_dir`, returning the written path.
    pub fn download(
        &self,
        request: &DownloadRequest,
        out_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        info!(
            "Downloading {} for queue manager {} on appliance {}...",
            request.log_file, request.queue_manager, request.host
        );

        let path = request.resource_path()?;
        let response = self.client.get(&path)?;
        let contents = decode_response(&response.body).inspect_err(|err| {
            debug!(status = response.status, "rejected filestore response: {}", err)
        })?;

        let target = out_dir.join(&request.log_file);
        info!("Saving the error log file to {}...", target.display());
        save_log(&target, &contents)?;

        info!(bytes = contents.len(), "File downloaded successfully!");
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TransportConfig;
    use httpmock::prelude::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn request(log_file: &str) -> DownloadRequest {
        DownloadRequest {
            host: "127.0.0.1".into(),
            port: 5554,
            user: "admin".into(),
            password: "secret".into(),
            queue_manager: "QM1".into(),
            log_file: log_file.into(),
        }
    }

    fn client_for(server: &MockServer) -> ApplianceClient {
        ApplianceClient::new(
            &server.base_url(),
            "admin",
            "secret",
            &TransportConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn builds_filestore_path_verbatim() {
        assert_eq!(
            request(DEFAULT_LOG_FILE).resource_path().unwrap(),
            "/mgmt/filestore/default/mqerr/qmgrs/QM1/AMQERR01.LOG"
        );
        assert_eq!(
            resource_path("QM.TEST", "AMQERR03.LOG"),
            "/mgmt/filestore/default/mqerr/qmgrs/QM.TEST/AMQERR03.LOG"
        );
    }

    #[test]
    fn fragment_and_query_characters_are_refused_before_sending() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({"file": "aGVsbG8="}));
        });
        let dir = tempdir().unwrap();
        let client = client_for(&server);

        let mut bad_qmgr = request(DEFAULT_LOG_FILE);
        bad_qmgr.queue_manager = "QM#1".into();
        let err = LogFetcher::new(&client)
            .download(&bad_qmgr, dir.path())
            .unwrap_err();
        assert!(matches!(err, FetchError::InvalidName { character: '#', .. }));

        let err = request("AMQERR01.LOG?raw=1").resource_path().unwrap_err();
        assert!(matches!(err, FetchError::InvalidName { character: '?', .. }));

        mock.assert_hits(0);
        assert!(!dir.path().join(DEFAULT_LOG_FILE).exists());
    }

    #[test]
    fn downloads_and_decodes_log() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/mgmt/filestore/default/mqerr/qmgrs/QM1/AMQERR01.LOG")
                .header("Authorization", "Basic YWRtaW46c2VjcmV0");
            then.status(200).json_body(json!({"file": "aGVsbG8="}));
        });
        let dir = tempdir().unwrap();
        let client = client_for(&server);

        let written = LogFetcher::new(&client)
            .download(&request(DEFAULT_LOG_FILE), dir.path())
            .unwrap();

        mock.assert();
        assert_eq!(written, dir.path().join("AMQERR01.LOG"));
        assert_eq!(fs::read(&written).unwrap(), b"hello");
    }

    #[test]
    fn overwrites_existing_log() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET)
                .path("/mgmt/filestore/default/mqerr/qmgrs/QM1/AMQERR02.LOG");
            then.status(200).json_body(json!({"file": "bmV3"}));
        });
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("AMQERR02.LOG"), b"previous, much longer content").unwrap();
        let client = client_for(&server);

        LogFetcher::new(&client)
            .download(&request("AMQERR02.LOG"), dir.path())
            .unwrap();

        assert_eq!(fs::read(dir.path().join("AMQERR02.LOG")).unwrap(), b"new");
    }

    #[test]
    fn appliance_error_leaves_existing_file_untouched() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(404)
                .json_body(json!({"error": ["boom", "second"]}));
        });
        let dir = tempdir().unwrap();
        let target = dir.path().join(DEFAULT_LOG_FILE);
        fs::write(&target, b"keep me").unwrap();
        let client = client_for(&server);

        let err = LogFetcher::new(&client)
            .download(&request(DEFAULT_LOG_FILE), dir.path())
            .unwrap_err();

        assert!(matches!(err, FetchError::Application(ref msg) if msg == "boom"));
        assert_eq!(fs::read(&target).unwrap(), b"keep me");
    }

    #[test]
    fn missing_file_field_is_reported() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(200).body("{}");
        });
        let dir = tempdir().unwrap();
        let client = client_for(&server);

        let err = LogFetcher::new(&client)
            .download(&request(DEFAULT_LOG_FILE), dir.path())
            .unwrap_err();

        assert_eq!(err.to_string(), "File content not found in response");
        assert!(!dir.path().join(DEFAULT_LOG_FILE).exists());
    }

    #[test]
    fn non_json_body_writes_nothing() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(502).body("<html>Bad Gateway");
        });
        let dir = tempdir().unwrap();
        let client = client_for(&server);

        let err = LogFetcher::new(&client)
            .download(&request(DEFAULT_LOG_FILE), dir.path())
            .unwrap_err();

        assert!(matches!(err, FetchError::InvalidJson(_)));
        assert!(!dir.path().join(DEFAULT_LOG_FILE).exists());
    }

    #[test]
    fn unreachable_appliance_is_a_connectivity_error() {
        let client = ApplianceClient::for_appliance(
            "127.0.0.1",
            1,
            "admin",
            "secret",
            &TransportConfig::default(),
        )
        .unwrap();
        let dir = tempdir().unwrap();

        let err = LogFetcher::new(&client)
            .download(&request(DEFAULT_LOG_FILE), dir.path())
            .unwrap_err();

        assert!(matches!(err, FetchError::Connectivity { .. }));
        assert!(!dir.path().join(DEFAULT_LOG_FILE).exists());
    }

    #[test]
    fn unwritable_destination_is_a_persistence_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET);
            then.status(200).json_body(json!({"file": "aGVsbG8="}));
        });
        let dir = tempdir().unwrap();
        let client = client_for(&server);

        let err = LogFetcher::new(&client)
            .download(&request(DEFAULT_LOG_FILE), &dir.path().join("missing"))
            .unwrap_err();

        assert!(matches!(err, FetchError::Persistence { .. }));
    }

    #[test]
    fn decode_accepts_wrapped_and_unpadded_payloads() {
        assert_eq!(
            decode_response(r#"{"file": "aGVs\nbG8"}"#).unwrap(),
            b"hello".to_vec()
        );
    }

    #[test]
    fn decode_rejects_invalid_base64() {
        let err = decode_response(r#"{"file": "not*base64"}"#).unwrap_err();
        assert!(matches!(err, FetchError::Encoding(_)));
    }

    #[test]
    fn error_takes_precedence_over_file() {
        let err = decode_response(r#"{"error": ["denied"], "file": "aGVsbG8="}"#).unwrap_err();
        assert_eq!(err.to_string(), "denied");
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(matches!(
            decode_response("[1, 2]").unwrap_err(),
            FetchError::NotAnObject
        ));
        assert!(matches!(
            decode_response(r#"{"file": 42}"#).unwrap_err(),
            FetchError::UnexpectedShape { .. }
        ));
    }

    #[cfg(unix)]
    #[test]
    fn saved_log_is_not_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("AMQERR01.LOG");
        save_log(&path, b"log line\n").unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0);
        assert_eq!(mode & 0o600, 0o600);
    }
}
