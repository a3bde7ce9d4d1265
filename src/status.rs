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

//! Read-only status views exposed under `/mgmt/status/default/`.

use crate::client::{ApplianceClient, ResponseData};
use crate::errors::FetchError;
use crate::fetch::parse_envelope;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    QueueManagers,
    SystemResources,
    SystemCpu,
}

impl StatusKind {
    /// Name of the status provider; used both in the path and as the
    /// top-level key of the response.
    pub fn section(self) -> &'static str {
        match self {
            StatusKind::QueueManagers => "QueueManagersStatus",
            StatusKind::SystemResources => "MQSystemResources",
            StatusKind::SystemCpu => "SystemCpuStatus",
        }
    }

    pub fn path(self) -> String {
        format!("/mgmt/status/default/{}", self.section())
    }

    fn missing_message(self) -> &'static str {
        match self {
            StatusKind::QueueManagers => "Couldn't find any queue managers on",
            StatusKind::SystemResources => "Couldn't retrieve system resource status from",
            StatusKind::SystemCpu => "Couldn't retrieve system CPU status from",
        }
    }
}

/// Raw response plus the extracted status section.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub kind: StatusKind,
    pub response: ResponseData,
    pub section: Value,
}

pub fn fetch_status(client: &ApplianceClient, kind: StatusKind) -> Result<StatusReport, FetchError> {
    let response = client.get(&kind.path())?;
    let section = extract_section(&response.body, kind, client.host()).inspect_err(|err| {
        tracing::debug!(status = response.status, "rejected {} response: {}", kind.section(), err)
    })?;
    Ok(StatusReport {
        kind,
        response,
        section,
    })
}

fn extract_section(body: &str, kind: StatusKind, host: &str) -> Result<Value, FetchError> {
    let mut map = parse_envelope(body)?;
    map.remove(kind.section())
        .ok_or_else(|| FetchError::MissingSection {
            message: kind.missing_message(),
            host: host.to_string(),
        })
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct QueueManagerStatus {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Status")]
    pub status: String,
}

/// The appliance returns a bare object when only one queue manager exists.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> From<OneOrMany<T>> for Vec<T> {
    fn from(value: OneOrMany<T>) -> Self {
        match value {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

pub fn queue_managers(section: &Value) -> Result<Vec<QueueManagerStatus>, FetchError> {
    let parsed: OneOrMany<QueueManagerStatus> =
        serde_json::from_value(section.clone()).map_err(|source| FetchError::UnexpectedShape {
            section: StatusKind::QueueManagers.section(),
            source,
        })?;
    Ok(parsed.into())
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SystemResources {
    pub used_storage: f64,
    pub total_storage: f64,
    pub used_errors_storage: f64,
    pub total_errors_storage: f64,
    pub used_trace_storage: f64,
    pub total_trace_storage: f64,
}

pub fn system_resources(section: &Value) -> Result<SystemResources, FetchError> {
    serde_json::from_value(section.clone()).map_err(|source| FetchError::UnexpectedShape {
        section: StatusKind::SystemResources.section(),
        source,
    })
}

pub fn cpu_usage(section: &Value) -> Result<Value, FetchError> {
    #[derive(Deserialize)]
    struct SystemCpuStatus {
        #[serde(rename = "CpuUsage")]
        cpu_usage: Value,
    }

    let parsed: SystemCpuStatus =
        serde_json::from_value(section.clone()).map_err(|source| FetchError::UnexpectedShape {
            section: StatusKind::SystemCpu.section(),
            source,
        })?;
    Ok(parsed.cpu_usage)
}

pub fn render_queue_managers(host: &str, managers: &[QueueManagerStatus]) -> Vec<String> {
    let mut lines = vec![format!("Queue managers on {}:", host)];
    lines.extend(
        managers
            .iter()
            .map(|qm| format!("{} : {}", qm.name, qm.status)),
    );
    lines
}

pub fn render_system_resources(host: &str, resources: &SystemResources) -> Vec<String> {
    vec![
        format!("MQ System Resource Availability on {}:", host),
        usage_line(
            "Used Storage/Total Available",
            resources.used_storage,
            resources.total_storage,
        ),
        usage_line(
            "Used Error Storage/Total Available",
            resources.used_errors_storage,
            resources.total_errors_storage,
        ),
        usage_line(
            "Used Trace Storage/Total Available",
            resources.used_trace_storage,
            resources.total_trace_storage,
        ),
    ]
}

fn usage_line(label: &str, used: f64, total: f64) -> String {
    let pct = if total > 0.0 {
        format!("{:.2}%", used / total * 100.0)
    } else {
        "n/a".to_string()
    };
    format!("{}: {}/{} ({})", label, used, total, pct)
}

pub fn render_cpu_usage(usage: &Value) -> String {
    format!("CPU Usage: {}", value_to_str(usage))
}

pub fn value_to_str(value: &Value) -> String {
    match value {
        Value::Null => "".into(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        other => serde_json::to_string(other).unwrap_or_default(),
    }
}
