//! Connection-string records for newly created deployments.

use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use crate::dbaas::Deployment;
use crate::error::{ApiError, ProvisionerError, Result};

/// Connection details written for one deployment.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConnectionRecord {
    /// Remote deployment id.
    pub id: String,
    /// Resource type.
    #[serde(rename = "type")]
    pub deployment_type: String,
    /// Direct connection strings, hosts rewritten.
    pub connection_strings: Vec<String>,
    /// Every `host:port` across the connection strings, rewritten.
    pub hosts: Vec<String>,
}

impl ConnectionRecord {
    /// Builds a record, rewriting hosts through `endpoint_map`.
    ///
    /// # Errors
    ///
    /// Returns an error if the deployment exposes no connection strings.
    pub fn from_deployment(
        deployment: &Deployment,
        endpoint_map: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let direct = deployment
            .connection_strings
            .as_ref()
            .map(|c| c.direct.as_slice())
            .unwrap_or_default();
        if direct.is_empty() {
            return Err(ApiError::InvalidResponse {
                message: format!("deployment {} has no connection strings", deployment.id),
            }
            .into());
        }

        let mut connection_strings = Vec::with_capacity(direct.len());
        let mut hosts = Vec::new();
        for conn in direct {
            let (rewritten, conn_hosts) = rewrite_hosts(conn, endpoint_map);
            connection_strings.push(rewritten);
            for host in conn_hosts {
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
        }

        Ok(Self {
            id: deployment.id.clone(),
            deployment_type: deployment.deployment_type.clone(),
            connection_strings,
            hosts,
        })
    }
}

/// Rewrites every host of a (possibly multi-host) connection URI.
///
/// Returns the rewritten URI and its `host:port` entries.
#[must_use]
pub fn rewrite_hosts(conn: &str, endpoint_map: &BTreeMap<String, String>) -> (String, Vec<String>) {
    let after_scheme = conn.find("://").map_or(0, |i| i + 3);
    let rest = &conn[after_scheme..];
    let authority_end = after_scheme + rest.find(['/', '?']).unwrap_or(rest.len());
    let authority = &conn[after_scheme..authority_end];
    let hosts_start = after_scheme + authority.rfind('@').map_or(0, |i| i + 1);

    let hosts: Vec<String> = conn[hosts_start..authority_end]
        .split(',')
        .filter(|h| !h.is_empty())
        .map(|entry| {
            let (host, port) = entry
                .split_once(':')
                .map_or((entry, None), |(h, p)| (h, Some(p)));
            let host = endpoint_map.get(host).map_or(host, String::as_str);
            match port {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            }
        })
        .collect();

    let rewritten = format!(
        "{}{}{}",
        &conn[..hosts_start],
        hosts.join(","),
        &conn[authority_end..]
    );
    (rewritten, hosts)
}

/// Writes records as YAML, keyed and ordered by deployment name.
///
/// # Errors
///
/// Returns an error if serialization or the file write fails.
pub fn write_records(records: &BTreeMap<String, ConnectionRecord>, path: &Path) -> Result<()> {
    let yaml = serde_yaml::to_string(records).map_err(|e| {
        ProvisionerError::internal(format!("Failed to serialize connection records: {e}"))
    })?;
    debug!("Serialized {} connection record(s)", records.len());

    std::fs::write(path, yaml)?;
    info!("Wrote connection strings to {}", path.display());
    Ok(())
}
