//! Deployment specification types.
//!
//! [`RawDeployment`] mirrors one YAML document as written by the operator.
//! [`DeploymentDescriptor`] is the validated, normalized form the
//! provisioning engine consumes; its shape makes the placement rules
//! unrepresentable when violated.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The only supported `config_version`.
pub const CONFIG_VERSION: u32 = 1;

/// A deployment record as read from a specification file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawDeployment {
    /// Schema version, must be [`CONFIG_VERSION`].
    #[serde(default)]
    pub config_version: u32,
    /// Resource type (e.g. `redis`).
    #[serde(rename = "type", default)]
    pub deployment_type: String,
    /// Logical deployment name.
    #[serde(default)]
    pub name: String,
    /// Name of an existing cluster to place the deployment in.
    #[serde(default)]
    pub cluster: Option<String>,
    /// Datacenter slug to place the deployment in.
    #[serde(default)]
    pub datacenter: Option<String>,
    /// Requested version.
    #[serde(default)]
    pub version: Option<String>,
    /// Enable SSL.
    #[serde(default)]
    pub ssl: bool,
    /// Use the alternate storage engine.
    #[serde(default)]
    pub wired_tiger: bool,
    /// Scaling units.
    #[serde(default)]
    pub scaling: Option<u32>,
    /// Polling timeout override in seconds.
    #[serde(default)]
    pub timeout: Option<f64>,
    /// Tags to apply.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Team role grants.
    #[serde(default)]
    pub teams: Vec<RawTeam>,
    /// Free-form notes.
    #[serde(default)]
    pub notes: Option<String>,
}

/// A team role grant as read from a specification file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawTeam {
    /// Team identifier.
    pub id: String,
    /// Role name.
    pub role: String,
}

/// Supported resource types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceType {
    /// MongoDB.
    MongoDb,
    /// Redis.
    Redis,
    /// PostgreSQL.
    PostgreSql,
    /// Elasticsearch.
    ElasticSearch,
    /// RethinkDB.
    Rethink,
    /// RabbitMQ.
    RabbitMq,
    /// etcd.
    Etcd,
    /// MySQL.
    MySql,
    /// JanusGraph.
    JanusGraph,
    /// ScyllaDB.
    Scylla,
    /// Disque.
    Disque,
}

impl ResourceType {
    /// All supported resource types.
    pub const ALL: [Self; 11] = [
        Self::MongoDb,
        Self::Redis,
        Self::PostgreSql,
        Self::ElasticSearch,
        Self::Rethink,
        Self::RabbitMq,
        Self::Etcd,
        Self::MySql,
        Self::JanusGraph,
        Self::Scylla,
        Self::Disque,
    ];

    /// Identifier used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MongoDb => "mongodb",
            Self::Redis => "redis",
            Self::PostgreSql => "postgresql",
            Self::ElasticSearch => "elastic_search",
            Self::Rethink => "rethink",
            Self::RabbitMq => "rabbitmq",
            Self::Etcd => "etcd",
            Self::MySql => "mysql",
            Self::JanusGraph => "janusgraph",
            Self::Scylla => "scylla",
            Self::Disque => "disque",
        }
    }

    /// Whether the alternate storage engine can be selected for this type.
    #[must_use]
    pub const fn supports_storage_engine(self) -> bool {
        matches!(self, Self::MongoDb)
    }
}

impl FromStr for ResourceType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown resource type '{s}'"))
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access level grantable to a team on a deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TeamRole {
    /// Full control.
    Admin,
    /// Read/write data access.
    Developer,
    /// Operational access.
    Manager,
}

impl TeamRole {
    /// Role name used by the API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Developer => "developer",
            Self::Manager => "manager",
        }
    }
}

impl FromStr for TeamRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Self::Admin),
            "developer" => Ok(Self::Developer),
            "manager" => Ok(Self::Manager),
            other => Err(format!("unknown team role '{other}'")),
        }
    }
}

impl fmt::Display for TeamRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a deployment lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Inside an existing cluster, referenced by name.
    Cluster {
        /// Cluster name.
        name: String,
    },
    /// In a datacenter, with optional sizing.
    Datacenter {
        /// Datacenter slug.
        slug: String,
        /// Scaling units.
        scaling: Option<u32>,
        /// Alternate storage engine enabled.
        wired_tiger: bool,
    },
}

impl Placement {
    /// Requested scaling, if any.
    #[must_use]
    pub const fn scaling(&self) -> Option<u32> {
        match self {
            Self::Datacenter { scaling, .. } => *scaling,
            Self::Cluster { .. } => None,
        }
    }
}

/// A validated deployment request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentDescriptor {
    /// Logical deployment name.
    pub name: String,
    /// Resource type.
    pub resource_type: ResourceType,
    /// Placement.
    pub placement: Placement,
    /// Requested version.
    pub version: Option<String>,
    /// Enable SSL.
    pub ssl: bool,
    /// Polling timeout override.
    pub timeout: Option<Duration>,
    /// Tags to apply.
    pub tags: Vec<String>,
    /// At most one role per team.
    pub team_roles: BTreeMap<String, TeamRole>,
    /// Free-form notes.
    pub notes: Option<String>,
}

impl DeploymentDescriptor {
    /// Creates a datacenter-placed descriptor with no optional settings.
    #[must_use]
    pub fn in_datacenter(name: &str, resource_type: ResourceType, datacenter: &str) -> Self {
        Self::with_placement(
            name,
            resource_type,
            Placement::Datacenter {
                slug: datacenter.to_string(),
                scaling: None,
                wired_tiger: false,
            },
        )
    }

    /// Creates a cluster-placed descriptor with no optional settings.
    #[must_use]
    pub fn in_cluster(name: &str, resource_type: ResourceType, cluster: &str) -> Self {
        Self::with_placement(
            name,
            resource_type,
            Placement::Cluster {
                name: cluster.to_string(),
            },
        )
    }

    fn with_placement(name: &str, resource_type: ResourceType, placement: Placement) -> Self {
        Self {
            name: name.to_string(),
            resource_type,
            placement,
            version: None,
            ssl: false,
            timeout: None,
            tags: Vec::new(),
            team_roles: BTreeMap::new(),
            notes: None,
        }
    }

    /// Sets the scaling of a datacenter placement. No-op for cluster placement.
    #[must_use]
    pub fn with_scaling(mut self, units: u32) -> Self {
        if let Placement::Datacenter { scaling, .. } = &mut self.placement {
            *scaling = Some(units);
        }
        self
    }

    /// Sets the requested version.
    #[must_use]
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = Some(version.to_string());
        self
    }

    /// Sets the polling timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the tags.
    #[must_use]
    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Adds a team role grant.
    #[must_use]
    pub fn with_team_role(mut self, team_id: &str, role: TeamRole) -> Self {
        self.team_roles.insert(team_id.to_string(), role);
        self
    }
}
