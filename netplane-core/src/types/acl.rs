//! Network access control list types.

use serde::{Deserialize, Serialize};

/// A single ACL rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAclRule {
    /// "allow", "reject" or "drop"
    pub action: String,

    /// Comma separated subjects, e.g. "10.0.0.0/8,@lxdbr0/peer1"
    #[serde(default)]
    pub source: String,

    #[serde(default)]
    pub destination: String,

    #[serde(default)]
    pub protocol: String,

    #[serde(default)]
    pub destination_port: String,

    #[serde(default)]
    pub description: String,
}

/// An access control list owned by a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkAcl {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub ingress: Vec<NetworkAclRule>,

    #[serde(default)]
    pub egress: Vec<NetworkAclRule>,
}
