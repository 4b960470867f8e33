use chrono::{DateTime, Utc};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Deserialize, Serialize, Clone, Debug, JsonSchema, PartialEq, Eq, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
}

/// `User` is an operator-local account (spec §3). `metadata.name` is a
/// DNS-1123 slug derived from `spec.userId`; the email itself lives in
/// the spec so it survives the slugging.
#[derive(CustomResource, Deserialize, Serialize, Clone, Debug, JsonSchema)]
#[cfg_attr(test, derive(Default))]
#[kube(
    group = "krkn.io",
    version = "v1",
    kind = "User",
    namespaced,
    shortname = "user"
)]
#[kube(status = "UserStatus")]
pub struct UserSpec {
    /// Login identifier, an email address.
    pub user_id: String,
    pub name: String,
    pub surname: String,
    #[serde(default)]
    pub organization: Option<String>,
    pub role: Role,
    /// Name of the vault `Secret` holding the argon2 password hash.
    pub password_secret_ref: String,
}

#[derive(Deserialize, Serialize, Clone, Default, Debug, JsonSchema, PartialEq)]
pub struct UserStatus {
    pub active: bool,
    pub created: Option<DateTime<Utc>>,
    pub last_login: Option<DateTime<Utc>>,
}
