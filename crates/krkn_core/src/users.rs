use std::collections::BTreeMap;

use chrono::Utc;
use kube::Client;
use serde::Serialize;
use serde_json::json;

use crate::api::v1::{Role, User as UserCr, UserSpec, UserStatus};
use crate::auth::{IssuedToken, PasswordHasher, TokenIssuer};
use crate::errors::{Error, Result};
use crate::store::Store;
use crate::vault::Vault;

const PASSWORD_KEY: &str = "password";

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub user_id: String,
    pub name: String,
    pub surname: String,
    pub organization: Option<String>,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
pub struct LoginResult {
    pub token: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub user_id: String,
    pub role: Role,
    pub name: String,
    pub surname: String,
}

/// Operator-local account management: registration (with the
/// first-user-is-admin bootstrap rule) and login (spec §3 "User",
/// §4.7 "Authorization Gate"). Grounded in `target.rs`'s
/// normalise-then-store shape, with the password hash kept in the
/// vault alongside kubeconfigs and the signing key.
pub struct UserService {
    store: Store<UserCr>,
    vault: Vault,
}

impl UserService {
    pub fn new(client: Client, namespace: &str) -> Self {
        Self {
            store: Store::new(client.clone(), namespace),
            vault: Vault::new(client, namespace),
        }
    }

    pub async fn any_admin_registered(&self) -> Result<bool> {
        Ok(self
            .store
            .list(None)
            .await?
            .into_iter()
            .any(|u| u.spec.role == Role::Admin))
    }

    /// Create an account. `metadata.name` is a DNS-1123 slug derived
    /// from `userId` (spec §3 "User"); `Conflict` if that slug is
    /// already taken.
    pub async fn register(&self, req: RegisterUserRequest) -> Result<String> {
        let slug = slugify(&req.user_id);
        if self.store.get_opt(&slug).await?.is_some() {
            return Err(Error::Conflict(format!("user `{}` already registered", req.user_id)));
        }

        let hash = PasswordHasher::hash(&req.password)?;
        let secret_ref = format!("user-{slug}-password");
        self.vault
            .put_blob(
                &secret_ref,
                PASSWORD_KEY,
                hash.as_bytes(),
                BTreeMap::from([("krkn.io/user".to_string(), slug.clone())]),
            )
            .await?;

        let cr = UserCr::new(
            &slug,
            UserSpec {
                user_id: req.user_id,
                name: req.name,
                surname: req.surname,
                organization: req.organization,
                role: req.role,
                password_secret_ref: secret_ref,
            },
        );
        self.store.create(&cr).await?;
        self.store
            .apply_status(
                &slug,
                json!({
                    "apiVersion": "krkn.io/v1",
                    "kind": "User",
                    "status": UserStatus { active: true, created: Some(Utc::now()), last_login: None },
                }),
            )
            .await?;

        Ok(slug)
    }

    /// Verify credentials, stamp `lastLogin`, and issue a token.
    pub async fn login(&self, issuer: &TokenIssuer, token_duration: std::time::Duration, user_id: &str, password: &str) -> Result<LoginResult> {
        let slug = slugify(user_id);
        let cr = self
            .store
            .get_opt(&slug)
            .await?
            .ok_or_else(|| Error::Unauthorized("invalid credentials".into()))?;

        let hash_bytes = self
            .vault
            .get_blob(&cr.spec.password_secret_ref, PASSWORD_KEY)
            .await
            .map_err(|_| Error::Unauthorized("invalid credentials".into()))?;
        let hash = String::from_utf8(hash_bytes).map_err(|_| Error::Unauthorized("invalid credentials".into()))?;

        if !PasswordHasher::verify(password, &hash)? {
            return Err(Error::Unauthorized("invalid credentials".into()));
        }

        let IssuedToken { token, expires_at } = issuer.issue(&cr.spec.user_id, cr.spec.role, token_duration)?;

        let mut status = cr.status.clone().unwrap_or_default();
        status.last_login = Some(Utc::now());
        self.store
            .apply_status(
                &slug,
                json!({ "apiVersion": "krkn.io/v1", "kind": "User", "status": status }),
            )
            .await?;

        Ok(LoginResult {
            token,
            expires_at,
            user_id: cr.spec.user_id,
            role: cr.spec.role,
            name: cr.spec.name,
            surname: cr.spec.surname,
        })
    }
}

/// DNS-1123-safe slug for a `User`'s `metadata.name`, derived from its
/// email-shaped `userId` (spec §3 "User").
fn slugify(user_id: &str) -> String {
    let mut slug: String = user_id
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect();
    slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        slug = "user".to_string();
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalises_email() {
        assert_eq!(slugify("Alice.Smith+test@Example.com"), "alice-smith-test-example-com");
    }
}
