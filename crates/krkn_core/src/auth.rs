use std::collections::BTreeMap;

use argon2::password_hash::{rand_core::OsRng as PwOsRng, PasswordHash, PasswordHasher as _, PasswordVerifier as _, SaltString};
use argon2::Argon2;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use ed25519_dalek::pkcs8::EncodePrivateKey;
use ed25519_dalek::SigningKey;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use kube::Client;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::api::v1::Role;
use crate::errors::{Error, Result, StdError};
use crate::vault::Vault;

const SIGNING_SECRET_NAME: &str = "krkn-operator-signing-key";

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
    sub: String,
    role: Role,
    exp: i64,
    iat: i64,
}

/// Issued-token summary returned by login/registration handlers.
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

pub struct AuthenticatedIdentity {
    pub user_id: String,
    pub role: Role,
}

/// Ed25519/EdDSA token issuance, following the teacher's
/// `util::jwt_keys::Ed25519KeyPair` shape but generalised behind the
/// spec's external `IssueToken`/`ValidateToken` contract (spec §4.8).
/// The signing secret is a 32-byte value from a secure RNG persisted in
/// the vault on first use (REDESIGN FLAGS: the source's
/// `time.Now().UnixNano() % 256` byte generator is explicitly
/// disallowed).
pub struct TokenIssuer {
    signing_key: SigningKey,
}

impl TokenIssuer {
    /// Load the persisted signing key, generating and storing one on
    /// first use.
    pub async fn load_or_create(client: Client, namespace: &str) -> Result<Self> {
        let vault = Vault::new(client, namespace);
        match vault.get_kubeconfig(SIGNING_SECRET_NAME).await {
            Ok(existing) => {
                let bytes = STANDARD
                    .decode(existing.trim())
                    .map_err(|e| Error::internal(StdError::DecodingError(e.to_string())))?;
                let key_bytes: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| Error::internal(StdError::CryptoError("signing key has wrong length".into())))?;
                Ok(Self {
                    signing_key: SigningKey::from_bytes(&key_bytes),
                })
            }
            Err(Error::NotFound(_)) => {
                let signing_key = SigningKey::generate(&mut OsRng);
                let encoded = STANDARD.encode(signing_key.to_bytes());
                vault
                    .put_kubeconfig(SIGNING_SECRET_NAME, &encoded, BTreeMap::from([("krkn.io/purpose".to_string(), "signing-key".to_string())]))
                    .await?;
                Ok(Self { signing_key })
            }
            Err(e) => Err(e),
        }
    }

    pub fn issue(&self, user_id: &str, role: Role, duration: std::time::Duration) -> Result<IssuedToken> {
        let now = Utc::now();
        let expires_at = now + ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::hours(24));

        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: expires_at.timestamp(),
            iat: now.timestamp(),
        };

        let private_key = self
            .signing_key
            .to_pkcs8_der()
            .map_err(|e| Error::internal(StdError::CryptoError(e.to_string())))?;

        let token = encode(
            &Header::new(Algorithm::EdDSA),
            &claims,
            &EncodingKey::from_ed_der(private_key.as_bytes()),
        )
        .map_err(|e| Error::internal(StdError::CryptoError(e.to_string())))?;

        Ok(IssuedToken { token, expires_at })
    }

    pub fn validate(&self, token: &str) -> Result<AuthenticatedIdentity> {
        let verifying_key = self.signing_key.verifying_key();
        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.validate_exp = true;

        let data = decode::<Claims>(
            token,
            &DecodingKey::from_ed_der(verifying_key.as_bytes()),
            &validation,
        )
        .map_err(|e| Error::Unauthorized(e.to_string()))?;

        Ok(AuthenticatedIdentity {
            user_id: data.claims.sub,
            role: data.claims.role,
        })
    }
}

/// Argon2id password hashing (spec §4.8), enriched from the pack's
/// password-hashing examples since the teacher has no user-account
/// concept of its own.
pub struct PasswordHasher;

impl PasswordHasher {
    pub fn hash(password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut PwOsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|h| h.to_string())
            .map_err(|e| Error::internal(StdError::CryptoError(e.to_string())))
    }

    pub fn verify(password: &str, hash: &str) -> Result<bool> {
        let parsed = PasswordHash::new(hash).map_err(|e| Error::internal(StdError::CryptoError(e.to_string())))?;
        Ok(Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_hash_roundtrips() {
        let hash = PasswordHasher::hash("hunter2").unwrap();
        assert!(PasswordHasher::verify("hunter2", &hash).unwrap());
        assert!(!PasswordHasher::verify("wrong", &hash).unwrap());
    }

    #[test]
    fn token_issue_and_validate_roundtrip() {
        let issuer = TokenIssuer {
            signing_key: SigningKey::generate(&mut OsRng),
        };
        let issued = issuer.issue("alice@example.com", Role::Admin, std::time::Duration::from_secs(3600)).unwrap();
        let identity = issuer.validate(&issued.token).unwrap();
        assert_eq!(identity.user_id, "alice@example.com");
        assert!(matches!(identity.role, Role::Admin));
    }

    #[test]
    fn expired_token_is_rejected() {
        let issuer = TokenIssuer {
            signing_key: SigningKey::generate(&mut OsRng),
        };
        let issued = issuer.issue("alice@example.com", Role::User, std::time::Duration::from_secs(0)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(1100));
        assert!(issuer.validate(&issued.token).is_err());
    }
}
