use ando_core::config::ProjectConfig;
use ando_core::identity::Identity;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use http::HeaderMap;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use super::cookie;
use super::AuthOutcome;

#[derive(Debug, Deserialize)]
struct Claims {
    sub: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    plan: Option<String>,
}

/// Bearer-token / token-cookie path of the authenticator (spec §4.2).
///
/// Extraction order: `Authorization: Bearer <token>` first, then
/// `tokenCookieName` if configured. Any verification or parsing failure —
/// including a project with neither `tokenPublicKey` nor `tokenSecret` set —
/// is logged and reported as `Absent`, never propagated as an error: an
/// invalid token is indistinguishable from a missing one at this stage.
pub fn authenticate(headers: &HeaderMap, project: &ProjectConfig) -> AuthOutcome {
    let Some(token) = extract_token(headers, project) else {
        return AuthOutcome::Absent;
    };

    let (decoding_key, algorithm) = match build_decoding_key(project) {
        Some(pair) => pair,
        None => {
            tracing::warn!(
                prefix = %project.prefix,
                "project has neither tokenPublicKey nor tokenSecret configured"
            );
            return AuthOutcome::Absent;
        }
    };

    let mut validation = Validation::new(algorithm);
    validation.validate_exp = true;

    match decode::<Claims>(&token, &decoding_key, &validation) {
        Ok(data) => match data.claims.sub {
            Some(sub) if !sub.is_empty() => {
                let role = data.claims.role.unwrap_or_else(|| "ROLE_USER".to_string());
                let plan = data.claims.plan.unwrap_or_else(|| "FREE".to_string());
                AuthOutcome::Identity(Identity::new(sub, role, plan))
            }
            _ => {
                tracing::warn!(prefix = %project.prefix, "token has no 'sub' claim");
                AuthOutcome::Absent
            }
        },
        Err(err) => {
            tracing::warn!(prefix = %project.prefix, error = %err, "token verification failed");
            AuthOutcome::Absent
        }
    }
}

fn extract_token(headers: &HeaderMap, project: &ProjectConfig) -> Option<String> {
    if let Some(raw) = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
    {
        let trimmed = raw.trim();
        let bearer = trimmed
            .strip_prefix("Bearer ")
            .or_else(|| trimmed.strip_prefix("bearer "));
        if let Some(rest) = bearer {
            let rest = rest.trim();
            if !rest.is_empty() {
                return Some(rest.to_string());
            }
        }
    }

    let cookie_name = project.token_cookie_name.as_deref()?;
    cookie::read(headers, cookie_name)
}

fn build_decoding_key(project: &ProjectConfig) -> Option<(DecodingKey, Algorithm)> {
    if let Some(public_key) = &project.token_public_key {
        return decode_x509_spki_rsa(public_key)
            .map(|key| (key, Algorithm::RS256))
            .map_err(|err| tracing::warn!(prefix = %project.prefix, error = %err, "invalid tokenPublicKey"))
            .ok();
    }
    if let Some(secret) = &project.token_secret {
        let raw = STANDARD
            .decode(secret)
            .map_err(|err| tracing::warn!(prefix = %project.prefix, error = %err, "invalid tokenSecret"))
            .ok()?;
        return Some((DecodingKey::from_secret(&raw), Algorithm::HS256));
    }
    None
}

/// `tokenPublicKey` carries a base64-encoded X.509 SubjectPublicKeyInfo DER
/// blob. `jsonwebtoken::DecodingKey` only parses PEM or raw PKCS1 DER, not
/// SPKI, so the key is pulled apart with `rsa` first and re-assembled from
/// its modulus/exponent components.
fn decode_x509_spki_rsa(b64_der: &str) -> anyhow::Result<DecodingKey> {
    use rsa::pkcs8::DecodePublicKey;
    use rsa::traits::PublicKeyParts;

    let der = STANDARD.decode(b64_der.trim())?;
    let public_key = rsa::RsaPublicKey::from_public_key_der(&der)?;
    let n = URL_SAFE_NO_PAD.encode(public_key.n().to_bytes_be());
    let e = URL_SAFE_NO_PAD.encode(public_key.e().to_bytes_be());
    Ok(DecodingKey::from_rsa_components(&n, &e)?)
}
