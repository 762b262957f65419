#![forbid(unsafe_code)]

use anyhow::{Context, anyhow};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use hirewire_domain::{Identity, Role};
use hirewire_protocol::pb;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::util::time::unix_secs_now;

/// Claims carried by a `v1.<payload>.<sig>` access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthClaims {
	/// Subject: the portal user id.
	pub sub: i64,
	/// Portal role (CANDIDATE, RECRUITER, ADMIN).
	pub role: String,
	/// Display name snapshot at token mint time.
	#[serde(default)]
	pub name: String,
	/// Expiry as unix seconds.
	pub exp: u64,
}

/// Pull the bearer token out of a Hello, preferring the authorization field.
pub fn token_from_hello(hello: &pb::Hello) -> Option<&str> {
	let auth = hello.authorization.trim();
	if !auth.is_empty() {
		return auth.strip_prefix("Bearer ").map(str::trim).or(Some(auth));
	}

	let token = hello.token.trim();
	if token.is_empty() { None } else { Some(token) }
}

pub fn verify_hmac_token(token: &str, secret: &str) -> anyhow::Result<AuthClaims> {
	let parts = token.split('.').collect::<Vec<_>>();
	if parts.len() != 3 || parts[0] != "v1" {
		return Err(anyhow!("invalid token format"));
	}

	let payload_b64 = parts[1];
	let sig_b64 = parts[2];

	let payload = URL_SAFE_NO_PAD.decode(payload_b64).context("decode token payload")?;
	let expected_sig = sign(payload_b64.as_bytes(), secret.as_bytes());
	let provided_sig = URL_SAFE_NO_PAD.decode(sig_b64).context("decode token signature")?;

	if !constant_time_eq(&expected_sig, &provided_sig) {
		return Err(anyhow!("invalid token signature"));
	}

	let claims: AuthClaims = serde_json::from_slice(&payload).context("parse token claims")?;
	if claims.exp <= unix_secs_now() {
		return Err(anyhow!("token expired"));
	}

	Ok(claims)
}

/// Mint a signed token for the given claims. Used by tests and local tooling;
/// the portal normally mints these on login.
pub fn mint_hmac_token(claims: &AuthClaims, secret: &str) -> anyhow::Result<String> {
	let payload = serde_json::to_vec(claims).context("serialize token claims")?;
	let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
	let sig = sign(payload_b64.as_bytes(), secret.as_bytes());
	let sig_b64 = URL_SAFE_NO_PAD.encode(sig);
	Ok(format!("v1.{payload_b64}.{sig_b64}"))
}

/// Turn verified claims into the identity threaded through every operation.
pub fn identity_from_claims(claims: &AuthClaims) -> anyhow::Result<Identity> {
	let role: Role = claims.role.parse().map_err(|e| anyhow!("token role: {e}"))?;
	Ok(Identity {
		id: claims.sub,
		role,
		name: claims.name.clone(),
	})
}

fn sign(payload_b64: &[u8], secret: &[u8]) -> Vec<u8> {
	let mut mac = Hmac::<Sha256>::new_from_slice(secret).expect("hmac key");
	mac.update(payload_b64);
	mac.finalize().into_bytes().to_vec()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
	if a.len() != b.len() {
		return false;
	}

	let mut diff = 0u8;
	for (x, y) in a.iter().zip(b.iter()) {
		diff |= x ^ y;
	}

	diff == 0
}
