#![forbid(unsafe_code)]

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, anyhow};
use hirewire_domain::SecretString;
use serde::Deserialize;
use tracing::info;

/// Default config path: `~/.hirewire/config.toml`.
pub fn default_config_path() -> anyhow::Result<PathBuf> {
	let home = dirs::home_dir().ok_or_else(|| anyhow!("could not determine home directory"))?;
	Ok(home.join(".hirewire").join("config.toml"))
}

/// Load the server config from TOML and env overrides.
pub fn load_server_config() -> anyhow::Result<ServerConfig> {
	let path = default_config_path()?;
	load_server_config_from_path(&path)
}

/// Same as `load_server_config` but with an explicit config path.
pub fn load_server_config_from_path(path: &Path) -> anyhow::Result<ServerConfig> {
	let file_cfg = read_toml_if_exists(path)
		.with_context(|| format!("read config from {}", path.display()))?
		.unwrap_or_default();

	let mut cfg = ServerConfig::from_file(file_cfg);

	apply_env_overrides(&mut cfg);

	Ok(cfg)
}

/// Server config (v1).
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
	pub server: ServerSettings,
	pub database: DatabaseSettings,
}

/// Server settings loaded by the server.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
	/// PEM-encoded certificate path for QUIC/TLS.
	pub tls_cert_path: Option<PathBuf>,
	/// PEM-encoded private key path for QUIC/TLS.
	pub tls_key_path: Option<PathBuf>,
	/// Optional metrics exporter bind address (host:port).
	pub metrics_bind: Option<String>,
	/// Optional health/readiness HTTP bind address (host:port).
	pub health_bind: Option<String>,
	/// HMAC secret for stateless access tokens. Without it every connection
	/// stays anonymous and authenticated operations are rejected.
	pub auth_hmac_secret: Option<SecretString>,
	/// Send rate limiting: per-connection burst size.
	pub send_rate_limit_per_conn_burst: u32,
	/// Send rate limiting: per-connection messages per minute.
	pub send_rate_limit_per_conn_per_minute: u32,
	/// Send rate limiting: per-room burst size.
	pub send_rate_limit_per_room_burst: u32,
	/// Send rate limiting: per-room messages per minute.
	pub send_rate_limit_per_room_per_minute: u32,
}

/// Database settings loaded by the server.
#[derive(Debug, Clone, Default)]
pub struct DatabaseSettings {
	/// Database URL (sqlite: or postgres:).
	pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
	#[serde(default)]
	server: FileServerSettings,

	#[serde(default)]
	database: FileDatabaseSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileServerSettings {
	tls_cert_path: Option<String>,
	tls_key_path: Option<String>,
	metrics_bind: Option<String>,
	health_bind: Option<String>,
	auth_hmac_secret: Option<String>,
	send_rate_limit_per_conn_burst: Option<u32>,
	send_rate_limit_per_conn_per_minute: Option<u32>,
	send_rate_limit_per_room_burst: Option<u32>,
	send_rate_limit_per_room_per_minute: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct FileDatabaseSettings {
	url: Option<String>,
}

impl ServerConfig {
	fn from_file(file: FileConfig) -> Self {
		Self {
			server: ServerSettings {
				tls_cert_path: file.server.tls_cert_path.filter(|s| !s.trim().is_empty()).map(PathBuf::from),
				tls_key_path: file.server.tls_key_path.filter(|s| !s.trim().is_empty()).map(PathBuf::from),
				metrics_bind: file.server.metrics_bind.filter(|s| !s.trim().is_empty()),
				health_bind: file.server.health_bind.filter(|s| !s.trim().is_empty()),
				auth_hmac_secret: file
					.server
					.auth_hmac_secret
					.filter(|s| !s.trim().is_empty())
					.map(SecretString::new),
				// Zero disables the limiter; sends are unthrottled unless
				// the operator configures both a burst and a refill rate.
				send_rate_limit_per_conn_burst: file.server.send_rate_limit_per_conn_burst.unwrap_or(0),
				send_rate_limit_per_conn_per_minute: file.server.send_rate_limit_per_conn_per_minute.unwrap_or(0),
				send_rate_limit_per_room_burst: file.server.send_rate_limit_per_room_burst.unwrap_or(0),
				send_rate_limit_per_room_per_minute: file.server.send_rate_limit_per_room_per_minute.unwrap_or(0),
			},
			database: DatabaseSettings {
				url: file.database.url.filter(|s| !s.trim().is_empty()),
			},
		}
	}
}

fn read_toml_if_exists(path: &Path) -> anyhow::Result<Option<FileConfig>> {
	match fs::read_to_string(path) {
		Ok(s) => {
			let cfg: FileConfig = toml::from_str(&s).context("parse TOML")?;
			Ok(Some(cfg))
		}
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
		Err(e) => Err(anyhow!(e).context("read config file")),
	}
}

fn apply_env_overrides(cfg: &mut ServerConfig) {
	if let Ok(v) = std::env::var("HIREWIRE_TLS_CERT") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.tls_cert_path = Some(PathBuf::from(v));
			info!("server config: tls_cert_path overridden by env");
		}
	}

	if let Ok(v) = std::env::var("HIREWIRE_TLS_KEY") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.tls_key_path = Some(PathBuf::from(v));
			info!("server config: tls_key_path overridden by env");
		}
	}

	if let Ok(v) = std::env::var("HIREWIRE_AUTH_HMAC_SECRET") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.auth_hmac_secret = Some(SecretString::new(v));
			info!("server auth: auth_hmac_secret overridden by env");
		}
	}

	if let Ok(v) = std::env::var("HIREWIRE_METRICS_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.metrics_bind = Some(v);
			info!("server config: metrics_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("HIREWIRE_HEALTH_BIND") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.server.health_bind = Some(v);
			info!("server config: health_bind overridden by env");
		}
	}

	if let Ok(v) = std::env::var("HIREWIRE_DATABASE_URL") {
		let v = v.trim().to_string();
		if !v.is_empty() {
			cfg.database.url = Some(v);
			info!("database: url overridden by env");
		}
	}

	if let Ok(v) = std::env::var("HIREWIRE_SEND_RATE_LIMIT_PER_CONN_BURST")
		&& let Ok(burst) = v.trim().parse::<u32>()
	{
		cfg.server.send_rate_limit_per_conn_burst = burst;
		info!(burst, "server config: send_rate_limit_per_conn_burst overridden by env");
	}

	if let Ok(v) = std::env::var("HIREWIRE_SEND_RATE_LIMIT_PER_CONN_PER_MINUTE")
		&& let Ok(rate) = v.trim().parse::<u32>()
	{
		cfg.server.send_rate_limit_per_conn_per_minute = rate;
		info!(rate, "server config: send_rate_limit_per_conn_per_minute overridden by env");
	}

	if let Ok(v) = std::env::var("HIREWIRE_SEND_RATE_LIMIT_PER_ROOM_BURST")
		&& let Ok(burst) = v.trim().parse::<u32>()
	{
		cfg.server.send_rate_limit_per_room_burst = burst;
		info!(burst, "server config: send_rate_limit_per_room_burst overridden by env");
	}

	if let Ok(v) = std::env::var("HIREWIRE_SEND_RATE_LIMIT_PER_ROOM_PER_MINUTE")
		&& let Ok(rate) = v.trim().parse::<u32>()
	{
		cfg.server.send_rate_limit_per_room_per_minute = rate;
		info!(rate, "server config: send_rate_limit_per_room_per_minute overridden by env");
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_file_config_leaves_rate_limiting_off() {
		let cfg = ServerConfig::from_file(FileConfig::default());

		assert_eq!(cfg.server.send_rate_limit_per_conn_burst, 0);
		assert_eq!(cfg.server.send_rate_limit_per_conn_per_minute, 0);
		assert_eq!(cfg.server.send_rate_limit_per_room_burst, 0);
		assert_eq!(cfg.server.send_rate_limit_per_room_per_minute, 0);
	}

	#[test]
	fn file_config_rate_limits_are_honored() {
		let file: FileConfig = toml::from_str(
			"[server]\n\
			send_rate_limit_per_conn_burst = 20\n\
			send_rate_limit_per_conn_per_minute = 120\n",
		)
		.expect("parse");

		let cfg = ServerConfig::from_file(file);
		assert_eq!(cfg.server.send_rate_limit_per_conn_burst, 20);
		assert_eq!(cfg.server.send_rate_limit_per_conn_per_minute, 120);
		assert_eq!(cfg.server.send_rate_limit_per_room_burst, 0);
	}
}
