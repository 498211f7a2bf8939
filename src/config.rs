use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

const DEFAULT_PORT: u16 = 3000;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub public_dir: String,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Filesystem-backed object store API")]
pub struct Args {
    /// Host to bind to (overrides FS_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding one sub-directory per bucket (overrides FS_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Directory served for every path the API does not handle (overrides FS_STORE_PUBLIC_DIR)
    #[arg(long)]
    pub public_dir: Option<String>,

    /// Maximum accepted upload body in bytes (overrides FS_STORE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig.
    pub fn from_env_and_args() -> Result<Self> {
        Self::resolve(Args::parse(), |name| env::var(name).ok())
    }

    /// Merge parsed CLI args over values looked up by `var`, then defaults.
    pub fn resolve(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_host = var("FS_STORE_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let env_port = parse_var(&var, "PORT")?.unwrap_or(DEFAULT_PORT);
        let env_storage = var("FS_STORE_STORAGE_DIR").unwrap_or_else(|| "./uploads".into());
        let env_public = var("FS_STORE_PUBLIC_DIR").unwrap_or_else(|| "./public".into());
        let env_max_upload =
            parse_var(&var, "FS_STORE_MAX_UPLOAD_BYTES")?.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            public_dir: args.public_dir.unwrap_or(env_public),
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Parse an optional variable; an empty value counts as unset.
fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match var(name).filter(|value| !value.is_empty()) {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::resolve(Args::default(), lookup(&[])).unwrap();
        assert_eq!(cfg.addr(), "0.0.0.0:3000");
        assert_eq!(cfg.storage_dir, "./uploads");
        assert_eq!(cfg.public_dir, "./public");
        assert_eq!(cfg.max_upload_bytes, 100 * 1024 * 1024);
    }

    #[test]
    fn test_env_then_args_precedence() {
        let env = lookup(&[("PORT", "8080"), ("FS_STORE_STORAGE_DIR", "/srv/objects")]);
        let cfg = AppConfig::resolve(Args::default(), &env).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.storage_dir, "/srv/objects");

        let args = Args {
            port: Some(9000),
            ..Args::default()
        };
        let cfg = AppConfig::resolve(args, &env).unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.storage_dir, "/srv/objects");
    }

    #[test]
    fn test_empty_port_uses_default() {
        let cfg = AppConfig::resolve(Args::default(), lookup(&[("PORT", "")])).unwrap();
        assert_eq!(cfg.port, 3000);
    }

    #[test]
    fn test_bad_port_is_error() {
        let err = AppConfig::resolve(Args::default(), lookup(&[("PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }
}
