use serde::Deserialize;

/// Settings of the gateway binary.
///
/// Read from an optional `gateway.toml` (or the file given on the command
/// line) and overlaid with `ASSETFLOW_*` environment variables, e.g.
/// `ASSETFLOW_PASSWORD` or `ASSETFLOW_BACKEND_URL`.
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub listen: String,
    pub backend_url: String,
    pub password: String,
    pub static_dir: String,
    pub production: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:3000".to_string(),
            backend_url: "http://localhost:5328".to_string(),
            password: "admin".to_string(),
            static_dir: "dist".to_string(),
            production: false,
        }
    }
}

impl GatewayConfig {
    pub fn load(file: Option<&str>) -> anyhow::Result<Self> {
        let defaults = Self::default();
        let cfg = config::Config::builder()
            .set_default("listen", defaults.listen)?
            .set_default("backend_url", defaults.backend_url)?
            .set_default("password", defaults.password)?
            .set_default("static_dir", defaults.static_dir)?
            .set_default("production", defaults.production)?
            .add_source(config::File::with_name(file.unwrap_or("gateway")).required(file.is_some()))
            .add_source(config::Environment::with_prefix("ASSETFLOW"))
            .build()?;
        let loaded: Self = cfg.try_deserialize()?;
        Ok(Self {
            backend_url: loaded.backend_url.trim_end_matches('/').to_string(),
            ..loaded
        })
    }
}

#[test]
fn test_defaults_without_file() {
    let cfg = GatewayConfig::load(None).unwrap();
    assert!(!cfg.backend_url.ends_with('/'));
    assert!(!cfg.listen.is_empty());
}

#[test]
fn test_missing_explicit_file() {
    assert!(GatewayConfig::load(Some("does/not/exist/gateway")).is_err());
}
