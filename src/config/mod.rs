// src/config/mod.rs
mod models;

pub use models::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a file (YAML or JSON)
pub async fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path = path.as_ref();
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config = parse_config(&contents, path)?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("yaml") | Some("yml") => {
            serde_yaml::from_str(contents).context("Failed to parse YAML config")?
        }
        _ => serde_json::from_str(contents).context("Failed to parse JSON config")?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_by_extension() {
        let yaml = parse_config("port: 1\nbackend: a:2\n", Path::new("proxy.yml")).unwrap();
        assert_eq!(yaml.listen_port().unwrap(), 1);

        let json = parse_config(r#"{"port": 1, "backend": "a:2"}"#, Path::new("proxy.json")).unwrap();
        assert_eq!(json.listen_port().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_load_config_rejects_invalid_backend() {
        let path = std::env::temp_dir().join(format!("tcp-failover-{}.json", uuid::Uuid::new_v4()));
        tokio::fs::write(&path, r#"{"port": 7000, "backend": ":80"}"#)
            .await
            .unwrap();

        let err = load_config(&path).await.unwrap_err();
        let root = err.downcast_ref::<ConfigError>().unwrap();
        assert!(matches!(root, ConfigError::InvalidBackendSpec(_)));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn test_load_config_missing_file() {
        assert!(load_config("/nonexistent/tcp-failover.yaml").await.is_err());
    }
}
