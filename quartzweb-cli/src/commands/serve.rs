use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use quartzweb_core::config::QuartzConfig;
use quartzweb_core::http::HttpServer;
use quartzweb_core::storage::{DiskTempStore, TempFileStore};

use crate::demo;

/// Command-line values that win over file and environment
#[derive(Debug, Default)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub temp_dir: Option<PathBuf>,
}

/// Load configuration and run the server until the listener fails.
pub fn run(config_path: &Path, overrides: Overrides) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    quartzweb_core::logging::init_logging(&config.logging);

    let store = DiskTempStore::new(&config.uploads.temp_dir).with_context(|| {
        format!("failed to create temp directory {}", config.uploads.temp_dir.display())
    })?;
    if config.uploads.clear_on_startup {
        store.clear().with_context(|| format!("failed to clear {}", store.root().display()))?;
        log::info!("Cleared temp directory {}", store.root().display());
    }
    let store: Arc<dyn TempFileStore> = Arc::new(store);

    let server = HttpServer::from_config(&config.server, demo::router(), store);
    server.serve(config.server.bind_address())?;
    Ok(())
}

fn load_config(path: &Path, overrides: Overrides) -> Result<QuartzConfig> {
    let mut config = QuartzConfig::load_from(path)?;

    if let Some(host) = overrides.host {
        config.server.host = host;
    }
    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(temp_dir) = overrides.temp_dir {
        config.uploads.temp_dir = temp_dir;
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn overrides_win_over_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("quartzweb.toml");
        fs::write(&path, "[server]\nhost = \"127.0.0.1\"\nport = 8100\n").unwrap();

        let config = load_config(
            &path,
            Overrides { port: Some(9200), ..Default::default() },
        )
        .unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9200);
    }

    #[test]
    fn invalid_override_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let result = load_config(
            &tmp.path().join("absent.toml"),
            Overrides { host: Some(String::new()), ..Default::default() },
        );
        assert!(result.is_err());
    }
}
