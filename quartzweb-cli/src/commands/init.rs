use anyhow::{bail, Context, Result};
use std::fs;
use std::path::Path;

use quartzweb_core::config::QuartzConfig;

/// Write the default configuration to `path`.
pub fn run(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }

    let content = QuartzConfig::default().to_toml()?;
    fs::write(path, content).with_context(|| format!("failed to write {}", path.display()))?;

    println!("Wrote default configuration to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_loadable_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("quartzweb.toml");
        run(&path, false).unwrap();

        let loaded = QuartzConfig::from_file(&path).unwrap();
        assert_eq!(loaded, QuartzConfig::default());
    }

    #[test]
    fn refuses_to_overwrite() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("quartzweb.toml");
        fs::write(&path, "# mine").unwrap();

        assert!(run(&path, false).is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), "# mine");

        run(&path, true).unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("[server]"));
    }
}
