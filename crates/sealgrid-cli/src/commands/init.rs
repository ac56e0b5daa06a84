use std::path::Path;

use anyhow::bail;

use crate::config::SearchConfig;

pub fn init(path: &str, nodes: usize, dataset: &str, force: bool) -> anyhow::Result<()> {
    let output = Path::new(path);
    if output.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", output.display());
    }

    let config = SearchConfig::scaffold(nodes, Path::new(dataset));
    config.validate()?;
    std::fs::write(output, config.to_toml_string()?)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}
