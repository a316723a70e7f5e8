use anyhow::Context;
use std::path::Path;
use stencil_core::blueprint::StackDescriptor;
use stencil_core::config::{GeneratorConfig, WarnLevel};
use stencil_core::paths;

pub fn run(
    root: &Path,
    name: Option<&str>,
    language: &str,
    frameworks: &[String],
    blueprint: Option<&str>,
    variables: &[String],
) -> anyhow::Result<()> {
    let project_name = name
        .map(str::to_string)
        .or_else(|| root.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "project".to_string());

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {} (left untouched)", paths::CONFIG_FILE);
        println!("\nAlready initialized. Next: stencil analyze");
        return Ok(());
    }

    let framework_refs: Vec<&str> = frameworks.iter().map(String::as_str).collect();
    let mut config = GeneratorConfig::new(
        project_name.as_str(),
        StackDescriptor::new(language, &framework_refs),
    );
    config.blueprint = blueprint.map(str::to_string);
    for pair in variables {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("--var '{pair}' is not KEY=VALUE"))?;
        config
            .variables
            .insert(key.trim().to_string(), value.to_string());
    }

    for warning in config.validate() {
        match warning.level {
            WarnLevel::Error => anyhow::bail!("invalid configuration: {}", warning.message),
            WarnLevel::Warning => println!("  warning: {}", warning.message),
        }
    }

    config.save(root).context("failed to write config.yaml")?;
    println!("  created: {}", paths::CONFIG_FILE);
    println!("\nInitialized for '{project_name}' ({language}).");
    println!("Next: stencil preview");
    Ok(())
}
