//! Scrutinizer Workspace - headless workspace loader.
//!
//! Loads workspace, filter, recent file and log files into a workspace tree
//! without any GUI, prints the resulting tree and optionally saves it as a
//! workspace file.
//!
//! ```text
//! scrutinizer-workspace [--config-dir <dir>] [--default] [--save <out.lsz>] <files...>
//! ```
//!
//! - `--config-dir`: where `Scrutinizer Config.yaml`, the default workspace
//!   and the recent file database live (default: `Scrutinizer Data`)
//! - `--default`: load the default workspace before the given files
//! - `--save`: write the loaded workspace to a file

use anyhow::{Context, Result};
use camino::Utf8PathBuf;
use clap::Parser;
use scrutinizer_workspace::headless::HeadlessHost;
use scrutinizer_workspace::view::NullViewSink;
use scrutinizer_workspace::{APP_NAME, ConfigManager, ConfigurationController, VERSION, Workspace};

/// Load log analysis workspaces, filters and logs without a GUI
#[derive(Parser, Debug)]
#[command(name = "scrutinizer-workspace", version, about)]
struct Args {
    /// Directory holding the config file, default workspace and recent file database
    #[arg(long, default_value = "Scrutinizer Data")]
    config_dir: Utf8PathBuf,

    /// Load the default workspace before the given files
    #[arg(long = "default")]
    load_default: bool,

    /// Write the loaded workspace to this file
    #[arg(long, value_name = "OUT.lsz")]
    save: Option<Utf8PathBuf>,

    /// Workspace, filter, recent file, plugin or log files to open
    files: Vec<Utf8PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_manager = ConfigManager::new(&args.config_dir)?;
    let config = config_manager.load_app_config()?;

    let _guard = scrutinizer_workspace::logging::setup_from_config(&config)?;
    tracing::info!("Starting {} v{}", APP_NAME, VERSION);

    let host = HeadlessHost::new();
    let mut workspace = Workspace::new(host.host(), Box::new(NullViewSink));
    let mut controller = ConfigurationController::from_config_manager(&config_manager, config);

    if let Err(err) = controller.load_recent_files(&mut workspace) {
        tracing::warn!("Recent file database not loaded: {}", err);
    }

    if args.load_default && !controller.load_default_workspace(&mut workspace)? {
        tracing::info!("No default workspace at {}", controller.default_workspace_path());
    }

    controller
        .load_file_list(&mut workspace, &args.files)
        .context("Failed to load files")?;

    print!("{}", workspace.dump());

    if let Some(save) = &args.save {
        controller
            .save_workspace_file(&mut workspace, save, false)
            .with_context(|| format!("Failed to save workspace {}", save))?;
        println!("Saved {}", save);
    }

    for warning in host.prompt.with_state(|s| s.warnings.clone()) {
        eprintln!("warning: {}", warning);
    }

    workspace.begin_shutdown();
    let faults = workspace.shutdown();
    if faults > 0 {
        tracing::warn!("Shutdown found {} tree integrity faults", faults);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_flags_and_files() {
        let args = Args::try_parse_from([
            "scrutinizer-workspace",
            "--config-dir",
            "/tmp/cfg",
            "--default",
            "--save",
            "out.lsz",
            "a.flt",
            "b.log",
        ])
        .unwrap();

        assert_eq!(args.config_dir, Utf8PathBuf::from("/tmp/cfg"));
        assert!(args.load_default);
        assert_eq!(args.save, Some(Utf8PathBuf::from("out.lsz")));
        assert_eq!(args.files, vec![Utf8PathBuf::from("a.flt"), Utf8PathBuf::from("b.log")]);
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["scrutinizer-workspace"]).unwrap();
        assert_eq!(args.config_dir, Utf8PathBuf::from("Scrutinizer Data"));
        assert!(!args.load_default);
        assert!(args.save.is_none());
        assert!(args.files.is_empty());
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Args::try_parse_from(["scrutinizer-workspace", "--bogus"]).is_err());
    }
}
