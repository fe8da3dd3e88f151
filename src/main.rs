//! SideWinder X6 macro-key driver
//!
//! Bridges the keyboard's macro bank and extended media keys to user-defined
//! macro executables and a uinput virtual keyboard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context};
use clap::Parser;
use nix::unistd::User;
use tracing::info;

use sidewinderd::action::UserActionRunner;
use sidewinderd::cli::Cli;
use sidewinderd::dispatcher::Dispatcher;
use sidewinderd::profile::ProfileState;

/// Per-user directory holding the profile tree
const PROFILE_ROOT_DIR: &str = ".sidewinderx6";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sidewinderd=info".parse().unwrap())
                .add_directive("sidewinder_usb=info".parse().unwrap()),
        )
        .init();

    let user = User::from_name(&cli.user)
        .context("user lookup failed")?
        .ok_or_else(|| anyhow!("no such user: {}", cli.user))?;
    info!("running macros as {} (uid {})", user.name, user.uid);

    let root = cli
        .config_dir
        .unwrap_or_else(|| user.dir.join(PROFILE_ROOT_DIR));
    let profiles = ProfileState::new(root);
    profiles.bootstrap();

    let actions = UserActionRunner::new(user.uid.as_raw(), user.gid.as_raw(), user.dir);

    let running = setup_interrupt_handler();
    let dispatcher = Dispatcher::new(profiles, Box::new(actions), Arc::clone(&running))
        .context("startup failed")?;

    info!("sidewinderd starting");
    dispatcher.run();
    Ok(())
}

/// Set up a Ctrl-C handler that lowers the given flag when triggered.
/// Returns the Arc<AtomicBool> for use in the main loop.
fn setup_interrupt_handler() -> Arc<AtomicBool> {
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);

    ctrlc::set_handler(move || {
        running_clone.store(false, Ordering::SeqCst);
    })
    .ok();

    running
}
