//! Fire-and-forget execution of user macros.
//!
//! The dispatcher only ever *submits* an action; it never waits. A slow or
//! hung macro must not stall device polling.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::thread;

use tracing::{info, warn};

/// Capability to launch a macro executable without blocking the caller.
pub trait ActionRunner {
    fn submit(&self, path: &Path);
}

/// Runs macros directly — no shell in between — with a fixed user identity,
/// since the driver itself runs as root.
pub struct UserActionRunner {
    uid: u32,
    gid: u32,
    home: PathBuf,
}

impl UserActionRunner {
    pub fn new(uid: u32, gid: u32, home: PathBuf) -> Self {
        Self { uid, gid, home }
    }
}

impl ActionRunner for UserActionRunner {
    fn submit(&self, path: &Path) {
        use std::os::unix::process::CommandExt;

        info!("running {} as uid {}", path.display(), self.uid);
        let spawned = Command::new(path)
            .uid(self.uid)
            .gid(self.gid)
            .current_dir(&self.home)
            .spawn();
        match spawned {
            Ok(mut child) => {
                // reap off-loop
                thread::spawn(move || {
                    let _ = child.wait();
                });
            }
            Err(e) => warn!("could not run {}: {e}", path.display()),
        }
    }
}
