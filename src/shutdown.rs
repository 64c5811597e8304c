use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use anyhow::{Context, Result};
use tracing::{info, warn};

/// Set once Ctrl-C is received; sync loops poll it between items.
#[derive(Debug, Clone, Default)]
pub struct InterruptFlag(Arc<AtomicBool>);

impl InterruptFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Spawns a watcher thread that flips the flag on the first Ctrl-C.
    pub fn install_ctrl_c(&self) -> Result<()> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("build signal runtime")?;
        let flag = self.clone();
        thread::Builder::new()
            .name("ctrl-c".to_string())
            .spawn(move || {
                runtime.block_on(async {
                    match tokio::signal::ctrl_c().await {
                        Ok(()) => {
                            info!("interrupt received; finishing current item");
                            flag.set();
                        }
                        Err(err) => warn!(error = %err, "ctrl-c listener failed"),
                    }
                });
            })
            .context("spawn ctrl-c watcher")?;
        Ok(())
    }
}
