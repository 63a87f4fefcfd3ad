use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::Builder;
use anyhow::Context;
use tracing::{info, warn};

/// Flag that flips once Ctrl-C is pressed.
pub fn on_ctrl_c() -> anyhow::Result<Arc<AtomicBool>> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = stop.clone();

    Builder::new()
        .name("Ctrl-C Watcher".to_owned())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    warn!("Ctrl-C will not stop the car cleanly: {}", err);
                    return;
                }
            };

            if runtime.block_on(tokio::signal::ctrl_c()).is_ok() {
                info!("Ctrl-C received, stopping after this step");
                flag.store(true, Ordering::Release);
            }
        })
        .context("Could not start Ctrl-C watcher")?;

    Ok(stop)
}
