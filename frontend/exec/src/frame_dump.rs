use std::fs;
use std::path::{Path, PathBuf};
use std::thread::{Builder, JoinHandle};
use anyhow::Context;
use crossbeam::channel::{bounded, Sender, TrySendError};
use image::RgbImage;
use tracing::{debug, warn};

/// Writes annotated frames to disk off the control loop.
///
/// Only one frame waits at a time; frames offered while the writer is busy
/// are dropped.
pub struct FrameDumper {
    tx: Option<Sender<(u64, RgbImage)>>,
    handle: Option<JoinHandle<()>>,
    dropped: u64,
}

impl FrameDumper {
    pub fn spawn(dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Could not create {}", dir.display()))?;

        let dir = dir.to_owned();
        let (tx, rx) = bounded::<(u64, RgbImage)>(1);

        let handle = Builder::new()
            .name("Frame Writer".to_owned())
            .spawn(move || {
                for (step, frame) in rx.iter() {
                    let path = frame_path(&dir, step);
                    if let Err(err) = frame.save(&path) {
                        warn!("Could not write {}: {}", path.display(), err);
                    }
                }
            })
            .context("Could not start frame writer")?;

        Ok(Self { tx: Some(tx), handle: Some(handle), dropped: 0 })
    }

    pub fn offer(&mut self, step: u64, frame: RgbImage) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send((step, frame)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => self.dropped += 1,
            Err(TrySendError::Disconnected(_)) => {
                warn!("Frame writer stopped, no more frames will be written");
                self.tx = None;
            }
        }
    }
}

impl Drop for FrameDumper {
    fn drop(&mut self) {
        self.tx = None;

        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Frame writer panicked, some frames may be missing");
            }
        }

        if self.dropped > 0 {
            debug!("Dropped {} frames while the writer was busy", self.dropped);
        }
    }
}

pub fn frame_path(dir: &Path, step: u64) -> PathBuf {
    dir.join(format!("frame_{:06}.png", step))
}
