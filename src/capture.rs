//! Capture orchestration: one export attempt as a small state machine.
//!
//! ```text
//! Idle -> ForcingFixedLayout -> Rasterizing -> Assembling -> Restoring -> Done -> Idle
//!                 \__________________\______________\_______-> Failed -> Idle
//! ```
//!
//! Everything runs on the caller's task. The settlement wait, the
//! rasterization and the assembly each end in a suspension point so the UI
//! stays responsive, but no step starts before the previous one resolved.

use crate::assembler::{output_filename, SavedDocument};
use crate::config::SettlePolicy;
use crate::preview::Preview;
use crate::rendering::Bitmap;
use crate::{DocumentAssembler, Error, GeneratorConfig, Rasterizer, Result};
use log::{debug, error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Message shown to the user when an export fails
pub const EXPORT_FAILED_MESSAGE: &str = "Ocorreu um erro ao gerar o PDF. Por favor, tente novamente.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    ForcingFixedLayout,
    Rasterizing,
    Assembling,
    Restoring,
    Done,
    Failed,
}

/// Result of one export request
#[derive(Debug)]
pub enum ExportOutcome {
    /// The document was written
    Saved(SavedDocument),
    /// Another session was in flight; nothing happened
    Ignored,
    /// The session failed; the preview has been restored
    Failed(Error),
}

impl ExportOutcome {
    pub fn saved(&self) -> Option<&SavedDocument> {
        match self {
            ExportOutcome::Saved(doc) => Some(doc),
            _ => None,
        }
    }
}

/// A user-facing, non-blocking notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    /// Technical detail for logs or a "details" disclosure
    pub detail: String,
}

impl Notification {
    pub fn export_failed(err: &Error) -> Self {
        Self {
            message: EXPORT_FAILED_MESSAGE.to_string(),
            detail: err.to_string(),
        }
    }
}

type OnStateHandler = Arc<dyn Fn(CaptureState) + Send + Sync>;
type OnNotifyHandler = Arc<dyn Fn(&Notification) + Send + Sync>;

/// Ends a session on drop: restores the interactive layout, clears the busy
/// flag and returns the orchestrator to `Idle`. A session abandoned
/// mid-flight (its future dropped) therefore cannot strand the preview or
/// leave observers waiting for the final transition.
struct SessionGuard<'a, R, A> {
    orchestrator: &'a CaptureOrchestrator<R, A>,
}

impl<R, A> Drop for SessionGuard<'_, R, A> {
    fn drop(&mut self) {
        let orch = self.orchestrator;
        orch.preview.restore_interactive();
        orch.preview.end_session();
        if orch.state() != CaptureState::Idle {
            orch.transition(CaptureState::Idle);
        }
    }
}

/// Drives export sessions against one preview.
pub struct CaptureOrchestrator<R, A> {
    preview: Preview,
    rasterizer: R,
    assembler: A,
    config: GeneratorConfig,
    state: Mutex<CaptureState>,
    on_state: Option<OnStateHandler>,
    on_notify: Option<OnNotifyHandler>,
}

impl<R, A> CaptureOrchestrator<R, A> {
    pub fn new(preview: Preview, rasterizer: R, assembler: A, config: GeneratorConfig) -> Self {
        Self {
            preview,
            rasterizer,
            assembler,
            config,
            state: Mutex::new(CaptureState::Idle),
            on_state: None,
            on_notify: None,
        }
    }

    /// Register a callback invoked on every state transition.
    pub fn on_state_change<F>(&mut self, cb: F)
    where
        F: Fn(CaptureState) + Send + Sync + 'static,
    {
        self.on_state = Some(Arc::new(cb));
    }

    /// Register a callback for user-visible notifications.
    pub fn on_notification<F>(&mut self, cb: F)
    where
        F: Fn(&Notification) + Send + Sync + 'static,
    {
        self.on_notify = Some(Arc::new(cb));
    }

    pub fn state(&self) -> CaptureState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn preview(&self) -> &Preview {
        &self.preview
    }

    fn transition(&self, next: CaptureState) {
        let prev = {
            let mut st = self.state.lock().unwrap_or_else(|p| p.into_inner());
            std::mem::replace(&mut *st, next)
        };
        debug!("capture: {:?} -> {:?}", prev, next);
        if let Some(cb) = &self.on_state {
            cb(next);
        }
    }

    fn notify(&self, notification: Notification) {
        if let Some(cb) = &self.on_notify {
            cb(&notification);
        }
    }
}

impl<R: Rasterizer, A: DocumentAssembler> CaptureOrchestrator<R, A> {
    /// Run one export session. A request made while another session is in
    /// flight is ignored.
    pub async fn export(&self) -> ExportOutcome {
        if !self.preview.try_begin_session() {
            debug!("export requested while a session is in flight; ignoring");
            return ExportOutcome::Ignored;
        }
        let guard = SessionGuard { orchestrator: self };

        let outcome = match self.run_session().await {
            Ok(doc) => {
                self.transition(CaptureState::Restoring);
                self.preview.restore_interactive();
                self.transition(CaptureState::Done);
                info!(
                    "saved {} ({} bytes, {:.2}x{:.2} pt)",
                    doc.path.display(),
                    doc.bytes,
                    doc.width_pt,
                    doc.height_pt
                );
                ExportOutcome::Saved(doc)
            }
            Err(err) => {
                self.transition(CaptureState::Failed);
                error!("export failed: {}", err);
                self.notify(Notification::export_failed(&err));
                self.preview.restore_interactive();
                ExportOutcome::Failed(err)
            }
        };

        drop(guard);
        outcome
    }

    async fn run_session(&self) -> Result<SavedDocument> {
        let model = self.preview.model();

        self.transition(CaptureState::ForcingFixedLayout);
        let epoch = self.preview.force_fixed();
        self.settle(epoch).await;

        self.transition(CaptureState::Rasterizing);
        let surface = self.preview.surface();
        if !surface.mode.is_fixed() || surface.epoch < epoch {
            return Err(Error::LayoutError(format!(
                "surface epoch {} ({:?}) is not the forced fixed layout {}",
                surface.epoch, surface.mode, epoch
            )));
        }
        let options = self.config.capture_options();
        let bitmap = self.rasterizer.capture(&surface, &options)?;
        check_bitmap(&bitmap, surface.width, surface.height, options.scale)?;
        tokio::task::yield_now().await;

        self.transition(CaptureState::Assembling);
        let filename = output_filename(
            &model.student_name,
            &self.config.filename_prefix,
            &self.config.filename_fallback,
        );
        // The bitmap was laid out on the preview's page, so that is the page
        // it must fill
        let page = self.preview.page();
        let saved = self.assembler.assemble(&bitmap, &page, &filename)?;
        tokio::task::yield_now().await;
        Ok(saved)
    }

    /// Wait until the fixed layout rendered at `epoch` can be captured.
    async fn settle(&self, epoch: u64) {
        let started = Instant::now();
        match self.config.settle {
            SettlePolicy::FixedDelay { delay_ms } => {
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            SettlePolicy::ReadySignal { timeout_ms } => {
                let mut rx = self.preview.layout_ready();
                let waited = tokio::time::timeout(
                    Duration::from_millis(timeout_ms),
                    rx.wait_for(|e| e.fixed && e.epoch >= epoch),
                )
                .await
                .map(|r| r.is_ok());
                match waited {
                    Ok(true) => debug!("layout ready at epoch {}", epoch),
                    Ok(false) => warn!("layout-ready channel closed; capturing without a signal"),
                    Err(_) => warn!(
                        "no layout-ready signal within {}ms; capturing anyway",
                        timeout_ms
                    ),
                }
            }
        }
        let min = Duration::from_millis(self.config.min_settle_ms);
        let elapsed = started.elapsed();
        if elapsed < min {
            tokio::time::sleep(min - elapsed).await;
        }
        tokio::task::yield_now().await;
    }
}

/// Reject bitmaps that cannot be a capture of a `width`×`height` surface.
fn check_bitmap(bitmap: &Bitmap, width: u32, height: u32, scale: f32) -> Result<()> {
    bitmap.validate()?;
    let expected = (
        (width as f32 * scale).round() as u32,
        (height as f32 * scale).round() as u32,
    );
    if (bitmap.width, bitmap.height) != expected {
        return Err(Error::RasterizationFailure(format!(
            "bitmap is {}x{}, expected {}x{}",
            bitmap.width, bitmap.height, expected.0, expected.1
        )));
    }
    if bitmap.is_blank() {
        return Err(Error::RasterizationFailure("captured bitmap is blank".into()));
    }
    Ok(())
}
