//! The live preview: owner of the single layout surface.
//!
//! A `Preview` is a cheap, cloneable handle. The host feeds it model snapshots
//! and container sizes; the capture orchestrator borrows it to force the fixed
//! layout for the duration of a session. While a session holds the surface in
//! fixed mode, resizes are recorded but not applied, and the last one wins
//! when the interactive layout is restored.

use crate::model::{DocumentModel, Field};
use crate::platform::{ContainerSize, ResizeEvents, Subscription};
use crate::rendering::{layout_document, RenderMode, Surface};
use crate::scale::ScaleEngine;
use crate::{GeneratorConfig, PageGeometry};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tokio::sync::watch;

/// Label of the export trigger while idle
pub const EXPORT_LABEL: &str = "Baixar Declaração";
/// Label of the export trigger while a session runs
pub const EXPORT_BUSY_LABEL: &str = "Gerando PDF...";
/// Text of the blocking overlay shown while a session runs
pub const BUSY_OVERLAY_TEXT: &str = "Gerando PDF em alta qualidade...";

/// Published after every re-render; `fixed` tells which mode it was for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutEpoch {
    pub epoch: u64,
    pub fixed: bool,
}

/// State of the export button as the UI should show it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportTrigger {
    pub enabled: bool,
    pub label: &'static str,
}

struct PreviewState {
    model: DocumentModel,
    mode: RenderMode,
    scale: ScaleEngine,
    pending_resize: Option<ContainerSize>,
    surface: Arc<Surface>,
    epoch: u64,
    subscription: Option<Subscription>,
}

struct Shared {
    page: PageGeometry,
    state: Mutex<PreviewState>,
    busy: AtomicBool,
    ready: watch::Sender<LayoutEpoch>,
}

#[derive(Clone)]
pub struct Preview {
    inner: Arc<Shared>,
}

impl Preview {
    /// Mount a preview: compute the fit scale for `container` and render.
    pub fn new(config: &GeneratorConfig, model: DocumentModel, container: ContainerSize) -> Self {
        let page = config.page;
        let mut scale = ScaleEngine::new(page, config.fit_margin_px);
        let fit = scale.recompute(container);
        let mode = RenderMode::FitToContainer { scale: fit };
        let surface = Arc::new(Surface {
            epoch: 1,
            ..layout_document(&model, mode, &page)
        });
        let (ready, _) = watch::channel(LayoutEpoch {
            epoch: 1,
            fixed: false,
        });
        Preview {
            inner: Arc::new(Shared {
                page,
                state: Mutex::new(PreviewState {
                    model,
                    mode,
                    scale,
                    pending_resize: None,
                    surface,
                    epoch: 1,
                    subscription: None,
                }),
                busy: AtomicBool::new(false),
                ready,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PreviewState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Re-render under the caller's lock and publish the new epoch.
    fn rerender(&self, st: &mut PreviewState) -> u64 {
        st.epoch += 1;
        st.surface = Arc::new(Surface {
            epoch: st.epoch,
            ..layout_document(&st.model, st.mode, &self.inner.page)
        });
        self.inner.ready.send_replace(LayoutEpoch {
            epoch: st.epoch,
            fixed: st.mode.is_fixed(),
        });
        st.epoch
    }

    /// Listen to `events` for the lifetime of this preview. Returns `false`
    /// when a listener is already attached.
    pub fn attach(&self, events: &ResizeEvents) -> bool {
        let mut st = self.state();
        if st.subscription.is_some() {
            return false;
        }
        let weak: Weak<Shared> = Arc::downgrade(&self.inner);
        st.subscription = Some(events.subscribe(move |size| {
            if let Some(inner) = weak.upgrade() {
                Preview { inner }.resize(size);
            }
        }));
        true
    }

    /// Drop the resize listener, if any
    pub fn detach(&self) {
        // Take it out first so the subscription's drop runs without our lock.
        let sub = self.state().subscription.take();
        drop(sub);
    }

    pub fn is_attached(&self) -> bool {
        self.state().subscription.is_some()
    }

    /// New container size. Ignored until restore while the surface is fixed.
    pub fn resize(&self, container: ContainerSize) {
        let mut st = self.state();
        if st.mode.is_fixed() {
            debug!("resize to {:?} deferred: surface held in fixed layout", container);
            st.pending_resize = Some(container);
            return;
        }
        let fit = st.scale.recompute(container);
        let next = RenderMode::FitToContainer { scale: fit };
        if next != st.mode {
            st.mode = next;
            self.rerender(&mut st);
        }
    }

    /// Replace the whole model with the latest snapshot
    pub fn update_model(&self, model: DocumentModel) {
        let mut st = self.state();
        if st.model != model {
            st.model = model;
            self.rerender(&mut st);
        }
    }

    pub fn set_field(&self, field: Field, value: impl Into<String>) {
        let mut st = self.state();
        st.model.set(field, value);
        self.rerender(&mut st);
    }

    /// Set or clear (back to the built-in logo) the logo reference
    pub fn set_logo(&self, logo: Option<String>) {
        let mut st = self.state();
        st.model.logo = logo;
        self.rerender(&mut st);
    }

    pub fn model(&self) -> DocumentModel {
        self.state().model.clone()
    }

    pub fn mode(&self) -> RenderMode {
        self.state().mode
    }

    /// Current fit scale
    pub fn scale(&self) -> f64 {
        self.state().scale.scale()
    }

    pub fn page(&self) -> PageGeometry {
        self.inner.page
    }

    /// The surface as currently laid out
    pub fn surface(&self) -> Arc<Surface> {
        self.state().surface.clone()
    }

    /// Receiver of layout-ready signals
    pub fn layout_ready(&self) -> watch::Receiver<LayoutEpoch> {
        self.inner.ready.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        self.inner.busy.load(Ordering::SeqCst)
    }

    pub fn export_trigger(&self) -> ExportTrigger {
        if self.is_busy() {
            ExportTrigger {
                enabled: false,
                label: EXPORT_BUSY_LABEL,
            }
        } else {
            ExportTrigger {
                enabled: true,
                label: EXPORT_LABEL,
            }
        }
    }

    /// Overlay text while a session runs
    pub fn busy_overlay(&self) -> Option<&'static str> {
        self.is_busy().then_some(BUSY_OVERLAY_TEXT)
    }

    /// Claim the surface for a capture session. `false` when one is in flight.
    pub(crate) fn try_begin_session(&self) -> bool {
        self.inner
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn end_session(&self) {
        self.inner.busy.store(false, Ordering::SeqCst);
    }

    /// Switch to the fixed layout and return the epoch it was rendered at
    pub(crate) fn force_fixed(&self) -> u64 {
        let mut st = self.state();
        if st.mode.is_fixed() {
            return st.epoch;
        }
        st.mode = RenderMode::FixedPhysical;
        self.rerender(&mut st)
    }

    /// Back to the interactive layout, applying any deferred resize
    pub(crate) fn restore_interactive(&self) {
        let mut st = self.state();
        if !st.mode.is_fixed() {
            return;
        }
        let fit = match st.pending_resize.take() {
            Some(container) => st.scale.recompute(container),
            None => st.scale.scale(),
        };
        st.mode = RenderMode::FitToContainer { scale: fit };
        self.rerender(&mut st);
    }
}

impl std::fmt::Debug for Preview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let st = self.state();
        f.debug_struct("Preview")
            .field("mode", &st.mode)
            .field("epoch", &st.epoch)
            .field("busy", &self.is_busy())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn preview(w: f64, h: f64) -> Preview {
        Preview::new(
            &GeneratorConfig::default(),
            DocumentModel::default(),
            ContainerSize::new(w, h),
        )
    }

    #[test]
    fn mount_computes_fit_scale() {
        let p = preview(4000.0, 4000.0);
        assert_eq!(p.mode(), RenderMode::FitToContainer { scale: 1.0 });
        let p = preview(432.0, 4000.0);
        assert!(p.scale() < 1.0);
        assert_eq!(p.surface().width, 400);
    }

    #[test]
    fn resize_rerenders_and_publishes_epoch() {
        let p = preview(900.0, 1300.0);
        let rx = p.layout_ready();
        let before = p.surface().epoch;
        p.resize(ContainerSize::new(500.0, 700.0));
        let after = p.surface();
        assert!(after.epoch > before);
        assert_eq!(rx.borrow().epoch, after.epoch);
        assert!(!rx.borrow().fixed);
    }

    #[test]
    fn attach_is_once_and_detach_stops_updates() {
        let events = ResizeEvents::new();
        let p = preview(900.0, 1300.0);
        assert!(!p.is_attached());
        assert!(p.attach(&events));
        assert!(!p.attach(&events));
        assert!(p.is_attached());
        assert_eq!(events.listener_count(), 1);

        events.emit(ContainerSize::new(300.0, 400.0));
        assert!(p.scale() < 0.5);

        p.detach();
        assert!(!p.is_attached());
        assert_eq!(events.listener_count(), 0);
        let scale = p.scale();
        events.emit(ContainerSize::new(2000.0, 2000.0));
        assert_eq!(p.scale(), scale);
    }

    #[test]
    fn dropping_the_preview_detaches_the_listener() {
        let events = ResizeEvents::new();
        let p = preview(900.0, 1300.0);
        p.attach(&events);
        drop(p);
        assert_eq!(events.listener_count(), 0);
    }

    #[test]
    fn resize_is_deferred_while_fixed() {
        let p = preview(4000.0, 4000.0);
        p.force_fixed();
        let fixed = p.surface();
        p.resize(ContainerSize::new(300.0, 400.0));
        assert_eq!(p.mode(), RenderMode::FixedPhysical);
        assert_eq!(p.surface().epoch, fixed.epoch);
        assert_eq!(p.scale(), 1.0);

        p.restore_interactive();
        assert!(matches!(p.mode(), RenderMode::FitToContainer { scale } if scale < 0.5));
    }

    #[test]
    fn busy_drives_trigger_and_overlay() {
        let p = preview(900.0, 1300.0);
        assert_eq!(p.export_trigger(), ExportTrigger { enabled: true, label: EXPORT_LABEL });
        assert_eq!(p.busy_overlay(), None);
        assert!(p.try_begin_session());
        assert!(!p.try_begin_session());
        assert!(!p.export_trigger().enabled);
        assert_eq!(p.export_trigger().label, EXPORT_BUSY_LABEL);
        assert_eq!(p.busy_overlay(), Some(BUSY_OVERLAY_TEXT));
        p.end_session();
        assert!(!p.is_busy());
    }

    #[test]
    fn field_edits_rerender() {
        let p = preview(900.0, 1300.0);
        p.set_field(Field::StudentName, "Ana Maria");
        assert!(p.surface().text_content().contains("Ana Maria"));
        p.set_field(Field::StudentName, "");
        assert!(p.surface().text_content().contains("Nome do Aluno"));
    }
}
