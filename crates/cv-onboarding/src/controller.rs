//! Onboarding flow controller.
//!
//! The controller is the only writer of the [`OnboardingState`]; observers
//! hold `watch` receivers and always see the latest snapshot.
//!
//! Timed operations (step transitions, the success animation) suspend the
//! running task without blocking other events. The `is_transitioning` flag
//! is the latch: it is checked and set in one atomic `watch` update, and any
//! transition-triggering event that arrives while it is held is dropped.
//!
//! Saves are best-effort. A failing store is logged and the flow carries on.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use cv_core::config::OnboardingConfig;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::event::OnboardingEvent;
use crate::state::OnboardingState;
use crate::step::{LAST_STEP, OnboardingStep};
use crate::store::OnboardingStore;
use crate::watchlist::{WatchlistStore, commit_selection};

type NavigationCallback = Box<dyn FnOnce() + Send>;

/// Fixed intervals used by the flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OnboardingTimings {
    pub transition: Duration,
    pub success_animation: Duration,
}

impl Default for OnboardingTimings {
    fn default() -> Self {
        Self { transition: Duration::from_millis(300), success_animation: Duration::from_millis(1_500) }
    }
}

impl OnboardingTimings {
    pub fn from_config(cfg: &OnboardingConfig) -> Self {
        Self { transition: cfg.effective_transition(), success_animation: cfg.effective_success_animation() }
    }
}

/// Drives one onboarding session. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct OnboardingFlowController {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<OnboardingState>,
    store: Arc<dyn OnboardingStore>,
    watchlist: Arc<dyn WatchlistStore>,
    timings: OnboardingTimings,
    navigate: Mutex<Option<NavigationCallback>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl OnboardingFlowController {
    /// Start with default state (`is_loading = true`). Call
    /// [`restore`](Self::restore) to load saved progress.
    pub fn new(store: Arc<dyn OnboardingStore>, watchlist: Arc<dyn WatchlistStore>, timings: OnboardingTimings) -> Self {
        let (state, _) = watch::channel(OnboardingState::default());
        Self {
            inner: Arc::new(Inner {
                state,
                store,
                watchlist,
                timings,
                navigate: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Load saved progress. On failure the defaults stay in place.
    pub async fn restore(&self) {
        let loaded = match self.inner.store.load().await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("[onboarding] load failed, starting fresh: {e}");
                None
            }
        };

        self.inner.state.send_modify(|s| {
            if let Some(saved) = loaded {
                s.current_step = OnboardingStep::from_index(saved.current_step).index();
                s.selected_coins = saved.selected_coins;
                s.notifications_enabled = saved.notifications_enabled;
            }
            s.is_loading = false;
        });
        info!("[onboarding] restored at step {}", self.inner.state.borrow().current_step);
    }

    /// Register the one-shot callback run when onboarding finishes.
    pub fn set_navigation_callback(&self, callback: impl FnOnce() + Send + 'static) {
        *self.inner.navigate.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(callback));
    }

    pub fn subscribe(&self) -> watch::Receiver<OnboardingState> {
        self.inner.state.subscribe()
    }

    pub fn snapshot(&self) -> OnboardingState {
        self.inner.state.borrow().clone()
    }

    /// Whether the store has recorded completion. Read failures count as `false`.
    pub async fn is_completed(&self) -> bool {
        self.inner.store.is_completed().await.unwrap_or_else(|e| {
            warn!("[onboarding] completion flag unreadable: {e}");
            false
        })
    }

    /// Fire-and-forget: run `event` on a background task.
    pub fn dispatch(&self, event: OnboardingEvent) {
        let this = self.clone();
        let task = tokio::spawn(async move { this.handle(event).await });
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner);
        tasks.retain(|t| !t.is_finished());
        tasks.push(task);
    }

    /// Wait until every dispatched event has finished.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(PoisonError::into_inner));
            if pending.is_empty() {
                return;
            }
            for task in pending {
                if let Err(e) = task.await {
                    warn!("[onboarding] event task failed: {e}");
                }
            }
        }
    }

    /// Run one event to completion, including any timed transition.
    pub async fn handle(&self, event: OnboardingEvent) {
        debug!("[onboarding] {event:?}");
        match event {
            OnboardingEvent::NextStep => self.next_step().await,
            OnboardingEvent::PreviousStep => self.previous_step().await,
            OnboardingEvent::SkipToEnd => {
                self.inner.state.send_if_modified(|s| !std::mem::replace(&mut s.show_skip_dialog, true));
            }
            OnboardingEvent::ConfirmSkip => self.confirm_skip().await,
            OnboardingEvent::DismissSkipDialog => {
                self.inner.state.send_if_modified(|s| std::mem::replace(&mut s.show_skip_dialog, false));
            }
            OnboardingEvent::ToggleCoin(symbol) => {
                self.inner.state.send_modify(|s| {
                    if !s.selected_coins.remove(&symbol) {
                        s.selected_coins.insert(symbol);
                    }
                });
                self.persist().await;
            }
            OnboardingEvent::ToggleNotifications => {
                self.inner.state.send_modify(|s| s.notifications_enabled = !s.notifications_enabled);
                self.persist().await;
            }
            OnboardingEvent::CompleteOnboarding => self.complete().await,
            OnboardingEvent::NavigateToMain => self.navigate(),
        }
    }

    async fn next_step(&self) {
        let mut at_last_step = false;
        let started = self.inner.state.send_if_modified(|s| {
            if s.is_transitioning {
                return false;
            }
            if s.is_last_step() {
                at_last_step = true;
                return false;
            }
            if !s.can_proceed() {
                return false;
            }
            s.is_transitioning = true;
            true
        });

        if at_last_step {
            return self.complete().await;
        }
        if started {
            self.finish_transition(|step| (step + 1).min(LAST_STEP)).await;
        }
    }

    async fn previous_step(&self) {
        let started = self.inner.state.send_if_modified(|s| {
            if s.is_transitioning || s.current_step == 0 {
                return false;
            }
            s.is_transitioning = true;
            true
        });
        if started {
            self.finish_transition(|step| step.saturating_sub(1)).await;
        }
    }

    async fn confirm_skip(&self) {
        let mut started = false;
        self.inner.state.send_if_modified(|s| {
            let was_open = std::mem::replace(&mut s.show_skip_dialog, false);
            if s.is_transitioning {
                return was_open;
            }
            s.is_transitioning = true;
            started = true;
            true
        });
        if started {
            self.finish_transition(|_| LAST_STEP).await;
        }
    }

    /// Second half of a timed transition; the latch is already held.
    async fn finish_transition(&self, next: impl FnOnce(usize) -> usize) {
        tokio::time::sleep(self.inner.timings.transition).await;
        self.inner.state.send_modify(|s| {
            s.current_step = next(s.current_step);
            s.is_transitioning = false;
        });
        debug!("[onboarding] now at step {}", self.inner.state.borrow().current_step);
        self.persist().await;
    }

    async fn complete(&self) {
        let started = self.inner.state.send_if_modified(|s| !std::mem::replace(&mut s.show_success_animation, true));
        if !started {
            debug!("[onboarding] completion already running");
            return;
        }

        let selection = self.inner.state.borrow().selected_coins.clone();
        let summary = commit_selection(self.inner.watchlist.as_ref(), &selection).await;
        if !summary.failed.is_empty() {
            warn!("[onboarding] not added to watchlist: {}", summary.failed.join(", "));
        }
        match self.inner.store.set_completed(true).await {
            Ok(()) => info!("[onboarding] completed, {} coins on the watchlist", summary.added.len()),
            Err(e) => warn!("[onboarding] could not record completion: {e}"),
        }

        tokio::time::sleep(self.inner.timings.success_animation).await;
        self.navigate();
    }

    fn navigate(&self) {
        let callback = self.inner.navigate.lock().unwrap_or_else(PoisonError::into_inner).take();
        match callback {
            Some(callback) => {
                info!("[onboarding] navigating to main");
                callback();
            }
            None => debug!("[onboarding] no navigation callback pending"),
        }
    }

    async fn persist(&self) {
        let snapshot = self.snapshot();
        if let Err(e) = self.inner.store.save(&snapshot).await {
            warn!("[onboarding] save failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use cv_core::CvError;
    use cv_core::error::CvResult;

    use super::*;
    use crate::store::MemoryOnboardingStore;
    use crate::watchlist::MemoryWatchlist;

    /// Memory store that counts saves and can be switched to fail.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryOnboardingStore,
        saves: AtomicUsize,
        fail: AtomicBool,
    }

    impl CountingStore {
        fn failing() -> Self {
            let s = Self::default();
            s.fail.store(true, Ordering::SeqCst);
            s
        }

        fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }

        fn check(&self) -> CvResult<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CvError::Persistence("disk unavailable".into()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl OnboardingStore for CountingStore {
        async fn load(&self) -> CvResult<OnboardingState> {
            self.check()?;
            self.inner.load().await
        }

        async fn save(&self, state: &OnboardingState) -> CvResult<()> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.save(state).await
        }

        async fn set_completed(&self, completed: bool) -> CvResult<()> {
            self.check()?;
            self.inner.set_completed(completed).await
        }

        async fn is_completed(&self) -> CvResult<bool> {
            self.check()?;
            self.inner.is_completed().await
        }
    }

    /// Watchlist rejecting one coin id.
    struct RejectingWatchlist {
        inner: MemoryWatchlist,
        reject: &'static str,
    }

    #[async_trait]
    impl WatchlistStore for RejectingWatchlist {
        async fn add_to_watchlist(&self, coin_id: &str) -> CvResult<()> {
            if coin_id == self.reject {
                return Err(CvError::Watchlist("rejected".into()));
            }
            self.inner.add_to_watchlist(coin_id).await
        }
    }

    struct Harness {
        ctl: OnboardingFlowController,
        store: Arc<CountingStore>,
        watchlist: Arc<MemoryWatchlist>,
        navigations: Arc<AtomicUsize>,
    }

    async fn harness_with(store: CountingStore) -> Harness {
        let store = Arc::new(store);
        let watchlist = Arc::new(MemoryWatchlist::new());
        let ctl = OnboardingFlowController::new(store.clone(), watchlist.clone(), OnboardingTimings::default());
        ctl.restore().await;
        let navigations = Arc::new(AtomicUsize::new(0));
        let counter = navigations.clone();
        ctl.set_navigation_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        Harness { ctl, store, watchlist, navigations }
    }

    async fn harness() -> Harness {
        harness_with(CountingStore::default()).await
    }

    fn coins(s: &[&str]) -> BTreeSet<String> {
        s.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn next_step_advances_after_transition() {
        let h = harness().await;
        let started = tokio::time::Instant::now();
        h.ctl.handle(OnboardingEvent::NextStep).await;

        let s = h.ctl.snapshot();
        assert_eq!(s.current_step, 1);
        assert!(!s.is_transitioning);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert_eq!(h.store.saves(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn next_step_blocked_on_empty_coin_selection() {
        let h = harness().await;
        h.ctl.handle(OnboardingEvent::NextStep).await;
        h.ctl.handle(OnboardingEvent::NextStep).await;
        let before = h.ctl.snapshot();
        let saves = h.store.saves();
        assert_eq!(before.current_step, 2);

        h.ctl.handle(OnboardingEvent::NextStep).await;
        assert_eq!(h.ctl.snapshot(), before);
        assert_eq!(h.store.saves(), saves);
    }

    #[tokio::test(start_paused = true)]
    async fn previous_step_at_start_is_noop() {
        let h = harness().await;
        let before = h.ctl.snapshot();
        h.ctl.handle(OnboardingEvent::PreviousStep).await;
        assert_eq!(h.ctl.snapshot(), before);
        assert_eq!(h.store.saves(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn previous_step_goes_back() {
        let h = harness().await;
        h.ctl.handle(OnboardingEvent::NextStep).await;
        h.ctl.handle(OnboardingEvent::PreviousStep).await;
        assert_eq!(h.ctl.snapshot().current_step, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_coin_twice_restores_selection() {
        let h = harness().await;
        h.ctl.handle(OnboardingEvent::ToggleCoin("SOL".into())).await;
        let original = h.ctl.snapshot().selected_coins;

        h.ctl.handle(OnboardingEvent::ToggleCoin("BTC".into())).await;
        h.ctl.handle(OnboardingEvent::ToggleCoin("BTC".into())).await;
        assert_eq!(h.ctl.snapshot().selected_coins, original);
        // Each toggle saves immediately.
        assert_eq!(h.store.saves(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_then_advance_to_coin_step() {
        let h = harness().await;
        for event in [
            OnboardingEvent::ToggleCoin("BTC".into()),
            OnboardingEvent::ToggleCoin("ETH".into()),
            OnboardingEvent::NextStep,
            OnboardingEvent::NextStep,
        ] {
            h.ctl.handle(event).await;
        }
        let s = h.ctl.snapshot();
        assert_eq!(s.current_step, 2);
        assert_eq!(s.selected_coins, coins(&["BTC", "ETH"]));
        assert!(s.can_proceed());
    }

    #[tokio::test(start_paused = true)]
    async fn confirm_skip_jumps_to_last_step() {
        let h = harness().await;
        h.ctl.handle(OnboardingEvent::SkipToEnd).await;
        let prompt = h.ctl.snapshot();
        assert!(prompt.show_skip_dialog);
        assert_eq!(prompt.current_step, 0);

        h.ctl.handle(OnboardingEvent::ConfirmSkip).await;
        let s = h.ctl.snapshot();
        assert_eq!(s.current_step, 3);
        assert!(!s.show_skip_dialog);
        assert!(!s.is_transitioning);
        assert!(s.is_last_step());
    }

    #[tokio::test(start_paused = true)]
    async fn dismiss_skip_dialog_keeps_step() {
        let h = harness().await;
        h.ctl.handle(OnboardingEvent::NextStep).await;
        h.ctl.handle(OnboardingEvent::SkipToEnd).await;
        h.ctl.handle(OnboardingEvent::DismissSkipDialog).await;
        let s = h.ctl.snapshot();
        assert!(!s.show_skip_dialog);
        assert_eq!(s.current_step, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn events_during_transition_are_rejected() {
        let h = harness().await;
        h.ctl.dispatch(OnboardingEvent::NextStep);
        tokio::task::yield_now().await;
        assert!(h.ctl.snapshot().is_transitioning);

        h.ctl.handle(OnboardingEvent::NextStep).await;
        h.ctl.handle(OnboardingEvent::PreviousStep).await;
        h.ctl.settle().await;

        let s = h.ctl.snapshot();
        assert_eq!(s.current_step, 1);
        assert!(!s.is_transitioning);
    }

    #[tokio::test(start_paused = true)]
    async fn toggles_are_not_gated_by_transition() {
        let h = harness().await;
        h.ctl.dispatch(OnboardingEvent::NextStep);
        tokio::task::yield_now().await;
        h.ctl.handle(OnboardingEvent::ToggleNotifications).await;
        assert!(h.ctl.snapshot().notifications_enabled);
        h.ctl.settle().await;
        assert!(h.ctl.snapshot().notifications_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn next_step_on_last_step_completes() {
        let h = harness().await;
        h.ctl.handle(OnboardingEvent::ToggleCoin("ADA".into())).await;
        h.ctl.handle(OnboardingEvent::ConfirmSkip).await;
        h.ctl.handle(OnboardingEvent::NextStep).await;

        assert!(h.ctl.snapshot().show_success_animation);
        assert!(h.ctl.is_completed().await);
        assert_eq!(h.watchlist.ids(), coins(&["cardano"]));
        assert_eq!(h.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_survives_watchlist_failure() {
        let store = Arc::new(CountingStore::default());
        let watchlist = Arc::new(RejectingWatchlist { inner: MemoryWatchlist::new(), reject: "bitcoin" });
        let ctl = OnboardingFlowController::new(store.clone(), watchlist.clone(), OnboardingTimings::default());
        ctl.restore().await;
        let navigations = Arc::new(AtomicUsize::new(0));
        let counter = navigations.clone();
        ctl.set_navigation_callback(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        ctl.handle(OnboardingEvent::ToggleCoin("BTC".into())).await;
        ctl.handle(OnboardingEvent::ToggleCoin("ETH".into())).await;
        ctl.handle(OnboardingEvent::CompleteOnboarding).await;

        assert!(store.is_completed().await.unwrap());
        assert_eq!(watchlist.inner.ids(), coins(&["ethereum"]));
        assert_eq!(navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_waits_for_success_animation() {
        let h = harness().await;
        h.ctl.dispatch(OnboardingEvent::CompleteOnboarding);
        tokio::time::sleep(Duration::from_millis(1_000)).await;
        assert!(h.ctl.is_completed().await);
        assert_eq!(h.navigations.load(Ordering::SeqCst), 0);

        h.ctl.settle().await;
        assert_eq!(h.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_completion_navigates_once() {
        let h = harness().await;
        h.ctl.dispatch(OnboardingEvent::CompleteOnboarding);
        h.ctl.dispatch(OnboardingEvent::CompleteOnboarding);
        h.ctl.settle().await;
        h.ctl.handle(OnboardingEvent::NavigateToMain).await;
        assert_eq!(h.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn navigate_to_main_invokes_callback() {
        let h = harness().await;
        h.ctl.handle(OnboardingEvent::NavigateToMain).await;
        assert_eq!(h.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn save_failures_do_not_block_progress() {
        let h = harness_with(CountingStore::failing()).await;
        let s = h.ctl.snapshot();
        assert_eq!(s.current_step, 0);
        assert!(!s.is_loading);

        h.ctl.handle(OnboardingEvent::NextStep).await;
        h.ctl.handle(OnboardingEvent::ToggleCoin("BTC".into())).await;
        assert_eq!(h.ctl.snapshot().current_step, 1);
        assert_eq!(h.store.saves(), 2);

        h.ctl.handle(OnboardingEvent::CompleteOnboarding).await;
        assert!(!h.ctl.is_completed().await);
        assert_eq!(h.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_resumes_saved_progress() {
        let store = CountingStore::default();
        let mut saved = OnboardingState { current_step: 2, notifications_enabled: true, ..Default::default() };
        saved.selected_coins.insert("XRP".into());
        store.inner.save(&saved).await.unwrap();

        let ctl = OnboardingFlowController::new(Arc::new(store), Arc::new(MemoryWatchlist::new()), OnboardingTimings::default());
        assert!(ctl.snapshot().is_loading);
        ctl.restore().await;

        let s = ctl.snapshot();
        assert!(!s.is_loading);
        assert_eq!(s.current_step, 2);
        assert_eq!(s.selected_coins, coins(&["XRP"]));
        assert!(s.notifications_enabled);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_clamps_invalid_step() {
        let store = CountingStore::default();
        store.inner.save(&OnboardingState { current_step: 9, ..Default::default() }).await.unwrap();
        let ctl = OnboardingFlowController::new(Arc::new(store), Arc::new(MemoryWatchlist::new()), OnboardingTimings::default());
        ctl.restore().await;
        assert_eq!(ctl.snapshot().current_step, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn observers_see_transition_latch() {
        let h = harness().await;
        let mut rx = h.ctl.subscribe();
        h.ctl.dispatch(OnboardingEvent::NextStep);

        rx.wait_for(|s| s.is_transitioning).await.unwrap();
        rx.wait_for(|s| !s.is_transitioning && s.current_step == 1).await.unwrap();
        h.ctl.settle().await;
    }

    #[test]
    fn timings_from_config() {
        let cfg = OnboardingConfig { transition_ms: Some(10), ..Default::default() };
        let t = OnboardingTimings::from_config(&cfg);
        assert_eq!(t.transition, Duration::from_millis(10));
        assert_eq!(t.success_animation, Duration::from_millis(1_500));
    }
}
