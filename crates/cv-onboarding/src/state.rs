//! Onboarding session state and its derived view fields.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::step::{LAST_STEP, OnboardingStep, TOTAL_STEPS};

/// State of one onboarding session.
///
/// Only `current_step`, `selected_coins` and `notifications_enabled` are
/// persisted; the flags describe in-flight UI and reset on load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingState {
    /// Step index in `0..=3`.
    pub current_step: usize,
    /// Selected coin symbols (e.g. `"BTC"`).
    pub selected_coins: BTreeSet<String>,
    pub notifications_enabled: bool,

    /// Latch held while a timed step transition is running.
    #[serde(skip)]
    pub is_transitioning: bool,
    #[serde(skip)]
    pub show_skip_dialog: bool,
    #[serde(skip)]
    pub show_success_animation: bool,
    /// True until the saved state has been restored.
    #[serde(skip, default = "loading")]
    pub is_loading: bool,
}

fn loading() -> bool {
    true
}

impl Default for OnboardingState {
    fn default() -> Self {
        Self {
            current_step: 0,
            selected_coins: BTreeSet::new(),
            notifications_enabled: false,
            is_transitioning: false,
            show_skip_dialog: false,
            show_success_animation: false,
            is_loading: true,
        }
    }
}

impl OnboardingState {
    pub fn step(&self) -> OnboardingStep {
        OnboardingStep::from_index(self.current_step)
    }

    /// 25, 50, 75 or 100.
    pub fn progress_percentage(&self) -> u32 {
        (self.current_step as u32 + 1) * 25
    }

    pub fn step_text(&self) -> String {
        format!("Step {} of {TOTAL_STEPS}", self.current_step + 1)
    }

    pub fn filled_segments(&self) -> usize {
        self.current_step + 1
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step == LAST_STEP
    }

    pub fn button_text(&self) -> &'static str {
        if self.is_last_step() { "Get Started" } else { "Continue" }
    }

    pub fn show_back_button(&self) -> bool {
        self.current_step > 0
    }

    pub fn show_skip_button(&self) -> bool {
        self.current_step < LAST_STEP
    }

    pub fn selected_coins_count(&self) -> usize {
        self.selected_coins.len()
    }

    pub fn selection_badge_text(&self) -> String {
        let n = self.selected_coins_count();
        format!("✓ {n} {} selected", if n == 1 { "coin" } else { "coins" })
    }

    /// The coin selection step needs at least one coin.
    pub fn can_proceed(&self) -> bool {
        !(self.step() == OnboardingStep::CoinSelection && self.selected_coins.is_empty())
    }

    /// Copy of the persisted fields, with every transient flag cleared.
    pub fn persisted(&self) -> Self {
        Self {
            current_step: self.current_step,
            selected_coins: self.selected_coins.clone(),
            notifications_enabled: self.notifications_enabled,
            is_loading: false,
            ..Self::default()
        }
    }
}
