//! The linear sequence of onboarding steps.

use std::fmt;

/// Number of steps in the flow.
pub const TOTAL_STEPS: usize = 4;

/// Index of the final step.
pub const LAST_STEP: usize = TOTAL_STEPS - 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnboardingStep {
    Welcome,
    Features,
    CoinSelection,
    Notifications,
}

impl OnboardingStep {
    const ALL: [OnboardingStep; TOTAL_STEPS] =
        [OnboardingStep::Welcome, OnboardingStep::Features, OnboardingStep::CoinSelection, OnboardingStep::Notifications];

    pub fn index(self) -> usize {
        match self {
            OnboardingStep::Welcome => 0,
            OnboardingStep::Features => 1,
            OnboardingStep::CoinSelection => 2,
            OnboardingStep::Notifications => 3,
        }
    }

    /// Out-of-range indices map to `Welcome`.
    pub fn from_index(index: usize) -> Self {
        Self::ALL.get(index).copied().unwrap_or(OnboardingStep::Welcome)
    }

    /// All steps in order.
    pub fn all() -> &'static [OnboardingStep] {
        &Self::ALL
    }

    pub fn title(self) -> &'static str {
        match self {
            OnboardingStep::Welcome => "Welcome",
            OnboardingStep::Features => "Features",
            OnboardingStep::CoinSelection => "Pick your coins",
            OnboardingStep::Notifications => "Stay notified",
        }
    }
}

impl fmt::Display for OnboardingStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}
