//! Events the UI sends to the [`OnboardingFlowController`](crate::OnboardingFlowController).

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OnboardingEvent {
    /// Advance one step; completes the flow on the last step.
    NextStep,
    PreviousStep,
    /// Open the skip confirmation prompt.
    SkipToEnd,
    /// Close the prompt and jump to the last step.
    ConfirmSkip,
    DismissSkipDialog,
    /// Toggle one coin symbol (e.g. `"BTC"`) in the selection.
    ToggleCoin(String),
    ToggleNotifications,
    /// Commit the selection, mark onboarding done, then navigate away.
    CompleteOnboarding,
    /// Invoke the navigation callback directly.
    NavigateToMain,
}
