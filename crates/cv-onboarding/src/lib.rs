//! # cv-onboarding
//!
//! The four-step onboarding flow: welcome, feature tour, coin selection,
//! and notification preferences.
//!
//! [`controller::OnboardingFlowController`] is the single writer of the
//! [`state::OnboardingState`]. UI code sends [`event::OnboardingEvent`]s and
//! observes state snapshots through a `watch` channel. Progress is saved
//! through an [`store::OnboardingStore`]; the final coin selection is
//! committed to a [`watchlist::WatchlistStore`].
//!
//! Persistence and watchlist failures are logged and never block progress.

pub mod coins;
pub mod controller;
pub mod event;
pub mod state;
pub mod step;
pub mod store;
pub mod watchlist;

pub use controller::{OnboardingFlowController, OnboardingTimings};
pub use event::OnboardingEvent;
pub use state::OnboardingState;
pub use step::OnboardingStep;
pub use store::{JsonFileOnboardingStore, MemoryOnboardingStore, OnboardingStore};
pub use watchlist::{MemoryWatchlist, WatchlistStore};
