//! Shared risk state for one gating service instance.
//!
//! The cached multiplier is written by the background refresher and read by
//! the order validation path. Both go through a single lock so a reader
//! never sees a half-written value. The daily loss is an atomic counter in
//! micro-units so PnL events from any task never tear.

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use gate_core::RiskLimits;
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::error::{RiskError, RiskResult};

/// Multiplier used until the first successful refresh.
pub const DEFAULT_MULTIPLIER: f64 = 1.0;

/// Cached multiplier plus the time it was installed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MultiplierSnapshot {
    pub value: f64,
    /// `None` until the first successful refresh.
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

impl MultiplierSnapshot {
    fn initial() -> Self {
        Self {
            value: DEFAULT_MULTIPLIER,
            last_refreshed_at: None,
        }
    }

    /// Age of the cached value, `None` if it was never refreshed.
    pub fn age(&self, now: DateTime<Utc>) -> Option<chrono::Duration> {
        self.last_refreshed_at.map(|t| now - t)
    }
}

/// Parse a stored multiplier string.
///
/// Accepts a decimal float with optional surrounding whitespace. Rejects
/// values that parse but are not usable as a size scale (NaN, infinite,
/// negative).
pub fn parse_multiplier(raw: &str) -> RiskResult<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e: std::num::ParseFloatError| RiskError::InvalidMultiplier {
            raw: raw.to_string(),
            reason: e.to_string(),
        })?;

    if !value.is_finite() {
        return Err(RiskError::InvalidMultiplier {
            raw: raw.to_string(),
            reason: "not finite".to_string(),
        });
    }
    if value < 0.0 {
        return Err(RiskError::InvalidMultiplier {
            raw: raw.to_string(),
            reason: "negative".to_string(),
        });
    }
    Ok(value)
}

/// Risk state: static limits, running daily loss, cached multiplier.
///
/// Thread-safe: share via `Arc<RiskState>`.
pub struct RiskState {
    limits: RiskLimits,
    multiplier: RwLock<MultiplierSnapshot>,
    /// Net realized loss in micro-units (positive = loss, negative = profit).
    daily_loss_micros: AtomicI64,
}

impl RiskState {
    /// Scale factor for micro-units (1.0 = 1,000,000 micros).
    const MICRO_SCALE: f64 = 1_000_000.0;

    /// Fresh state: zero daily loss, default multiplier.
    #[must_use]
    pub fn new(limits: RiskLimits) -> Self {
        Self {
            limits,
            multiplier: RwLock::new(MultiplierSnapshot::initial()),
            daily_loss_micros: AtomicI64::new(0),
        }
    }

    pub fn limits(&self) -> &RiskLimits {
        &self.limits
    }

    // === Cached multiplier ===

    /// Current cached multiplier.
    #[must_use]
    pub fn get(&self) -> f64 {
        self.multiplier.read().value
    }

    /// Overwrite the cached multiplier.
    pub fn set(&self, value: f64) {
        let previous = {
            let mut guard = self.multiplier.write();
            let previous = guard.value;
            *guard = MultiplierSnapshot {
                value,
                last_refreshed_at: Some(Utc::now()),
            };
            previous
        };
        if previous != value {
            debug!(previous, current = value, "Risk multiplier changed");
        }
    }

    /// Value and refresh time, read under one lock.
    #[must_use]
    pub fn snapshot(&self) -> MultiplierSnapshot {
        *self.multiplier.read()
    }

    // === Daily loss ===

    /// Record a realized PnL (negative = loss).
    pub fn record_pnl(&self, pnl: f64) {
        if !pnl.is_finite() {
            warn!(pnl, "Ignoring non-finite PnL");
            return;
        }
        // `as` saturates out-of-range floats; the counter saturates too, so a
        // huge loss can never wrap around into a profit.
        let pnl_micros = (pnl * Self::MICRO_SCALE) as i64;
        let prev = match self.daily_loss_micros.fetch_update(
            Ordering::SeqCst,
            Ordering::SeqCst,
            |loss| Some(loss.saturating_sub(pnl_micros)),
        ) {
            Ok(prev) | Err(prev) => prev,
        };
        let new_loss = prev.saturating_sub(pnl_micros) as f64 / Self::MICRO_SCALE;

        debug!(pnl, daily_loss = new_loss, "Daily loss updated");

        if new_loss >= self.limits.max_daily_loss()
            && (prev as f64 / Self::MICRO_SCALE) < self.limits.max_daily_loss()
        {
            warn!(
                daily_loss = new_loss,
                max_daily_loss = self.limits.max_daily_loss(),
                "Daily loss limit reached, all further orders will be rejected"
            );
        }
    }

    /// Net realized loss for the current session.
    #[must_use]
    pub fn current_daily_loss(&self) -> f64 {
        self.daily_loss_micros.load(Ordering::SeqCst) as f64 / Self::MICRO_SCALE
    }

    /// Whether the daily loss gate is closed.
    #[must_use]
    pub fn is_daily_loss_breached(&self) -> bool {
        self.current_daily_loss() >= self.limits.max_daily_loss()
    }

    /// Start a new session with zero loss.
    pub fn reset_daily_loss(&self) {
        let prev = self.daily_loss_micros.swap(0, Ordering::SeqCst);
        info!(
            previous_loss = prev as f64 / Self::MICRO_SCALE,
            "Daily loss reset"
        );
    }
}

impl std::fmt::Debug for RiskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskState")
            .field("limits", &self.limits)
            .field("multiplier", &self.snapshot())
            .field("daily_loss", &self.current_daily_loss())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn state() -> RiskState {
        RiskState::new(RiskLimits::default())
    }

    #[test]
    fn test_initial_state() {
        let state = state();
        assert_eq!(state.get(), DEFAULT_MULTIPLIER);
        assert_eq!(state.current_daily_loss(), 0.0);
        assert!(!state.is_daily_loss_breached());
        assert!(state.snapshot().last_refreshed_at.is_none());
        assert!(state.snapshot().age(Utc::now()).is_none());
    }

    #[test]
    fn test_set_then_get() {
        let state = state();
        state.set(1.5);
        assert_eq!(state.get(), 1.5);

        let snap = state.snapshot();
        assert_eq!(snap.value, 1.5);
        assert!(snap.last_refreshed_at.is_some());
    }

    #[test]
    fn test_concurrent_get_set_never_torn() {
        let state = Arc::new(state());
        let values = [0.5_f64, 1.2, 1.5, 0.7];

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let state = state.clone();
                std::thread::spawn(move || {
                    for n in 0..1000 {
                        if i % 2 == 0 {
                            state.set(values[(i + n) % values.len()]);
                        } else {
                            let seen = state.get();
                            assert!(
                                seen == DEFAULT_MULTIPLIER || values.contains(&seen),
                                "observed torn value {seen}"
                            );
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert!(values.contains(&state.get()));
    }

    #[test]
    fn test_record_pnl_tracks_loss() {
        let state = state();
        state.record_pnl(-80.0);
        assert!((state.current_daily_loss() - 80.0).abs() < 1e-6);

        // Profit reduces net loss
        state.record_pnl(50.0);
        assert!((state.current_daily_loss() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_daily_loss_breach_at_limit() {
        let state = state();
        state.record_pnl(-4999.0);
        assert!(!state.is_daily_loss_breached());

        // Exactly at the limit closes the gate
        state.record_pnl(-1.0);
        assert!(state.is_daily_loss_breached());

        state.reset_daily_loss();
        assert!(!state.is_daily_loss_breached());
        assert_eq!(state.current_daily_loss(), 0.0);
    }

    #[test]
    fn test_huge_losses_saturate_instead_of_wrapping() {
        let state = state();
        state.record_pnl(-5.0e12);
        state.record_pnl(-5.0e12);

        assert!(state.current_daily_loss() > 0.0);
        assert!(state.is_daily_loss_breached());
        assert_eq!(state.current_daily_loss(), i64::MAX as f64 / 1_000_000.0);

        // Beyond the i64 range in a single event
        state.reset_daily_loss();
        state.record_pnl(-1.0e20);
        assert!(state.is_daily_loss_breached());
    }

    #[test]
    fn test_huge_profit_saturates_at_floor() {
        let state = state();
        state.record_pnl(1.0e20);
        state.record_pnl(1.0e20);
        assert_eq!(state.current_daily_loss(), i64::MIN as f64 / 1_000_000.0);

        // Losses still count from the floor
        state.record_pnl(-1.0);
        assert!(state.current_daily_loss() > i64::MIN as f64 / 1_000_000.0);
        assert!(!state.is_daily_loss_breached());
    }

    #[test]
    fn test_non_finite_pnl_ignored() {
        let state = state();
        state.record_pnl(f64::NAN);
        state.record_pnl(f64::NEG_INFINITY);
        assert_eq!(state.current_daily_loss(), 0.0);
    }

    #[test]
    fn test_parse_multiplier() {
        assert_eq!(parse_multiplier("1.5").unwrap(), 1.5);
        assert_eq!(parse_multiplier(" 0.7\n").unwrap(), 0.7);
        assert_eq!(parse_multiplier("2").unwrap(), 2.0);
        assert_eq!(parse_multiplier("0").unwrap(), 0.0);
    }

    #[test]
    fn test_parse_multiplier_rejects_garbage() {
        assert!(parse_multiplier("").is_err());
        assert!(parse_multiplier("abc").is_err());
        assert!(parse_multiplier("NaN").is_err());
        assert!(parse_multiplier("inf").is_err());
        assert!(parse_multiplier("-0.5").is_err());
    }
}
