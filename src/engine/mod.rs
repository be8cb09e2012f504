//! Diff-and-notify decision engine.
//!
//! A pure function from a freshly observed record and the stored history
//! entry (if any) to the updated entry and an optional notification. It
//! never touches storage or the network; callers persist the entry and
//! forward the notification.
//!
//! Rules, in order:
//! 1. Unknown identifier: create the entry and emit [`NotifyReason::NewItem`].
//! 2. Price equal or higher than `last_seen_price`: refresh, no notification.
//! 3. Price lower: discount is measured against `last_seen_price`.
//!    Below the threshold, or not below the last notified drop price, only
//!    refreshes. Otherwise emit [`NotifyReason::PriceDrop`] and lower
//!    `last_notified_price_for_drop`.
//!
//! Name, URL and condition always follow the latest observation.

use crate::amazon::models::ObservedRecord;
use crate::history::HistoryEntry;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Invalid input to [`diff_and_notify`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("invalid price {price} for {id}: must be > 0")]
    InvalidPrice { id: String, price: Decimal },
    #[error("minimum discount {0} is outside 0-100")]
    InvalidThreshold(Decimal),
}

/// Why a notification is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyReason {
    NewItem,
    PriceDrop,
}

impl fmt::Display for NotifyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotifyReason::NewItem => write!(f, "new item"),
            NotifyReason::PriceDrop => write!(f, "price drop"),
        }
    }
}

/// Ephemeral event handed straight to the notifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub product_id: String,
    pub reason: NotifyReason,
    pub current_price: Decimal,
    pub previous_price: Option<Decimal>,
    pub discount_percent: Option<Decimal>,
    /// Display data for the message
    pub name: String,
    pub url: String,
    pub condition: String,
    pub source_label: String,
}

impl NotificationEvent {
    fn from_observed(observed: &ObservedRecord, reason: NotifyReason) -> Self {
        Self {
            product_id: observed.id.clone(),
            reason,
            current_price: observed.price,
            previous_price: None,
            discount_percent: None,
            name: observed.name.clone(),
            url: observed.url.clone(),
            condition: observed.condition.clone(),
            source_label: observed.source_label.clone(),
        }
    }
}

/// Result of one decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub entry: HistoryEntry,
    pub notification: Option<NotificationEvent>,
}

/// Validates a minimum discount threshold.
pub fn validate_threshold(min_discount_percent: Decimal) -> Result<(), ValidationError> {
    if (Decimal::ZERO..=Decimal::ONE_HUNDRED).contains(&min_discount_percent) {
        Ok(())
    } else {
        Err(ValidationError::InvalidThreshold(min_discount_percent))
    }
}

/// Percentage drop from `previous` to `current`.
///
/// Exact for any drop that is a whole number of hundredths of a percent,
/// so a drop sitting on the threshold compares equal to it.
pub fn discount_percent(previous: Decimal, current: Decimal) -> Decimal {
    (previous - current) * Decimal::ONE_HUNDRED / previous
}

/// Decides whether `observed` warrants a notification and returns the
/// refreshed history entry.
pub fn diff_and_notify(
    observed: &ObservedRecord,
    existing: Option<&HistoryEntry>,
    min_discount_percent: Decimal,
) -> Result<Decision, ValidationError> {
    validate_threshold(min_discount_percent)?;
    if observed.price <= Decimal::ZERO {
        return Err(ValidationError::InvalidPrice {
            id: observed.id.clone(),
            price: observed.price,
        });
    }

    let Some(existing) = existing else {
        return Ok(Decision {
            entry: HistoryEntry::first_seen(observed),
            notification: Some(NotificationEvent::from_observed(observed, NotifyReason::NewItem)),
        });
    };

    let mut entry = existing.refreshed(observed);

    if observed.price >= existing.last_seen_price {
        return Ok(Decision { entry, notification: None });
    }

    let discount = discount_percent(existing.last_seen_price, observed.price);
    if discount < min_discount_percent {
        return Ok(Decision { entry, notification: None });
    }

    if existing.last_notified_price_for_drop.is_some_and(|floor| observed.price >= floor) {
        return Ok(Decision { entry, notification: None });
    }

    entry.last_notified_price_for_drop = Some(observed.price);

    let mut event = NotificationEvent::from_observed(observed, NotifyReason::PriceDrop);
    event.previous_price = Some(existing.last_seen_price);
    event.discount_percent = Some(discount);

    Ok(Decision { entry, notification: Some(event) })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn money(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn observed(price: &str) -> ObservedRecord {
        ObservedRecord::new(
            "B0TEST0001",
            "Open-box GPU",
            "https://www.amazon.com/dp/B0TEST0001",
            money(price),
            "Used - Very Good",
            "gpus",
        )
        .used()
    }

    fn entry(last_seen: &str, notified: Option<&str>) -> HistoryEntry {
        let mut entry = HistoryEntry::first_seen(&observed(last_seen));
        entry.last_notified_price_for_drop = notified.map(money);
        entry
    }

    #[test]
    fn test_new_item() {
        let decision = diff_and_notify(&observed("100"), None, money("40")).unwrap();
        let event = decision.notification.unwrap();
        assert_eq!(event.reason, NotifyReason::NewItem);
        assert_eq!(event.current_price, money("100"));
        assert!(event.previous_price.is_none());
        assert_eq!(decision.entry.last_seen_price, money("100"));
        assert!(decision.entry.last_notified_price_for_drop.is_none());
        assert!(decision.entry.first_seen_notified);
    }

    #[test]
    fn test_same_price_is_silent() {
        let existing = entry("100", None);
        let decision = diff_and_notify(&observed("100.00"), Some(&existing), Decimal::ZERO).unwrap();
        assert!(decision.notification.is_none());
    }

    #[test]
    fn test_price_rise_refreshes_baseline() {
        let existing = entry("100", Some("60"));
        let decision = diff_and_notify(&observed("130"), Some(&existing), money("40")).unwrap();
        assert!(decision.notification.is_none());
        assert_eq!(decision.entry.last_seen_price, money("130"));
        assert_eq!(decision.entry.last_notified_price_for_drop, Some(money("60")));
    }

    #[test]
    fn test_small_drop_below_threshold() {
        let existing = entry("100", None);
        let decision = diff_and_notify(&observed("90"), Some(&existing), money("40")).unwrap();
        assert!(decision.notification.is_none());
        assert_eq!(decision.entry.last_seen_price, money("90"));
    }

    #[test]
    fn test_drop_exactly_at_threshold_notifies() {
        let existing = entry("100", None);
        let decision = diff_and_notify(&observed("60"), Some(&existing), money("40")).unwrap();
        let event = decision.notification.unwrap();
        assert_eq!(event.reason, NotifyReason::PriceDrop);
        assert_eq!(event.previous_price, Some(money("100")));
        assert_eq!(decision.entry.last_notified_price_for_drop, Some(money("60")));
    }

    #[test]
    fn test_cent_prices_at_threshold_notify() {
        // 10.95 -> 6.57 and 1.00 -> 0.80 land a hair under the threshold in binary floats
        for (previous, current, threshold) in
            [("10.95", "6.57", "40"), ("1.00", "0.80", "20"), ("0.30", "0.21", "30"), ("19.99", "9.995", "50")]
        {
            let existing = entry(previous, None);
            let decision = diff_and_notify(&observed(current), Some(&existing), money(threshold)).unwrap();
            let event = decision.notification.unwrap_or_else(|| panic!("{previous} -> {current} at {threshold}%"));
            assert_eq!(event.reason, NotifyReason::PriceDrop);
            assert_eq!(event.discount_percent, Some(money(threshold)));
        }
    }

    #[test]
    fn test_drop_not_below_notified_floor() {
        // last seen rose back to 120 after a drop was notified at 50
        let existing = entry("120", Some("50"));
        let decision = diff_and_notify(&observed("55"), Some(&existing), money("40")).unwrap();
        assert!(decision.notification.is_none());
        assert_eq!(decision.entry.last_seen_price, money("55"));
        assert_eq!(decision.entry.last_notified_price_for_drop, Some(money("50")));
    }

    #[test]
    fn test_drop_below_notified_floor() {
        let existing = entry("120", Some("50"));
        let decision = diff_and_notify(&observed("45"), Some(&existing), money("40")).unwrap();
        let event = decision.notification.unwrap();
        assert_eq!(event.current_price, money("45"));
        assert_eq!(decision.entry.last_notified_price_for_drop, Some(money("45")));
    }

    #[test]
    fn test_display_fields_refreshed_without_notification() {
        let existing = entry("100", None);
        let mut next = observed("100");
        next.name = "Renamed GPU".to_string();
        next.condition = "Used - Acceptable".to_string();
        next.source_label = "gpus-2".to_string();

        let decision = diff_and_notify(&next, Some(&existing), money("40")).unwrap();
        assert!(decision.notification.is_none());
        assert_eq!(decision.entry.name, "Renamed GPU");
        assert_eq!(decision.entry.last_seen_condition, "Used - Acceptable");
        assert_eq!(decision.entry.source_last_seen, "gpus-2");
    }

    #[test]
    fn test_invalid_inputs_fail_fast() {
        assert_eq!(
            diff_and_notify(&observed("10"), None, money("140")).unwrap_err(),
            ValidationError::InvalidThreshold(money("140"))
        );
        assert!(diff_and_notify(&observed("10"), None, money("-1")).is_err());
        assert!(matches!(
            diff_and_notify(&observed("0"), None, money("40")).unwrap_err(),
            ValidationError::InvalidPrice { .. }
        ));
        assert!(diff_and_notify(&observed("-5"), None, money("40")).is_err());
    }

    #[test]
    fn test_discount_percent() {
        assert_eq!(discount_percent(money("100"), money("50")), money("50"));
        assert_eq!(discount_percent(money("10.95"), money("6.57")), money("40"));
        assert_eq!(discount_percent(money("55"), money("48")).round_dp(3), money("12.727"));
    }
}
