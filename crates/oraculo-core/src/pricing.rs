//! Price trajectory bookkeeping and deal detection for offers.
//!
//! Pure functions only; the store applies the result inside its offer
//! upsert transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price moves at or below this amount (one cent) are not recorded in history.
#[must_use]
pub fn price_epsilon() -> Decimal {
    Decimal::new(1, 2)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Deal,
    /// Discount large enough to suggest a pricing error on the shop's side.
    Anomaly,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AlertSeverity::Deal => write!(f, "deal"),
            AlertSeverity::Anomaly => write!(f, "anomaly"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DealPolicy {
    pub min_discount: Decimal,
    pub anomaly_discount: Decimal,
}

impl Default for DealPolicy {
    fn default() -> Self {
        Self {
            min_discount: Decimal::new(20, 2),
            anomaly_discount: Decimal::new(50, 2),
        }
    }
}

impl DealPolicy {
    #[must_use]
    pub fn classify(&self, discount: Decimal) -> Option<AlertSeverity> {
        if discount >= self.anomaly_discount {
            Some(AlertSeverity::Anomaly)
        } else if discount >= self.min_discount {
            Some(AlertSeverity::Deal)
        } else {
            None
        }
    }
}

/// Stored price state of an offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceTrajectory {
    pub price: Decimal,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
}

impl PriceTrajectory {
    /// Trajectory of an offer seen for the first time.
    #[must_use]
    pub fn first_seen(price: Decimal) -> Self {
        Self {
            price,
            min_price: Some(price),
            max_price: Some(price),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DealSignal {
    /// Fraction below the historical high, rounded to four places.
    pub discount: Decimal,
    pub severity: AlertSeverity,
}

/// Result of applying one observed price to a stored trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceObservation {
    pub trajectory: PriceTrajectory,
    pub record_history: bool,
    pub new_low: bool,
    pub deal: Option<DealSignal>,
}

/// Apply an observed price to the stored trajectory.
///
/// History is recorded when the price moves by more than [`price_epsilon`].
/// A deal is signalled only when the price sets a new all-time low and its
/// discount against the stored high reaches the policy floor.
#[must_use]
pub fn observe_price(
    current: &PriceTrajectory,
    observed: Decimal,
    policy: &DealPolicy,
) -> PriceObservation {
    let record_history = (observed - current.price).abs() > price_epsilon();
    let new_low = current.min_price.is_none_or(|min| observed < min);

    let deal = if new_low {
        current
            .max_price
            .filter(|max| *max > Decimal::ZERO)
            .and_then(|max| {
                let discount = (Decimal::ONE - observed / max).round_dp(4);
                policy
                    .classify(discount)
                    .map(|severity| DealSignal { discount, severity })
            })
    } else {
        None
    };

    let min_price = Some(current.min_price.map_or(observed, |min| min.min(observed)));
    let max_price = Some(current.max_price.map_or(observed, |max| max.max(observed)));

    PriceObservation {
        trajectory: PriceTrajectory {
            price: observed,
            min_price,
            max_price,
        },
        record_history,
        new_low,
        deal,
    }
}

/// Price-drop event handed to the alert sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DealAlert {
    pub product_id: i64,
    pub product_name: String,
    pub offer_id: i64,
    pub shop_name: String,
    pub url: String,
    pub price: Decimal,
    pub max_price: Decimal,
    pub discount: Decimal,
    pub severity: AlertSeverity,
    pub detected_at: DateTime<Utc>,
}
