//! Value objects for the swap trade domain.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::TradeError;

/// Whether a leg pays a fixed or a floating rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LegType {
    Fixed,
    Floating,
}

impl std::fmt::Display for LegType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LegType::Fixed => write!(f, "FIXED"),
            LegType::Floating => write!(f, "FLOATING"),
        }
    }
}

/// Which side of the leg the booking party is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayerReceiver {
    Pay,
    Receive,
}

impl std::fmt::Display for PayerReceiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayerReceiver::Pay => write!(f, "PAY"),
            PayerReceiver::Receive => write!(f, "RECEIVE"),
        }
    }
}

/// One leg of an interest-rate swap.
///
/// Immutable value object. An update replaces a leg wholesale; individual
/// leg terms are never patched inside an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapLeg {
    pub leg_type: LegType,
    pub payer_receiver: PayerReceiver,

    /// Fixed leg term.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_rate: Option<Decimal>,

    /// Floating leg terms.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_rate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spread: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_frequency: Option<String>,

    /// Common terms.
    pub payment_frequency: String,
    pub day_count_convention: String,
    pub business_day_convention: String,
    pub payment_calendar: String,

    /// Optional compounding.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compounding_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compounding_frequency: Option<String>,

    /// Optional averaging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub averaging_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub averaging_frequency: Option<String>,
}

impl SwapLeg {
    /// Builds a fixed leg with the given rate and common terms.
    pub fn fixed(
        payer_receiver: PayerReceiver,
        fixed_rate: Decimal,
        payment_frequency: impl Into<String>,
        day_count_convention: impl Into<String>,
    ) -> Self {
        Self {
            leg_type: LegType::Fixed,
            payer_receiver,
            fixed_rate: Some(fixed_rate),
            reference_rate: None,
            spread: None,
            reset_frequency: None,
            payment_frequency: payment_frequency.into(),
            day_count_convention: day_count_convention.into(),
            business_day_convention: "MODIFIED_FOLLOWING".to_string(),
            payment_calendar: "USNY".to_string(),
            compounding_method: None,
            compounding_frequency: None,
            averaging_method: None,
            averaging_frequency: None,
        }
    }

    /// Builds a floating leg against the given reference rate.
    pub fn floating(
        payer_receiver: PayerReceiver,
        reference_rate: impl Into<String>,
        spread: Decimal,
        payment_frequency: impl Into<String>,
        day_count_convention: impl Into<String>,
    ) -> Self {
        Self {
            leg_type: LegType::Floating,
            payer_receiver,
            fixed_rate: None,
            reference_rate: Some(reference_rate.into()),
            spread: Some(spread),
            reset_frequency: None,
            payment_frequency: payment_frequency.into(),
            day_count_convention: day_count_convention.into(),
            business_day_convention: "MODIFIED_FOLLOWING".to_string(),
            payment_calendar: "USNY".to_string(),
            compounding_method: None,
            compounding_frequency: None,
            averaging_method: None,
            averaging_frequency: None,
        }
    }

    /// Validates that the leg carries the terms its type requires.
    pub fn validate(&self) -> Result<(), TradeError> {
        match self.leg_type {
            LegType::Fixed if self.fixed_rate.is_none() => Err(TradeError::MissingFixedRate),
            LegType::Floating if self.reference_rate.is_none() => {
                Err(TradeError::MissingReferenceRate)
            }
            _ => Ok(()),
        }
    }
}
