//! Diagnosis key field rules.
//!
//! Rules form an ordered table of pure predicates. The first failing rule
//! decides the rejection reason; `violations` reports every failing rule for
//! diagnostics. Key data is always checked first so an empty key yields a
//! single well-defined reason. Only the supplemental rules can be switched
//! off; the four protocol rules in `RuleId::CORE` always run.

use std::collections::HashSet;
use std::fmt;
use std::ops::RangeInclusive;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::model::{DiagnosisKey, ReportType, KEY_DATA_LENGTH};

/// Ten-minute intervals since the epoch, carried as an unsigned 32-bit value.
pub const ROLLING_START_INTERVAL_RANGE: RangeInclusive<i64> = 1..=u32::MAX as i64;
pub const TRANSMISSION_RISK_LEVEL_RANGE: RangeInclusive<i64> = 0..=8;
/// 144 ten-minute intervals = one day.
pub const ROLLING_PERIOD_RANGE: RangeInclusive<i64> = 1..=144;
pub const DAYS_SINCE_ONSET_RANGE: RangeInclusive<i64> = -14..=4000;

lazy_static! {
    static ref COUNTRY_CODE: Regex = Regex::new(r"^[A-Z]{2}$").unwrap();
}

/// Identifier used to switch a rule on or off in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RuleId {
    KeyData,
    RollingStartInterval,
    TransmissionRiskLevel,
    RollingPeriod,
    Origin,
    VisitedCountries,
    DaysSinceOnset,
    ReportType,
}

impl RuleId {
    pub const ALL: [RuleId; 8] = [
        RuleId::KeyData,
        RuleId::RollingStartInterval,
        RuleId::TransmissionRiskLevel,
        RuleId::RollingPeriod,
        RuleId::Origin,
        RuleId::VisitedCountries,
        RuleId::DaysSinceOnset,
        RuleId::ReportType,
    ];

    /// Protocol rules that are always evaluated, whatever the configuration.
    pub const CORE: [RuleId; 4] = [
        RuleId::KeyData,
        RuleId::RollingStartInterval,
        RuleId::TransmissionRiskLevel,
        RuleId::RollingPeriod,
    ];

    pub fn is_core(&self) -> bool {
        Self::CORE.contains(self)
    }
}

/// Why a single key was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRejection {
    InvalidKeyData,
    InvalidRollingStartInterval,
    InvalidTransmissionRiskLevel,
    InvalidRollingPeriod,
    InvalidOrigin,
    InvalidVisitedCountries,
    InvalidDaysSinceOnsetOfSymptoms,
    InvalidReportType,
}

impl KeyRejection {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyRejection::InvalidKeyData => "InvalidKeyData",
            KeyRejection::InvalidRollingStartInterval => "InvalidRollingStartInterval",
            KeyRejection::InvalidTransmissionRiskLevel => "InvalidTransmissionRiskLevel",
            KeyRejection::InvalidRollingPeriod => "InvalidRollingPeriod",
            KeyRejection::InvalidOrigin => "InvalidOrigin",
            KeyRejection::InvalidVisitedCountries => "InvalidVisitedCountries",
            KeyRejection::InvalidDaysSinceOnsetOfSymptoms => "InvalidDaysSinceOnsetOfSymptoms",
            KeyRejection::InvalidReportType => "InvalidReportType",
        }
    }
}

impl fmt::Display for KeyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome for one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason")]
pub enum ValidationOutcome {
    Accepted,
    Rejected(KeyRejection),
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted)
    }

    pub fn rejection(&self) -> Option<KeyRejection> {
        match self {
            ValidationOutcome::Accepted => None,
            ValidationOutcome::Rejected(reason) => Some(*reason),
        }
    }
}

/// Facts about the request a rule may consult.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// Country of the authenticated uploader.
    pub uploader_country: &'a str,
}

struct KeyRule {
    id: RuleId,
    reason: KeyRejection,
    check: fn(&DiagnosisKey, &RuleContext<'_>) -> bool,
}

fn key_data_length(key: &DiagnosisKey, _: &RuleContext<'_>) -> bool {
    key.key_data.len() == KEY_DATA_LENGTH
}

fn rolling_start_interval_in_range(key: &DiagnosisKey, _: &RuleContext<'_>) -> bool {
    ROLLING_START_INTERVAL_RANGE.contains(&key.rolling_start_interval_number)
}

fn transmission_risk_level_in_range(key: &DiagnosisKey, _: &RuleContext<'_>) -> bool {
    TRANSMISSION_RISK_LEVEL_RANGE.contains(&key.transmission_risk_level)
}

fn rolling_period_in_range(key: &DiagnosisKey, _: &RuleContext<'_>) -> bool {
    ROLLING_PERIOD_RANGE.contains(&key.rolling_period)
}

fn origin_matches_uploader(key: &DiagnosisKey, ctx: &RuleContext<'_>) -> bool {
    key.origin == ctx.uploader_country
}

fn visited_countries_well_formed(key: &DiagnosisKey, _: &RuleContext<'_>) -> bool {
    key.visited_countries.iter().all(|c| COUNTRY_CODE.is_match(c))
}

fn days_since_onset_in_range(key: &DiagnosisKey, _: &RuleContext<'_>) -> bool {
    key.days_since_onset_of_symptoms
        .map_or(true, |days| DAYS_SINCE_ONSET_RANGE.contains(&days))
}

fn report_type_known(key: &DiagnosisKey, _: &RuleContext<'_>) -> bool {
    key.report_type
        .as_deref()
        .map_or(true, |name| ReportType::from_name(name).is_some())
}

/// Evaluation order. Key data must stay first.
static RULES: [KeyRule; 8] = [
    KeyRule {
        id: RuleId::KeyData,
        reason: KeyRejection::InvalidKeyData,
        check: key_data_length,
    },
    KeyRule {
        id: RuleId::RollingStartInterval,
        reason: KeyRejection::InvalidRollingStartInterval,
        check: rolling_start_interval_in_range,
    },
    KeyRule {
        id: RuleId::TransmissionRiskLevel,
        reason: KeyRejection::InvalidTransmissionRiskLevel,
        check: transmission_risk_level_in_range,
    },
    KeyRule {
        id: RuleId::RollingPeriod,
        reason: KeyRejection::InvalidRollingPeriod,
        check: rolling_period_in_range,
    },
    KeyRule {
        id: RuleId::Origin,
        reason: KeyRejection::InvalidOrigin,
        check: origin_matches_uploader,
    },
    KeyRule {
        id: RuleId::VisitedCountries,
        reason: KeyRejection::InvalidVisitedCountries,
        check: visited_countries_well_formed,
    },
    KeyRule {
        id: RuleId::DaysSinceOnset,
        reason: KeyRejection::InvalidDaysSinceOnsetOfSymptoms,
        check: days_since_onset_in_range,
    },
    KeyRule {
        id: RuleId::ReportType,
        reason: KeyRejection::InvalidReportType,
        check: report_type_known,
    },
];

/// Validates diagnosis keys against the enabled rules.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    enabled: HashSet<RuleId>,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new(RuleId::ALL)
    }
}

impl FieldValidator {
    /// Core rules are added to `enabled` even when it omits them.
    pub fn new(enabled: impl IntoIterator<Item = RuleId>) -> Self {
        Self {
            enabled: RuleId::CORE.into_iter().chain(enabled).collect(),
        }
    }

    pub fn is_enabled(&self, rule: RuleId) -> bool {
        self.enabled.contains(&rule)
    }

    fn active_rules(&self) -> impl Iterator<Item = &'static KeyRule> + '_ {
        RULES.iter().filter(move |rule| self.enabled.contains(&rule.id))
    }

    /// First failing rule decides the outcome.
    pub fn validate(&self, key: &DiagnosisKey, ctx: &RuleContext<'_>) -> ValidationOutcome {
        self.active_rules()
            .find(|rule| !(rule.check)(key, ctx))
            .map_or(ValidationOutcome::Accepted, |rule| {
                ValidationOutcome::Rejected(rule.reason)
            })
    }

    /// Every failing rule, in evaluation order.
    pub fn violations(&self, key: &DiagnosisKey, ctx: &RuleContext<'_>) -> Vec<KeyRejection> {
        self.active_rules()
            .filter(|rule| !(rule.check)(key, ctx))
            .map(|rule| rule.reason)
            .collect()
    }
}
