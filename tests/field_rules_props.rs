//! Property tests for the per-key field rules and canonical bytes.

use proptest::prelude::*;

use efgs_intake::model::{DiagnosisKey, DiagnosisKeyBatch, ReportType};
use efgs_intake::validation::{
    signable_bytes, FieldValidator, KeyRejection, RuleContext, ValidationOutcome,
};

const DE: RuleContext<'static> = RuleContext {
    uploader_country: "DE",
};

fn valid_key() -> impl Strategy<Value = DiagnosisKey> {
    (
        prop::collection::vec(any::<u8>(), 16),
        1..=u32::MAX as i64,
        1..=144i64,
        0..=8i64,
        prop::collection::vec("[A-Z]{2}", 0..4),
        prop::sample::select(ReportType::ALL.to_vec()),
        prop::option::of(-14..=4000i64),
    )
        .prop_map(
            |(key_data, rsin, rolling_period, trl, visited, report_type, days)| DiagnosisKey {
                key_data,
                rolling_start_interval_number: rsin,
                rolling_period,
                transmission_risk_level: trl,
                visited_countries: visited,
                origin: "DE".to_string(),
                report_type: Some(report_type.as_str().to_string()),
                days_since_onset_of_symptoms: days,
            },
        )
}

proptest! {
    #[test]
    fn valid_keys_are_accepted(key in valid_key()) {
        let validator = FieldValidator::default();
        prop_assert_eq!(validator.validate(&key, &DE), ValidationOutcome::Accepted);
        prop_assert!(validator.violations(&key, &DE).is_empty());
    }

    #[test]
    fn wrong_key_length_always_invalid_key_data(
        key in valid_key(),
        len in (0usize..64).prop_filter("not 16", |l| *l != 16),
        trl in any::<i64>(),
    ) {
        let key = DiagnosisKey {
            key_data: vec![0xAB; len],
            transmission_risk_level: trl,
            ..key
        };
        prop_assert_eq!(
            FieldValidator::default().validate(&key, &DE),
            ValidationOutcome::Rejected(KeyRejection::InvalidKeyData)
        );
    }

    #[test]
    fn non_positive_start_interval_rejected(
        key in valid_key(),
        rsin in i64::MIN..=0,
        rolling_period in any::<i64>(),
        trl in any::<i64>(),
    ) {
        let key = DiagnosisKey {
            rolling_start_interval_number: rsin,
            rolling_period,
            transmission_risk_level: trl,
            ..key
        };
        prop_assert_eq!(
            FieldValidator::default().validate(&key, &DE),
            ValidationOutcome::Rejected(KeyRejection::InvalidRollingStartInterval)
        );
    }

    #[test]
    fn out_of_range_risk_level_rejected(
        key in valid_key(),
        trl in prop_oneof![i64::MIN..0, 9..=i64::MAX],
    ) {
        let key = DiagnosisKey { transmission_risk_level: trl, ..key };
        prop_assert_eq!(
            FieldValidator::default().validate(&key, &DE),
            ValidationOutcome::Rejected(KeyRejection::InvalidTransmissionRiskLevel)
        );
    }

    #[test]
    fn out_of_range_rolling_period_rejected(
        key in valid_key(),
        rolling_period in prop_oneof![i64::MIN..=0, 145..=i64::MAX],
    ) {
        let key = DiagnosisKey { rolling_period, ..key };
        prop_assert_eq!(
            FieldValidator::default().validate(&key, &DE),
            ValidationOutcome::Rejected(KeyRejection::InvalidRollingPeriod)
        );
    }

    #[test]
    fn first_violation_decides_outcome(key in valid_key(), trl in any::<i64>(), rp in any::<i64>()) {
        let key = DiagnosisKey {
            transmission_risk_level: trl,
            rolling_period: rp,
            ..key
        };
        let validator = FieldValidator::default();
        let outcome = validator.validate(&key, &DE);
        let violations = validator.violations(&key, &DE);
        prop_assert_eq!(outcome.rejection(), violations.first().copied());
    }

    #[test]
    fn broken_sibling_never_fails_decoding(
        key in valid_key(),
        key_data in ".{0,40}",
        trl in any::<u64>(),
        rolling_period in any::<f64>(),
    ) {
        let body = serde_json::json!({
            "keys": [
                key,
                {
                    "keyData": key_data,
                    "transmissionRiskLevel": trl,
                    "rollingPeriod": rolling_period,
                    "origin": "DE"
                }
            ]
        });
        let batch: DiagnosisKeyBatch = serde_json::from_value(body).unwrap();
        prop_assert_eq!(batch.len(), 2);
        prop_assert_eq!(&batch.keys[0], &key);

        let validator = FieldValidator::default();
        prop_assert!(validator.validate(&batch.keys[0], &DE).is_accepted());
        prop_assert!(!validator.validate(&batch.keys[1], &DE).is_accepted());
    }

    #[test]
    fn canonical_bytes_ignore_key_order(keys in prop::collection::vec(valid_key(), 1..6)) {
        let forward = DiagnosisKeyBatch::new(keys.clone());
        let mut reversed_keys = keys;
        reversed_keys.reverse();
        let reversed = DiagnosisKeyBatch::new(reversed_keys);
        prop_assert_eq!(signable_bytes(&forward), signable_bytes(&reversed));
    }
}
