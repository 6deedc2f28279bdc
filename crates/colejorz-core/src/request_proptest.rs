#[cfg(test)]
mod proptest_request {
    use crate::request::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // In-range speeds with a non-negative timer always make it to the engine unchanged
        #[test]
        fn in_range_requests_accepted(speed in -100i64..=100, timed in 0i64..=3600) {
            let result = SpeedRequest::new(speed, Some(timed)).validate();
            prop_assert!(result.is_ok(), "speed={}, timed={}, result={:?}", speed, timed, result);
            let instr = result.unwrap().instruction();
            prop_assert_eq!(i64::from(instr.speed), speed);
            prop_assert_eq!(i64::from(instr.timed_secs), timed);
        }

        #[test]
        fn out_of_range_speed_rejected(
            speed in prop_oneof![-10_000i64..-100, 101i64..10_000],
        ) {
            let result = SpeedRequest::new(speed, None).validate();
            let rejected = matches!(
                result.as_ref().err().map(Vec::as_slice),
                Some([RequestViolation::SpeedOutOfRange { .. }])
            );
            prop_assert!(rejected, "Expected SpeedOutOfRange, got {:?}", result);
        }

        #[test]
        fn negative_timed_rejected(speed in -100i64..=100, timed in i64::MIN..0) {
            let result = SpeedRequest::new(speed, Some(timed)).validate();
            let rejected = matches!(
                result.as_ref().err().map(Vec::as_slice),
                Some([RequestViolation::NegativeTimed { .. }])
            );
            prop_assert!(rejected, "Expected NegativeTimed, got {:?}", result);
        }
    }
}
