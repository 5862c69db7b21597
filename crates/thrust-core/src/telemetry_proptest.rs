#[cfg(test)]
mod proptest_telemetry {
    use crate::error::GatewayError;
    use crate::gateway::{ForcePayload, PowerPayload, RpmPayload};
    use crate::setpoint::DutyCycle;
    use crate::telemetry::TelemetrySnapshot;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Read {
        Ok(f64, f64),
        Failed,
    }

    fn read_strategy() -> impl Strategy<Value = Read> {
        prop_oneof![
            (-5.0f64..30.0, 0.0f64..40.0).prop_map(|(a, b)| Read::Ok(a, b)),
            Just(Read::Failed),
        ]
    }

    fn failure() -> GatewayError {
        GatewayError::Transport("timed out".into())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(2000))]

        // Property: a failed power or force read never changes the stored value
        // and always clears the matching flag within the same tick.
        #[test]
        fn failed_reads_keep_values_and_clear_flags(
            ticks in proptest::collection::vec(
                (read_strategy(), read_strategy(), read_strategy()),
                1..40,
            )
        ) {
            let mut snap = TelemetrySnapshot::default();
            for (rpm, power, force) in ticks {
                let before = snap.reading;

                let rpm_read = match rpm {
                    Read::Ok(value, _) => Ok(RpmPayload { rpm: value.abs() * 100.0 }),
                    Read::Failed => Err(failure()),
                };
                snap.apply_rpm(&rpm_read);
                if rpm_read.is_err() {
                    prop_assert_eq!(snap.reading.rpm, before.rpm);
                }

                match power {
                    Read::Ok(voltage, current) => {
                        snap.apply_power(&Ok(PowerPayload { voltage, current }));
                        prop_assert_eq!(snap.reading.voltage, voltage);
                        prop_assert_eq!(snap.connection.power_connected, voltage > 0.0);
                    }
                    Read::Failed => {
                        snap.apply_power(&Err(failure()));
                        prop_assert_eq!(snap.reading.voltage, before.voltage);
                        prop_assert_eq!(snap.reading.current, before.current);
                        prop_assert!(!snap.connection.power_connected);
                    }
                }

                match force {
                    Read::Ok(value, selector) => {
                        // Use the second component to exercise the null payload.
                        let force = if selector < 10.0 { None } else { Some(value) };
                        snap.apply_force(&Ok(ForcePayload { force }));
                        prop_assert_eq!(snap.connection.force_connected, force.is_some());
                        if force.is_none() {
                            prop_assert_eq!(snap.reading.force, before.force);
                        }
                    }
                    Read::Failed => {
                        snap.apply_force(&Err(failure()));
                        prop_assert_eq!(snap.reading.force, before.force);
                        prop_assert!(!snap.connection.force_connected);
                    }
                }
                snap.complete_tick();
            }
        }

        // Property: any in-range percentage converts by exact division.
        #[test]
        fn percent_conversion_is_exact(percent in 0.0f64..=100.0) {
            let duty = DutyCycle::from_percent(percent).unwrap();
            prop_assert_eq!(duty.fraction(), percent / 100.0);
        }

        // Property: out-of-range percentages are always rejected.
        #[test]
        fn out_of_range_percent_rejected(
            percent in prop_oneof![-1000.0f64..-0.001, 100.001f64..1000.0]
        ) {
            prop_assert!(DutyCycle::from_percent(percent).is_err());
        }
    }
}
