use std::marker::PhantomData;
use thiserror::Error;

/// Longest test run the console will submit, in seconds.
pub const MAX_TEST_DURATION_S: f64 = 86_400.0;

#[derive(Debug, Clone, Copy)]
pub struct Unvalidated;

#[derive(Debug, Clone, Copy)]
pub struct Validated;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum InputViolation {
    #[error("Duty cycle must be a finite number (got {requested})")]
    NonFiniteDutyCycle { requested: f64 },

    #[error("Duty cycle {requested} is outside 0..=1")]
    DutyCycleOutOfRange { requested: f64 },

    #[error("Test duration must be a finite number (got {requested})")]
    NonFiniteDuration { requested: f64 },

    #[error("Test duration must be positive (got {requested} s)")]
    NonPositiveDuration { requested: f64 },

    #[error("Test duration {requested} s exceeds the {max} s limit")]
    DurationTooLong { requested: f64, max: f64 },
}

/// Duty cycle as a fraction in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DutyCycle(f64);

impl DutyCycle {
    pub fn from_fraction(fraction: f64) -> Result<Self, InputViolation> {
        if !fraction.is_finite() {
            return Err(InputViolation::NonFiniteDutyCycle {
                requested: fraction,
            });
        }
        if !(0.0..=1.0).contains(&fraction) {
            return Err(InputViolation::DutyCycleOutOfRange {
                requested: fraction,
            });
        }
        Ok(Self(fraction))
    }

    /// Operator input is a percentage; the device takes a fraction.
    /// The conversion is a plain division by 100 with no rounding.
    pub fn from_percent(percent: f64) -> Result<Self, InputViolation> {
        Self::from_fraction(percent / 100.0)
    }

    pub fn fraction(&self) -> f64 {
        self.0
    }

    pub fn percent(&self) -> f64 {
        self.0 * 100.0
    }
}

/// Parameters of one timed test run. Built at launch and consumed by the
/// submission; only a validated configuration can be submitted.
#[derive(Debug, Clone, Copy)]
pub struct TestConfiguration<State = Unvalidated> {
    duration_s: f64,
    duty_cycle: f64,
    _state: PhantomData<State>,
}

impl TestConfiguration<Unvalidated> {
    pub fn new(duration_s: f64, duty_cycle_fraction: f64) -> Self {
        Self {
            duration_s,
            duty_cycle: duty_cycle_fraction,
            _state: PhantomData,
        }
    }

    pub fn from_operator_input(duration_s: f64, duty_cycle_percent: f64) -> Self {
        Self::new(duration_s, duty_cycle_percent / 100.0)
    }

    pub fn validate(self) -> Result<TestConfiguration<Validated>, InputViolation> {
        if !self.duration_s.is_finite() {
            return Err(InputViolation::NonFiniteDuration {
                requested: self.duration_s,
            });
        }
        if self.duration_s <= 0.0 {
            return Err(InputViolation::NonPositiveDuration {
                requested: self.duration_s,
            });
        }
        if self.duration_s > MAX_TEST_DURATION_S {
            return Err(InputViolation::DurationTooLong {
                requested: self.duration_s,
                max: MAX_TEST_DURATION_S,
            });
        }
        let duty = DutyCycle::from_fraction(self.duty_cycle)?;

        Ok(TestConfiguration {
            duration_s: self.duration_s,
            duty_cycle: duty.fraction(),
            _state: PhantomData,
        })
    }
}

impl TestConfiguration<Validated> {
    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn duty_cycle(&self) -> f64 {
        self.duty_cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_input_is_divided_exactly() {
        let duty = DutyCycle::from_percent(63.27).unwrap();
        assert_eq!(duty.fraction(), 0.6327);
    }

    #[test]
    fn rejects_nan_duty_cycle() {
        let res = DutyCycle::from_fraction(f64::NAN);
        assert!(matches!(
            res,
            Err(InputViolation::NonFiniteDutyCycle { .. })
        ));
    }

    #[test]
    fn rejects_duty_cycle_above_full_scale() {
        let res = DutyCycle::from_percent(100.5);
        assert!(matches!(
            res,
            Err(InputViolation::DutyCycleOutOfRange { .. })
        ));
    }

    #[test]
    fn accepts_bounds() {
        assert!(DutyCycle::from_fraction(0.0).is_ok());
        assert!(DutyCycle::from_fraction(1.0).is_ok());
    }

    #[test]
    fn rejects_zero_duration() {
        let res = TestConfiguration::new(0.0, 0.5).validate();
        assert!(matches!(
            res,
            Err(InputViolation::NonPositiveDuration { .. })
        ));
    }

    #[test]
    fn rejects_duration_beyond_limit() {
        let res = TestConfiguration::new(1e20, 0.5).validate();
        assert!(matches!(
            res,
            Err(InputViolation::DurationTooLong { .. })
        ));
        assert!(TestConfiguration::new(MAX_TEST_DURATION_S, 0.5)
            .validate()
            .is_ok());
    }

    #[test]
    fn operator_input_builds_fractional_configuration() {
        let config = TestConfiguration::from_operator_input(10.0, 63.27)
            .validate()
            .unwrap();
        assert_eq!(config.duration_s(), 10.0);
        assert_eq!(config.duty_cycle(), 0.6327);
    }
}
