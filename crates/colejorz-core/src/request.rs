use serde_json::Value;
use std::marker::PhantomData;
use thiserror::Error;

pub const MAX_SPEED: i64 = 100;

#[derive(Debug, Clone, Copy)]
pub struct Unvalidated;

#[derive(Debug, Clone, Copy)]
pub struct Validated;

/// A single speed command for the engine. `speed` carries direction in its
/// sign; `timed_secs == 0` means hold until superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub speed: i8,
    pub timed_secs: u32,
}

impl Instruction {
    pub fn new(speed: i8, timed_secs: u32) -> Self {
        Self { speed, timed_secs }
    }

    pub fn stop() -> Self {
        Self::new(0, 0)
    }

    pub fn magnitude(&self) -> u8 {
        self.speed.unsigned_abs()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestViolation {
    #[error("Request body must be a JSON object.")]
    NotAnObject,
    #[error("Missing \"speed\" value.")]
    MissingSpeed,
    #[error("Speed value must be a number")]
    SpeedNotANumber,
    #[error("Speed value must be in range <-100; 100>.")]
    SpeedOutOfRange { requested: i64 },
    #[error("Timed run value must be a number.")]
    TimedNotANumber,
    #[error(
        "Timed run value cannot be negative value must be 0 for untimed run or any positive value."
    )]
    NegativeTimed { requested: i64 },
    #[error("Timed run value must not exceed {max} seconds.", max = u32::MAX)]
    TimedTooLarge { requested: i64 },
}

/// Speed request as received from a caller, before range checks.
#[derive(Debug, Clone)]
pub struct SpeedRequest<State = Unvalidated> {
    speed: Option<Value>,
    timed: Option<Value>,
    body_is_object: bool,
    checked: Option<Instruction>,
    _state: PhantomData<State>,
}

impl SpeedRequest<Unvalidated> {
    pub fn from_body(body: &Value) -> Self {
        let object = body.as_object();
        Self {
            speed: object.and_then(|o| o.get("speed")).cloned(),
            timed: object.and_then(|o| o.get("timed")).cloned(),
            body_is_object: object.is_some(),
            checked: None,
            _state: PhantomData,
        }
    }

    pub fn new(speed: i64, timed: Option<i64>) -> Self {
        Self {
            speed: Some(Value::from(speed)),
            timed: timed.map(Value::from),
            body_is_object: true,
            checked: None,
            _state: PhantomData,
        }
    }

    /// Collects every problem with the request rather than stopping at the first.
    pub fn validate(self) -> Result<SpeedRequest<Validated>, Vec<RequestViolation>> {
        if !self.body_is_object {
            return Err(vec![RequestViolation::NotAnObject]);
        }
        let mut violations = Vec::new();

        let speed = match &self.speed {
            None => {
                violations.push(RequestViolation::MissingSpeed);
                None
            }
            Some(raw) => match as_integer(raw) {
                None => {
                    violations.push(RequestViolation::SpeedNotANumber);
                    None
                }
                Some(s) if !(-MAX_SPEED..=MAX_SPEED).contains(&s) => {
                    violations.push(RequestViolation::SpeedOutOfRange { requested: s });
                    None
                }
                Some(s) => Some(s),
            },
        };

        let timed = match &self.timed {
            None | Some(Value::Null) => Some(0),
            Some(raw) => match as_integer(raw) {
                None => {
                    violations.push(RequestViolation::TimedNotANumber);
                    None
                }
                Some(t) if t < 0 => {
                    violations.push(RequestViolation::NegativeTimed { requested: t });
                    None
                }
                Some(t) => match u32::try_from(t) {
                    Ok(secs) => Some(secs),
                    Err(_) => {
                        violations.push(RequestViolation::TimedTooLarge { requested: t });
                        None
                    }
                },
            },
        };

        match (speed, timed) {
            (Some(speed), Some(timed)) if violations.is_empty() => Ok(SpeedRequest {
                speed: self.speed,
                timed: self.timed,
                body_is_object: true,
                checked: Some(Instruction::new(speed as i8, timed)),
                _state: PhantomData,
            }),
            _ => Err(violations),
        }
    }
}

impl SpeedRequest<Validated> {
    pub fn instruction(&self) -> Instruction {
        self.checked.unwrap_or_else(Instruction::stop)
    }
}

/// Accepts JSON integers, whole floats truncated toward zero, and numeric strings.
fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_plain_speed() {
        let req = SpeedRequest::from_body(&json!({"speed": -40}))
            .validate()
            .unwrap();
        assert_eq!(req.instruction(), Instruction::new(-40, 0));
    }

    #[test]
    fn accepts_timed_and_string_speed() {
        let req = SpeedRequest::from_body(&json!({"speed": "55", "timed": 3}))
            .validate()
            .unwrap();
        assert_eq!(req.instruction(), Instruction::new(55, 3));
    }

    #[test]
    fn reports_missing_speed_and_negative_timed_together() {
        let errors = SpeedRequest::from_body(&json!({"timed": -1}))
            .validate()
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                RequestViolation::MissingSpeed,
                RequestViolation::NegativeTimed { requested: -1 }
            ]
        );
    }

    #[test]
    fn rejects_out_of_range_speed() {
        let errors = SpeedRequest::new(101, None).validate().unwrap_err();
        assert_eq!(
            errors,
            vec![RequestViolation::SpeedOutOfRange { requested: 101 }]
        );
        assert_eq!(
            errors[0].to_string(),
            "Speed value must be in range <-100; 100>."
        );
    }

    #[test]
    fn timed_beyond_u32_is_rejected_not_clamped() {
        let errors = SpeedRequest::new(10, Some(i64::from(u32::MAX) + 1))
            .validate()
            .unwrap_err();
        assert_eq!(
            errors,
            vec![RequestViolation::TimedTooLarge {
                requested: i64::from(u32::MAX) + 1
            }]
        );

        let req = SpeedRequest::new(10, Some(i64::from(u32::MAX)))
            .validate()
            .unwrap();
        assert_eq!(req.instruction().timed_secs, u32::MAX);
    }

    #[test]
    fn rejects_non_numeric_speed() {
        let errors = SpeedRequest::from_body(&json!({"speed": "fast"}))
            .validate()
            .unwrap_err();
        assert_eq!(errors, vec![RequestViolation::SpeedNotANumber]);
    }

    #[test]
    fn rejects_non_object_body() {
        let errors = SpeedRequest::from_body(&json!([1, 2]))
            .validate()
            .unwrap_err();
        assert_eq!(errors, vec![RequestViolation::NotAnObject]);
    }

    #[test]
    fn stop_has_zero_magnitude() {
        assert_eq!(Instruction::stop().magnitude(), 0);
        assert_eq!(Instruction::new(-100, 0).magnitude(), 100);
    }
}
