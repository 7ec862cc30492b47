use crate::errors::HudError;

/// A parsed bar or elevation edit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttributeInput {
    pub amount: f64,
    pub is_delta: bool,
}

impl AttributeInput {
    /// Parses `+n`/`-n` as a delta, `=n` and a bare `n` as an absolute value.
    pub fn parse(input: &str) -> Result<Self, HudError> {
        let trimmed = input.trim();
        let (body, is_delta) = match trimmed.chars().next() {
            Some('=') => (&trimmed[1..], false),
            Some('+') | Some('-') => (trimmed, true),
            _ => (trimmed, false),
        };
        let amount: f64 = body
            .trim()
            .parse()
            .map_err(|_| HudError::NotApplicable(format!("'{input}' is not a number")))?;
        if !amount.is_finite() {
            return Err(HudError::NotApplicable(format!("'{input}' is not finite")));
        }
        Ok(AttributeInput { amount, is_delta })
    }

    /// Absolute value after applying this edit to `current`.
    pub fn resolve(&self, current: f64) -> f64 {
        if self.is_delta {
            current + self.amount
        } else {
            self.amount
        }
    }

    /// Value handed to attribute writes: the delta itself or the absolute value.
    pub fn as_write_value(&self) -> i32 {
        self.amount.round() as i32
    }
}
