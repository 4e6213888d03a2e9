use regex::Regex;

use crate::{models::Clause, Target};

pub const SEGMENT_MATCH: &str = "segmentMatch";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    StartsWith,
    EndsWith,
    Match,
    Contains,
    Equal,
    EqualSensitive,
    In,
}

impl Operator {
    pub fn parse(op: &str) -> Option<Operator> {
        let operator = match op {
            "starts_with" => Self::StartsWith,
            "ends_with" => Self::EndsWith,
            "match" => Self::Match,
            "contains" => Self::Contains,
            "equal" => Self::Equal,
            "equal_sensitive" => Self::EqualSensitive,
            "in" => Self::In,
            _ => return None,
        };
        Some(operator)
    }

    /// Applying `Operator` to the attribute. Returns `false` if the operator cannot be applied or
    /// there's a misconfiguration.
    pub fn eval(&self, attribute: &str, values: &[String]) -> bool {
        self.try_eval(attribute, values).unwrap_or(false)
    }

    fn try_eval(&self, attribute: &str, values: &[String]) -> Option<bool> {
        // All operators except `in` compare against the first value only.
        let first = || values.first().map(String::as_str);
        let result = match self {
            Self::In => values.iter().any(|v| v == attribute),
            Self::StartsWith => attribute.starts_with(first()?),
            Self::EndsWith => attribute.ends_with(first()?),
            // The pattern must match the whole attribute.
            Self::Match => Regex::new(&format!("^(?:{})$", first()?))
                .ok()?
                .is_match(attribute),
            Self::Contains => attribute.contains(first()?),
            Self::Equal => attribute.to_lowercase() == first()?.to_lowercase(),
            Self::EqualSensitive => attribute == first()?,
        };
        Some(result)
    }
}

impl Clause {
    /// Evaluate an attribute clause. `segmentMatch` clauses need the segment list and are handled
    /// by the evaluator.
    pub fn eval_attribute(&self, target: &Target) -> bool {
        let Some(operator) = Operator::parse(&self.op) else {
            log::debug!(target: "ff_wrapper", op = self.op.as_str(); "unknown clause operator");
            return false;
        };
        let Some(attribute) = target.get_attribute(&self.attribute) else {
            return false;
        };
        let matched = operator.eval(&attribute, &self.values);
        matched != self.negate
    }
}
