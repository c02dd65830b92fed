//! Structural expressions for dimensional fetches.
//!
//! Backends translate these trees into their own aggregation syntax instead
//! of receiving free text. The textual form produced by [`Expression::label`]
//! is also what [`Expression::from_str`] accepts, e.g. `sum(amount)`,
//! `count(*)`, `lower(country)`.

use crate::error::{DataError, Result};
use crate::types::Value;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregateFunction {
    Count,
    Sum,
    Average,
    Min,
    Max,
}

impl fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregateFunction::Count => write!(f, "count"),
            AggregateFunction::Sum => write!(f, "sum"),
            AggregateFunction::Average => write!(f, "avg"),
            AggregateFunction::Min => write!(f, "min"),
            AggregateFunction::Max => write!(f, "max"),
        }
    }
}

impl FromStr for AggregateFunction {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "count" => Ok(AggregateFunction::Count),
            "sum" => Ok(AggregateFunction::Sum),
            "avg" | "average" => Ok(AggregateFunction::Average),
            "min" => Ok(AggregateFunction::Min),
            "max" => Ok(AggregateFunction::Max),
            other => Err(DataError::unsupported(format!(
                "Unknown aggregate function '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Expression {
    /// Value of a record key
    Field(String),
    /// Literal value
    Constant(Value),
    /// Scalar function applied per record
    Function {
        name: String,
        arguments: Vec<Expression>,
    },
    /// Aggregate over a group; `None` argument means "every record"
    Aggregate {
        function: AggregateFunction,
        argument: Option<Box<Expression>>,
    },
}

impl Expression {
    pub fn field(key: impl Into<String>) -> Self {
        Expression::Field(key.into())
    }

    pub fn constant(value: impl Into<Value>) -> Self {
        Expression::Constant(value.into())
    }

    pub fn function(name: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into(),
            arguments,
        }
    }

    pub fn count() -> Self {
        Expression::Aggregate {
            function: AggregateFunction::Count,
            argument: None,
        }
    }

    pub fn aggregate(function: AggregateFunction, argument: Expression) -> Self {
        Expression::Aggregate {
            function,
            argument: Some(Box::new(argument)),
        }
    }

    pub fn sum(argument: Expression) -> Self {
        Self::aggregate(AggregateFunction::Sum, argument)
    }

    pub fn average(argument: Expression) -> Self {
        Self::aggregate(AggregateFunction::Average, argument)
    }

    pub fn min(argument: Expression) -> Self {
        Self::aggregate(AggregateFunction::Min, argument)
    }

    pub fn max(argument: Expression) -> Self {
        Self::aggregate(AggregateFunction::Max, argument)
    }

    /// Whether the tree contains an aggregate anywhere
    pub fn is_aggregate(&self) -> bool {
        match self {
            Expression::Field(_) | Expression::Constant(_) => false,
            Expression::Function { arguments, .. } => arguments.iter().any(|a| a.is_aggregate()),
            Expression::Aggregate { .. } => true,
        }
    }

    /// Canonical text, used as the result column identifier
    pub fn label(&self) -> String {
        match self {
            Expression::Field(key) => key.clone(),
            Expression::Constant(Value::String(s)) => format!("'{}'", s.replace('\'', "''")),
            Expression::Constant(value) => value.to_string(),
            Expression::Function { name, arguments } => {
                let args: Vec<String> = arguments.iter().map(|a| a.label()).collect();
                format!("{}({})", name, args.join(", "))
            }
            Expression::Aggregate { function, argument } => match argument {
                Some(arg) => format!("{}({})", function, arg.label()),
                None => format!("{}(*)", function),
            },
        }
    }

    /// Check a dimension/measures pair before translating it.
    ///
    /// The dimension must be a per-record expression and every measure must be
    /// a single, non-nested aggregate.
    pub fn validate_dimensional(dimension: &Expression, measures: &[Expression]) -> Result<()> {
        if dimension.is_aggregate() {
            return Err(DataError::unsupported(format!(
                "Dimension '{}' must not aggregate",
                dimension.label()
            )));
        }
        for measure in measures {
            match measure {
                Expression::Aggregate { argument, .. } => {
                    if argument.as_deref().is_some_and(Expression::is_aggregate) {
                        return Err(DataError::unsupported(format!(
                            "Nested aggregate in measure '{}'",
                            measure.label()
                        )));
                    }
                }
                _ => {
                    return Err(DataError::unsupported(format!(
                        "Measure '{}' is not an aggregate",
                        measure.label()
                    )))
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

impl FromStr for Expression {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parser = Parser {
            input: s.as_bytes(),
            text: s,
            pos: 0,
        };
        let expression = parser.expression()?;
        parser.skip_whitespace();
        if parser.pos != parser.input.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(expression)
    }
}

struct Parser<'a> {
    input: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn error(&self, what: &str) -> DataError {
        DataError::QuerySyntax(format!(
            "{} at position {} in '{}'",
            what, self.pos, self.text
        ))
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.input.len() && self.input[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn expression(&mut self) -> Result<Expression> {
        self.skip_whitespace();
        match self.peek() {
            Some(b'\'') => self.string(),
            Some(c) if c.is_ascii_digit() || c == b'-' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.identifier_or_call(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("expected expression")),
        }
    }

    fn string(&mut self) -> Result<Expression> {
        self.pos += 1;
        let mut out = String::new();
        loop {
            let rest = &self.text[self.pos..];
            match rest.find('\'') {
                Some(offset) => {
                    out.push_str(&rest[..offset]);
                    self.pos += offset + 1;
                    if self.peek() == Some(b'\'') {
                        out.push('\'');
                        self.pos += 1;
                    } else {
                        return Ok(Expression::Constant(Value::String(out)));
                    }
                }
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn number(&mut self) -> Result<Expression> {
        let start = self.pos;
        self.pos += 1;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal = &self.text[start..self.pos];
        if let Ok(v) = literal.parse::<i64>() {
            return Ok(Expression::Constant(Value::Integer(v)));
        }
        literal
            .parse::<f64>()
            .map(|v| Expression::Constant(Value::Decimal(v)))
            .map_err(|_| self.error("invalid number"))
    }

    fn identifier_or_call(&mut self) -> Result<Expression> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == b'_' || c == b'.' {
                self.pos += 1;
            } else {
                break;
            }
        }
        let name = self.text[start..self.pos].to_string();
        self.skip_whitespace();
        if self.peek() != Some(b'(') {
            return Ok(Expression::Field(name));
        }
        self.pos += 1;
        self.skip_whitespace();

        if let Ok(function) = name.parse::<AggregateFunction>() {
            if self.peek() == Some(b'*') {
                self.pos += 1;
                self.expect(b')')?;
                return Ok(Expression::Aggregate {
                    function,
                    argument: None,
                });
            }
            let argument = self.expression()?;
            self.expect(b')')?;
            return Ok(Expression::aggregate(function, argument));
        }

        let mut arguments = Vec::new();
        if self.peek() == Some(b')') {
            self.pos += 1;
            return Ok(Expression::Function { name, arguments });
        }
        loop {
            arguments.push(self.expression()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b')') => {
                    self.pos += 1;
                    return Ok(Expression::Function { name, arguments });
                }
                _ => return Err(self.error("expected ',' or ')'")),
            }
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", byte as char)))
        }
    }
}
