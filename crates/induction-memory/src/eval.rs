//! Evaluates dimensional expressions over fixture rows.

use induction_adapter::{AggregateFunction, DataError, Expression, Record, Result, Value, ValueType};
use std::cmp::Ordering;
use std::sync::Arc;

/// Per-record value of a non-aggregate expression
pub fn evaluate(expression: &Expression, record: &dyn Record) -> Result<Value> {
    match expression {
        Expression::Field(key) => record
            .value_for_key(key)
            .cloned()
            .ok_or_else(|| DataError::ExecutionFailed(format!("no such column: {}", key))),
        Expression::Constant(value) => Ok(value.clone()),
        Expression::Function { name, arguments } => {
            let values = arguments
                .iter()
                .map(|argument| evaluate(argument, record))
                .collect::<Result<Vec<_>>>()?;
            apply_function(name, values)
        }
        Expression::Aggregate { .. } => Err(DataError::unsupported(format!(
            "aggregate {} used as a per-record value",
            expression.label()
        ))),
    }
}

fn apply_function(name: &str, values: Vec<Value>) -> Result<Value> {
    let single = |values: Vec<Value>| -> Result<Value> {
        let mut values = values.into_iter();
        match (values.next(), values.next()) {
            (Some(value), None) => Ok(value),
            _ => Err(DataError::QuerySyntax(format!(
                "{} expects exactly one argument",
                name
            ))),
        }
    };

    match name.to_ascii_lowercase().as_str() {
        "lower" => Ok(map_string(single(values)?, |s| s.to_lowercase())),
        "upper" => Ok(map_string(single(values)?, |s| s.to_uppercase())),
        "length" => Ok(match single(values)? {
            Value::Null => Value::Null,
            Value::String(s) => Value::Integer(s.chars().count() as i64),
            Value::Blob(b) => Value::Integer(b.len() as i64),
            other => Value::Integer(other.to_string().chars().count() as i64),
        }),
        other => Err(DataError::unsupported(format!(
            "function '{}' is not available",
            other
        ))),
    }
}

fn map_string(value: Value, f: impl Fn(&str) -> String) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::String(s) => Value::String(f(&s)),
        other => Value::String(f(&other.to_string())),
    }
}

/// Total order used for min/max; nulls are skipped before comparing
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.to_string().cmp(&b.to_string()),
    }
}

/// Running state of one measure within one group
#[derive(Debug)]
enum Accumulator {
    Count(i64),
    Sum { total: Total, seen: bool },
    Average { total: f64, count: usize },
    Extreme { best: Option<Value>, want: Ordering },
}

impl Accumulator {
    fn new(function: AggregateFunction) -> Self {
        match function {
            AggregateFunction::Count => Accumulator::Count(0),
            AggregateFunction::Sum => Accumulator::Sum {
                total: Total::Integer(0),
                seen: false,
            },
            AggregateFunction::Average => Accumulator::Average {
                total: 0.0,
                count: 0,
            },
            AggregateFunction::Min => Accumulator::Extreme {
                best: None,
                want: Ordering::Less,
            },
            AggregateFunction::Max => Accumulator::Extreme {
                best: None,
                want: Ordering::Greater,
            },
        }
    }

    /// `None` input means a row for `count(*)`
    fn add(&mut self, input: Option<Value>) -> Result<()> {
        if matches!(input, Some(Value::Null)) {
            return Ok(());
        }
        match self {
            Accumulator::Count(n) => *n += 1,
            Accumulator::Sum { total, seen } => {
                total.add(&input.unwrap_or(Value::Null))?;
                *seen = true;
            }
            Accumulator::Average { total, count } => {
                *total += numeric(&input.unwrap_or(Value::Null))?;
                *count += 1;
            }
            Accumulator::Extreme { best, want } => {
                if let Some(value) = input {
                    let replace = match best {
                        Some(current) => compare(&value, current) == *want,
                        None => true,
                    };
                    if replace {
                        *best = Some(value);
                    }
                }
            }
        }
        Ok(())
    }

    fn finish(self) -> Value {
        match self {
            Accumulator::Count(n) => Value::Integer(n),
            Accumulator::Sum { seen: false, .. } => Value::Null,
            Accumulator::Sum {
                total: Total::Integer(n),
                ..
            } => Value::Integer(n),
            Accumulator::Sum {
                total: Total::Decimal(x),
                ..
            } => Value::Decimal(x),
            Accumulator::Average { count: 0, .. } => Value::Null,
            Accumulator::Average { total, count } => Value::Decimal(total / count as f64),
            Accumulator::Extreme { best, .. } => best.unwrap_or(Value::Null),
        }
    }
}

/// Running sum; stays exact while every input is integral
#[derive(Debug)]
enum Total {
    Integer(i64),
    Decimal(f64),
}

impl Total {
    fn add(&mut self, value: &Value) -> Result<()> {
        let integral = match value {
            Value::Integer(n) => Some(*n),
            Value::Boolean(b) => Some(i64::from(*b)),
            _ => None,
        };
        *self = match (&*self, integral) {
            (Total::Integer(total), Some(n)) => match total.checked_add(n) {
                Some(sum) => Total::Integer(sum),
                None => {
                    return Err(DataError::ExecutionFailed(
                        "integer overflow in sum".to_string(),
                    ))
                }
            },
            (Total::Integer(total), None) => Total::Decimal(*total as f64 + numeric(value)?),
            (Total::Decimal(total), _) => Total::Decimal(total + numeric(value)?),
        };
        Ok(())
    }
}

fn numeric(value: &Value) -> Result<f64> {
    value.as_f64().ok_or_else(|| {
        DataError::ExecutionFailed(format!("cannot aggregate non-numeric value {}", value))
    })
}

/// Aggregated output: one row per distinct dimension value
#[derive(Debug)]
pub struct DimensionTable {
    pub columns: Vec<(String, Option<ValueType>)>,
    pub rows: Vec<Vec<Value>>,
}

/// Group `records` by `dimension` and compute `measures` for each group.
/// Groups appear in the order their dimension value is first seen.
pub fn aggregate(
    records: &[Arc<dyn Record>],
    dimension: &Expression,
    measures: &[Expression],
) -> Result<DimensionTable> {
    Expression::validate_dimensional(dimension, measures)?;

    let plans = measures
        .iter()
        .map(|measure| match measure {
            Expression::Aggregate { function, argument } => Ok((*function, argument.as_deref())),
            other => Err(DataError::unsupported(format!(
                "measure {} is not an aggregate",
                other.label()
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut groups: Vec<(Value, Vec<Accumulator>)> = Vec::new();
    for record in records {
        let key = evaluate(dimension, record.as_ref())?;
        let slot = match groups.iter().position(|(existing, _)| *existing == key) {
            Some(slot) => slot,
            None => {
                let accumulators = plans.iter().map(|(f, _)| Accumulator::new(*f)).collect();
                groups.push((key, accumulators));
                groups.len() - 1
            }
        };

        for ((_, argument), accumulator) in plans.iter().zip(groups[slot].1.iter_mut()) {
            let input = match argument {
                Some(argument) => Some(evaluate(argument, record.as_ref())?),
                None => None,
            };
            accumulator.add(input)?;
        }
    }

    let mut columns = vec![(dimension.label(), None)];
    columns.extend(plans.iter().zip(measures).map(|((function, _), measure)| {
        let value_type = match function {
            AggregateFunction::Count => Some(ValueType::Integer),
            AggregateFunction::Average => Some(ValueType::Decimal),
            _ => None,
        };
        (measure.label(), value_type)
    }));

    let rows = groups
        .into_iter()
        .map(|(key, accumulators)| {
            std::iter::once(key)
                .chain(accumulators.into_iter().map(Accumulator::finish))
                .collect()
        })
        .collect();

    Ok(DimensionTable { columns, rows })
}
