//! Translation of dimensional expressions into SQLite `GROUP BY` queries.

use crate::convert::{quote_ident, to_sql};
use induction_adapter::{AggregateFunction, DataError, Expression, Result};

/// Scalar functions that may appear inside expressions
const FUNCTIONS: &[&str] = &[
    "abs", "coalesce", "date", "ifnull", "length", "lower", "round", "strftime", "substr",
    "trim", "upper",
];

/// SQL text plus the constants bound to its `?` placeholders
#[derive(Debug)]
pub struct Translated {
    pub sql: String,
    pub params: Vec<rusqlite::types::Value>,
}

struct Translator<'a> {
    columns: &'a [String],
    params: Vec<rusqlite::types::Value>,
}

impl Translator<'_> {
    fn expression(&mut self, expression: &Expression) -> Result<String> {
        match expression {
            // SQLite reads an unknown double-quoted identifier as a string literal
            Expression::Field(key) => {
                if self.columns.iter().any(|column| column.eq_ignore_ascii_case(key)) {
                    Ok(quote_ident(key))
                } else {
                    Err(DataError::ExecutionFailed(format!("no such column: {}", key)))
                }
            }
            Expression::Constant(value) => {
                self.params.push(to_sql(value));
                Ok("?".to_string())
            }
            Expression::Function { name, arguments } => {
                let name = name.to_ascii_lowercase();
                if !FUNCTIONS.contains(&name.as_str()) {
                    return Err(DataError::unsupported(format!(
                        "function '{}' is not available in SQLite expressions",
                        name
                    )));
                }
                let arguments = arguments
                    .iter()
                    .map(|argument| self.expression(argument))
                    .collect::<Result<Vec<_>>>()?;
                Ok(format!("{}({})", name, arguments.join(", ")))
            }
            Expression::Aggregate { function, argument } => {
                let keyword = match function {
                    AggregateFunction::Count => "COUNT",
                    AggregateFunction::Sum => "SUM",
                    AggregateFunction::Average => "AVG",
                    AggregateFunction::Min => "MIN",
                    AggregateFunction::Max => "MAX",
                };
                match argument {
                    Some(argument) => Ok(format!("{}({})", keyword, self.expression(argument)?)),
                    None if *function == AggregateFunction::Count => Ok("COUNT(*)".to_string()),
                    None => Err(DataError::unsupported(format!(
                        "{} needs an argument",
                        function
                    ))),
                }
            }
        }
    }
}

/// `SELECT dimension, measures… FROM schema.table GROUP BY 1 ORDER BY 1`.
/// Field references must name one of `columns`.
pub fn dimension_query(
    schema: &str,
    table: &str,
    columns: &[String],
    dimension: &Expression,
    measures: &[Expression],
) -> Result<Translated> {
    Expression::validate_dimensional(dimension, measures)?;

    let mut translator = Translator {
        columns,
        params: Vec::new(),
    };
    let mut selected = Vec::with_capacity(measures.len() + 1);
    for expression in std::iter::once(dimension).chain(measures) {
        let sql = translator.expression(expression)?;
        selected.push(format!("{} AS {}", sql, quote_ident(&expression.label())));
    }

    let sql = format!(
        "SELECT {} FROM {}.{} GROUP BY 1 ORDER BY 1",
        selected.join(", "),
        quote_ident(schema),
        quote_ident(table)
    );
    Ok(Translated {
        sql,
        params: translator.params,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn test_simple_dimension() {
        let translated = dimension_query(
            "main",
            "orders",
            &columns(&["id", "status", "amount"]),
            &Expression::field("status"),
            &[Expression::count(), Expression::sum(Expression::field("amount"))],
        )
        .unwrap();
        assert_eq!(
            translated.sql,
            "SELECT \"status\" AS \"status\", COUNT(*) AS \"count(*)\", SUM(\"amount\") AS \"sum(amount)\" \
             FROM \"main\".\"orders\" GROUP BY 1 ORDER BY 1"
        );
        assert!(translated.params.is_empty());
    }

    #[test]
    fn test_constants_are_bound() {
        let dimension = Expression::function(
            "substr",
            vec![Expression::field("day"), Expression::constant(1), Expression::constant(7)],
        );
        let translated =
            dimension_query("main", "t", &columns(&["day"]), &dimension, &[Expression::count()])
                .unwrap();
        assert!(translated.sql.starts_with("SELECT substr(\"day\", ?, ?) AS"));
        assert_eq!(translated.params.len(), 2);
    }

    #[test]
    fn test_unknown_function_rejected() {
        let dimension = Expression::function("load_extension", vec![Expression::constant("x")]);
        let err = dimension_query("main", "t", &[], &dimension, &[Expression::count()])
            .unwrap_err();
        assert!(matches!(err, DataError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_measure_must_aggregate() {
        let err = dimension_query(
            "main",
            "t",
            &columns(&["a", "b"]),
            &Expression::field("a"),
            &[Expression::field("b")],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::UnsupportedConstruct(_)));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let known = columns(&["Status"]);
        assert!(dimension_query("main", "t", &known, &Expression::field("status"), &[]).is_ok());

        let err = dimension_query(
            "main",
            "t",
            &known,
            &Expression::field("status"),
            &[Expression::sum(Expression::field("missing"))],
        )
        .unwrap_err();
        assert!(matches!(err, DataError::ExecutionFailed(_)));
    }
}
