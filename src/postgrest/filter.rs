//! Filter operators for table queries

/// Operator for filter expressions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equal to
    Eq,

    /// Greater than or equal to
    Gte,

    /// In a list of values
    In,
}

impl FilterOperator {
    /// Convert the operator to its string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Gte => "gte",
            FilterOperator::In => "in",
        }
    }

    /// Render `operator.value` as used in query strings and realtime filters
    pub fn apply(&self, value: &str) -> String {
        format!("{}.{}", self.as_str(), value)
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        }
    }
}

/// Format values for `in.(...)`
pub(crate) fn list_literal<T: ToString>(values: &[T]) -> String {
    let joined = values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(",");
    format!("({})", joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_rendering() {
        assert_eq!(FilterOperator::Eq.apply("42"), "eq.42");
        assert_eq!(FilterOperator::Gte.apply("2030-01-01"), "gte.2030-01-01");
        assert_eq!(list_literal(&["a", "b"]), "(a,b)");
        assert_eq!(list_literal::<&str>(&[]), "()");
    }
}
