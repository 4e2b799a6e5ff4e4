use crate::spec::ReturnShape;
use crate::value::Value;
use crate::Error;

/// One generated-key row, in column order.
pub type KeyTuple = Vec<Value>;

/// Raw outcome of an execution, as interpreted by the execution strategy.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionResult {
    Void,
    RowsAffected(u64),
    RowsAffectedPerRow(Vec<u64>),
    GeneratedKeys(Vec<KeyTuple>),
}

/// Value an update method hands back to its caller.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateReturn {
    Unit,
    Count(u64),
    Counts(Vec<u64>),
    Key(Value),
    Keys(Vec<KeyTuple>),
}

/// Converts a raw execution result into the method's declared return shape.
///
/// Shape/result mismatches cannot occur for specs that passed registration
/// validation; they are reported as [`Error::Config`] rather than panicking.
pub(crate) fn extract(result: ExecutionResult, shape: ReturnShape) -> Result<UpdateReturn, Error> {
    match (shape, result) {
        (ReturnShape::Void, _) => Ok(UpdateReturn::Unit),
        (ReturnShape::Count, ExecutionResult::RowsAffected(count)) => {
            Ok(UpdateReturn::Count(count))
        }
        (ReturnShape::Count, ExecutionResult::RowsAffectedPerRow(counts)) => {
            Ok(UpdateReturn::Count(counts.iter().sum()))
        }
        (ReturnShape::Counts, ExecutionResult::RowsAffectedPerRow(counts)) => {
            Ok(UpdateReturn::Counts(counts))
        }
        (ReturnShape::Key, ExecutionResult::GeneratedKeys(keys)) => {
            let first = keys
                .into_iter()
                .next()
                .and_then(|tuple| tuple.into_iter().next())
                .unwrap_or(Value::Null);
            Ok(UpdateReturn::Key(first))
        }
        (ReturnShape::Keys, ExecutionResult::GeneratedKeys(keys)) => Ok(UpdateReturn::Keys(keys)),
        (shape, result) => Err(Error::Config(format!(
            "return shape {shape:?} does not match execution result {result:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn void_discards_nonzero_counts() {
        let out = extract(ExecutionResult::RowsAffected(7), ReturnShape::Void).unwrap();
        assert_eq!(out, UpdateReturn::Unit);
    }

    #[test]
    fn count_sums_batch_rows() {
        let out = extract(
            ExecutionResult::RowsAffectedPerRow(vec![1, 0, 2]),
            ReturnShape::Count,
        )
        .unwrap();
        assert_eq!(out, UpdateReturn::Count(3));
    }

    #[test]
    fn counts_keep_row_order() {
        let out = extract(
            ExecutionResult::RowsAffectedPerRow(vec![1, 0, 2]),
            ReturnShape::Counts,
        )
        .unwrap();
        assert_eq!(out, UpdateReturn::Counts(vec![1, 0, 2]));
    }

    #[test]
    fn key_takes_first_value_of_first_row() {
        let keys = vec![vec![Value::Int(41)], vec![Value::Int(42)]];
        let out = extract(ExecutionResult::GeneratedKeys(keys), ReturnShape::Key).unwrap();
        assert_eq!(out, UpdateReturn::Key(Value::Int(41)));
    }

    #[test]
    fn key_without_affected_rows_is_null() {
        let out = extract(ExecutionResult::GeneratedKeys(Vec::new()), ReturnShape::Key).unwrap();
        assert_eq!(out, UpdateReturn::Key(Value::Null));
    }

    #[test]
    fn keys_pass_through_in_order() {
        let keys = vec![
            vec![Value::Int(1), Value::Text("a".into())],
            vec![Value::Int(2), Value::Text("b".into())],
        ];
        let out = extract(
            ExecutionResult::GeneratedKeys(keys.clone()),
            ReturnShape::Keys,
        )
        .unwrap();
        assert_eq!(out, UpdateReturn::Keys(keys));
    }
}
