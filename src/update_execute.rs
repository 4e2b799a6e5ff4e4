use crate::extract::{extract, ExecutionResult, KeyTuple, UpdateReturn};
use crate::resolve::resolve;
use crate::spec::{BindingSpec, ExecutionMode, KeyRetrieval};
use crate::value::Value;
use crate::Error;

/// Outcome of a single-shot execution.
#[derive(Debug, Clone, PartialEq)]
pub struct SingleOutcome {
    pub rows_affected: u64,
    /// Captured key tuples, present when key retrieval was requested.
    pub generated_keys: Option<Vec<KeyTuple>>,
}

/// Outcome of a batched execution, one count per submitted parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub rows_affected: Vec<u64>,
}

/// The underlying statement-execution collaborator.
///
/// The engine renders the statement through [`bind_marker`], hands over
/// fully-bound parameter sets, and interprets the outcome; everything else
/// (connections, transactions, dialects) belongs to the implementation.
/// sqlx-backed units live in [`db_adapter`](crate::db_adapter).
///
/// [`bind_marker`]: ExecutionUnit::bind_marker
#[allow(async_fn_in_trait)]
pub trait ExecutionUnit {
    /// Appends the unit's native bind marker for the 1-based parameter
    /// slot `n`.
    fn bind_marker(&self, n: usize, sql: &mut String);

    /// Executes the statement once with one parameter set, capturing
    /// generated keys when `keys` requests them.
    async fn execute_single(
        &mut self,
        sql: &str,
        params: &[Value],
        keys: KeyRetrieval,
    ) -> Result<SingleOutcome, Error>;

    /// Executes the statement once per parameter set as one batched unit,
    /// in order.
    async fn execute_batch(
        &mut self,
        sql: &str,
        sets: &[Vec<Value>],
    ) -> Result<BatchOutcome, Error>;
}

impl BindingSpec {
    /// Invokes the declared method against the live argument values.
    ///
    /// Resolution and binding complete for every parameter set before the
    /// unit sees the statement, so a call-time failure never reaches the
    /// database and never leaves partial state behind.
    pub async fn invoke<U: ExecutionUnit>(
        &self,
        unit: &mut U,
        arguments: &[Value],
    ) -> Result<UpdateReturn, Error> {
        match self.mode() {
            ExecutionMode::Single => self.invoke_single(unit, arguments).await,
            ExecutionMode::Batch => self.invoke_batch(unit, arguments).await,
        }
    }

    async fn invoke_single<U: ExecutionUnit>(
        &self,
        unit: &mut U,
        arguments: &[Value],
    ) -> Result<UpdateReturn, Error> {
        let params = self.bind_parameters(arguments)?;
        let sql = self.render_sql(unit);
        tracing::debug!(sql = %sql, "executing update");
        let outcome = unit.execute_single(&sql, &params, self.keys()).await?;

        let result = match self.keys() {
            KeyRetrieval::None => match self.returns() {
                crate::ReturnShape::Void => ExecutionResult::Void,
                _ => ExecutionResult::RowsAffected(outcome.rows_affected),
            },
            mode => {
                let mut keys = outcome.generated_keys.unwrap_or_default();
                if mode == KeyRetrieval::FirstColumn {
                    for tuple in &mut keys {
                        tuple.truncate(1);
                    }
                }
                ExecutionResult::GeneratedKeys(keys)
            }
        };
        extract(result, self.returns())
    }

    async fn invoke_batch<U: ExecutionUnit>(
        &self,
        unit: &mut U,
        arguments: &[Value],
    ) -> Result<UpdateReturn, Error> {
        let len = batch_len(arguments)?;
        let mut sets = Vec::with_capacity(len);
        for i in 0..len {
            let row: Vec<Value> = arguments
                .iter()
                .map(|argument| match argument {
                    Value::Seq(items) => items[i].clone(),
                    _ => Value::Null,
                })
                .collect();
            sets.push(self.bind_parameters(&row)?);
        }

        let sql = self.render_sql(unit);
        tracing::debug!(sql = %sql, rows = len, "executing batch update");
        let outcome = if sets.is_empty() {
            BatchOutcome {
                rows_affected: Vec::new(),
            }
        } else {
            unit.execute_batch(&sql, &sets).await?
        };

        let result = match self.returns() {
            crate::ReturnShape::Void => ExecutionResult::Void,
            _ => ExecutionResult::RowsAffectedPerRow(outcome.rows_affected),
        };
        extract(result, self.returns())
    }

    /// Resolves and binds every placeholder against one argument row,
    /// in source order.
    fn bind_parameters(&self, arguments: &[Value]) -> Result<Vec<Value>, Error> {
        let mut params = Vec::with_capacity(self.template().placeholder_count());
        for (slot, placeholder) in self.template().placeholders().enumerate() {
            let raw = resolve(placeholder, arguments, self.reader_convention())?;
            let bound = match self.converter(slot) {
                Some(converter) => converter
                    .convert(raw)
                    .map_err(|source| Error::converter(slot + 1, source))?,
                None => raw,
            };
            params.push(bound);
        }
        Ok(params)
    }

    fn render_sql<U: ExecutionUnit>(&self, unit: &U) -> String {
        self.template().render(|n, sql| unit.bind_marker(n, sql))
    }
}

/// Validates batch argument shapes and returns the common length.
///
/// Every argument must be a sequence, and all sequences must agree on
/// length; anything else fails before the unit is touched.
fn batch_len(arguments: &[Value]) -> Result<usize, Error> {
    if arguments.is_empty() {
        return Err(Error::BatchShape(
            "batch update requires at least one sequence argument".into(),
        ));
    }
    let mut len = None;
    for (i, argument) in arguments.iter().enumerate() {
        let items = match argument {
            Value::Seq(items) => items,
            other => {
                return Err(Error::BatchShape(format!(
                    "batch argument {} is a {}, expected a sequence",
                    i + 1,
                    other.kind()
                )));
            }
        };
        match len {
            None => len = Some(items.len()),
            Some(expected) if expected != items.len() => {
                return Err(Error::BatchShape(format!(
                    "batch argument {} has length {}, expected {expected}",
                    i + 1,
                    items.len()
                )));
            }
            Some(_) => {}
        }
    }
    Ok(len.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::{KeyRetrieval, ReturnShape};
    use crate::value::MapRecord;
    use crate::BoxDynError;
    use std::sync::Arc;

    #[derive(Debug, PartialEq)]
    enum Call {
        Single { sql: String, params: Vec<Value> },
        Batch { sql: String, sets: Vec<Vec<Value>> },
    }

    /// Recording stand-in for a database-backed unit.
    struct FakeUnit {
        numbered_markers: bool,
        rows_affected: u64,
        generated_keys: Option<Vec<KeyTuple>>,
        fail_with: Option<String>,
        calls: Vec<Call>,
    }

    impl FakeUnit {
        fn new() -> FakeUnit {
            FakeUnit {
                numbered_markers: false,
                rows_affected: 1,
                generated_keys: None,
                fail_with: None,
                calls: Vec::new(),
            }
        }
    }

    impl ExecutionUnit for FakeUnit {
        fn bind_marker(&self, n: usize, sql: &mut String) {
            if self.numbered_markers {
                sql.push('$');
                sql.push_str(&n.to_string());
            } else {
                sql.push('?');
            }
        }

        async fn execute_single(
            &mut self,
            sql: &str,
            params: &[Value],
            _keys: KeyRetrieval,
        ) -> Result<SingleOutcome, Error> {
            if let Some(message) = &self.fail_with {
                return Err(Error::Execution(message.clone().into()));
            }
            self.calls.push(Call::Single {
                sql: sql.to_string(),
                params: params.to_vec(),
            });
            Ok(SingleOutcome {
                rows_affected: self.rows_affected,
                generated_keys: self.generated_keys.clone(),
            })
        }

        async fn execute_batch(
            &mut self,
            sql: &str,
            sets: &[Vec<Value>],
        ) -> Result<BatchOutcome, Error> {
            if let Some(message) = &self.fail_with {
                return Err(Error::Execution(message.clone().into()));
            }
            let rows_affected = vec![self.rows_affected; sets.len()];
            self.calls.push(Call::Batch {
                sql: sql.to_string(),
                sets: sets.to_vec(),
            });
            Ok(BatchOutcome { rows_affected })
        }
    }

    fn args(values: impl IntoIterator<Item = Value>) -> Vec<Value> {
        values.into_iter().collect()
    }

    #[tokio::test]
    async fn single_update_binds_in_source_order() {
        let spec = BindingSpec::builder("UPDATE user SET username = ?1 WHERE id = ?2", 2)
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        let out = spec
            .invoke(&mut unit, &args([Value::from("jason"), Value::from(9)]))
            .await
            .unwrap();
        assert_eq!(out, UpdateReturn::Count(1));
        assert_eq!(
            unit.calls,
            vec![Call::Single {
                sql: "UPDATE user SET username = ? WHERE id = ?".into(),
                params: vec![Value::Text("jason".into()), Value::Int(9)],
            }]
        );
    }

    #[tokio::test]
    async fn numbered_markers_follow_source_order() {
        let spec = BindingSpec::builder("UPDATE t SET a = ?2, b = ?1", 2)
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        unit.numbered_markers = true;
        spec.invoke(&mut unit, &args([Value::from("x"), Value::from("y")]))
            .await
            .unwrap();
        match &unit.calls[0] {
            Call::Single { sql, params } => {
                assert_eq!(sql, "UPDATE t SET a = $1, b = $2");
                assert_eq!(params, &[Value::Text("y".into()), Value::Text("x".into())]);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn record_paths_resolve_per_call() {
        let spec = BindingSpec::builder(
            "UPDATE user SET username = ?{1.username} WHERE id = ?{1.id}",
            1,
        )
        .build()
        .unwrap();
        let user = MapRecord::new("User")
            .with_field("id", 3)
            .with_reader("getUsername", "jason");
        let mut unit = FakeUnit::new();
        spec.invoke(&mut unit, &args([Value::record(user)]))
            .await
            .unwrap();
        match &unit.calls[0] {
            Call::Single { params, .. } => {
                assert_eq!(params, &[Value::Text("jason".into()), Value::Int(3)]);
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn out_of_range_index_never_executes() {
        let spec = BindingSpec::builder("UPDATE t SET a = ?9", 3).build().unwrap();
        let mut unit = FakeUnit::new();
        let call_args = args([Value::from(1), Value::from(2), Value::from(3)]);
        for _ in 0..2 {
            let err = spec.invoke(&mut unit, &call_args).await.unwrap_err();
            assert!(matches!(err, Error::Binding { .. }));
        }
        assert!(unit.calls.is_empty());
    }

    #[tokio::test]
    async fn converter_applies_by_position() {
        struct Upper;
        impl crate::ValueConverter for Upper {
            fn convert(&self, raw: Value) -> Result<Value, BoxDynError> {
                match raw {
                    Value::Text(s) => Ok(Value::Text(s.to_uppercase())),
                    other => Ok(other),
                }
            }
        }
        let spec = BindingSpec::builder("UPDATE t SET a = ?1, b = ?1", 1)
            .converter(2, Arc::new(Upper))
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        spec.invoke(&mut unit, &args([Value::from("jason")]))
            .await
            .unwrap();
        match &unit.calls[0] {
            Call::Single { params, .. } => {
                assert_eq!(
                    params,
                    &[Value::Text("jason".into()), Value::Text("JASON".into())]
                );
            }
            other => panic!("unexpected call {other:?}"),
        }
    }

    #[tokio::test]
    async fn converter_failure_is_a_binding_error() {
        struct Reject;
        impl crate::ValueConverter for Reject {
            fn convert(&self, _raw: Value) -> Result<Value, BoxDynError> {
                Err("bad value".into())
            }
        }
        let spec = BindingSpec::builder("UPDATE t SET a = ?1", 1)
            .converter(1, Arc::new(Reject))
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        let err = spec
            .invoke(&mut unit, &args([Value::from("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Binding { .. }));
        assert!(err.to_string().contains("parameter 1"));
        assert!(unit.calls.is_empty());
    }

    #[tokio::test]
    async fn batch_produces_one_set_per_row() {
        let spec = BindingSpec::builder("INSERT INTO t (a, b) VALUES (?1, ?2)", 2)
            .batch()
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        let out = spec
            .invoke(
                &mut unit,
                &args([Value::from(vec!["a", "b"]), Value::from(vec![1, 2])]),
            )
            .await
            .unwrap();
        assert_eq!(out, UpdateReturn::Count(2));
        assert_eq!(
            unit.calls,
            vec![Call::Batch {
                sql: "INSERT INTO t (a, b) VALUES (?, ?)".into(),
                sets: vec![
                    vec![Value::Text("a".into()), Value::Int(1)],
                    vec![Value::Text("b".into()), Value::Int(2)],
                ],
            }]
        );
    }

    #[tokio::test]
    async fn batch_length_mismatch_fails_before_execution() {
        let spec = BindingSpec::builder("INSERT INTO t (a, b) VALUES (?1, ?2)", 2)
            .batch()
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        let err = spec
            .invoke(
                &mut unit,
                &args([Value::from(vec!["a", "b", "c"]), Value::from(vec![1, 2])]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BatchShape(_)));
        assert!(unit.calls.is_empty());
    }

    #[tokio::test]
    async fn batch_rejects_non_sequence_argument() {
        let spec = BindingSpec::builder("INSERT INTO t (a, b) VALUES (?1, ?2)", 2)
            .batch()
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        let err = spec
            .invoke(
                &mut unit,
                &args([Value::from(vec!["a", "b"]), Value::from(1)]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BatchShape(_)));
        assert!(unit.calls.is_empty());
    }

    #[tokio::test]
    async fn empty_batch_executes_nothing() {
        let spec = BindingSpec::builder("INSERT INTO t (a) VALUES (?1)", 1)
            .batch()
            .returns(ReturnShape::Counts)
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        let out = spec
            .invoke(&mut unit, &args([Value::Seq(Vec::new())]))
            .await
            .unwrap();
        assert_eq!(out, UpdateReturn::Counts(Vec::new()));
        assert!(unit.calls.is_empty());
    }

    #[tokio::test]
    async fn per_row_counts_are_returned_in_order() {
        let spec = BindingSpec::builder("UPDATE t SET a = ?1", 1)
            .batch()
            .returns(ReturnShape::Counts)
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        let out = spec
            .invoke(&mut unit, &args([Value::from(vec!["a", "b", "c"])]))
            .await
            .unwrap();
        assert_eq!(out, UpdateReturn::Counts(vec![1, 1, 1]));
    }

    #[tokio::test]
    async fn void_discards_the_outcome() {
        let spec = BindingSpec::builder("UPDATE t SET a = ?1", 1)
            .returns(ReturnShape::Void)
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        unit.rows_affected = 42;
        let out = spec
            .invoke(&mut unit, &args([Value::from("x")]))
            .await
            .unwrap();
        assert_eq!(out, UpdateReturn::Unit);
        assert_eq!(unit.calls.len(), 1);
    }

    #[tokio::test]
    async fn generated_keys_single_value() {
        let spec = BindingSpec::builder("INSERT INTO t (a) VALUES (?1)", 1)
            .keys(KeyRetrieval::FirstColumn)
            .returns(ReturnShape::Key)
            .build()
            .unwrap();
        let mut unit = FakeUnit::new();
        unit.generated_keys = Some(vec![vec![Value::Int(17), Value::Text("extra".into())]]);
        let out = spec
            .invoke(&mut unit, &args([Value::from("x")]))
            .await
            .unwrap();
        assert_eq!(out, UpdateReturn::Key(Value::Int(17)));
    }

    #[tokio::test]
    async fn generated_keys_collection_preserves_tuples() {
        let spec = BindingSpec::builder("INSERT INTO t (a) VALUES (?1)", 1)
            .keys(KeyRetrieval::AllColumns)
            .returns(ReturnShape::Keys)
            .build()
            .unwrap();
        let keys = vec![
            vec![Value::Int(1), Value::Text("a".into())],
            vec![Value::Int(2), Value::Text("b".into())],
        ];
        let mut unit = FakeUnit::new();
        unit.generated_keys = Some(keys.clone());
        let out = spec
            .invoke(&mut unit, &args([Value::from("x")]))
            .await
            .unwrap();
        assert_eq!(out, UpdateReturn::Keys(keys));
    }

    #[tokio::test]
    async fn unit_failures_surface_as_execution_errors() {
        let spec = BindingSpec::builder("UPDATE t SET a = ?1", 1).build().unwrap();
        let mut unit = FakeUnit::new();
        unit.fail_with = Some("constraint violation".into());
        let err = spec
            .invoke(&mut unit, &args([Value::from("x")]))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Execution(_)));
    }
}
