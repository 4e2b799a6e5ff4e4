use futures_util::TryStreamExt;
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::{Arguments, Column, Either, Executor, PgConnection, Pool, Postgres, Row, TypeInfo};

use crate::extract::KeyTuple;
use crate::spec::KeyRetrieval;
use crate::update_execute::{BatchOutcome, ExecutionUnit, SingleOutcome};
use crate::value::Value;
use crate::Error;

fn encode(params: &[Value]) -> Result<PgArguments, Error> {
    let mut args = PgArguments::default();
    for value in params {
        let added = match value {
            Value::Null => args.add(Option::<i64>::None),
            Value::Bool(v) => args.add(*v),
            Value::Int(v) => args.add(*v),
            Value::Float(v) => args.add(*v),
            Value::Text(v) => args.add(v.as_str()),
            Value::Bytes(v) => args.add(v.as_slice()),
            Value::Seq(_) | Value::Record(_) => {
                return Err(Error::binding(format!(
                    "cannot bind a {} value as a statement parameter",
                    value.kind()
                )));
            }
        };
        added.map_err(|source| Error::Binding {
            message: "failed to encode parameter".into(),
            source: Some(source),
        })?;
    }
    Ok(args)
}

/// Decodes one returned row into a key tuple, honoring the first-column
/// truncation up front.
fn key_tuple(row: &PgRow, keys: KeyRetrieval) -> Result<KeyTuple, Error> {
    let take = match keys {
        KeyRetrieval::FirstColumn => row.len().min(1),
        _ => row.len(),
    };
    let mut tuple = Vec::with_capacity(take);
    for index in 0..take {
        tuple.push(decode_column(row, index)?);
    }
    Ok(tuple)
}

fn decode_column(row: &PgRow, index: usize) -> Result<Value, Error> {
    let type_name = row.column(index).type_info().name().to_string();
    let value = match type_name.as_str() {
        "INT2" => row.try_get::<Option<i16>, _>(index)?.map(|v| Value::Int(v.into())),
        "INT4" => row.try_get::<Option<i32>, _>(index)?.map(|v| Value::Int(v.into())),
        "INT8" => row.try_get::<Option<i64>, _>(index)?.map(Value::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)?
            .map(|v| Value::Float(v.into())),
        "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.map(Value::Float),
        "BOOL" => row.try_get::<Option<bool>, _>(index)?.map(Value::Bool),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index)?.map(Value::Text)
        }
        "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.map(Value::Bytes),
        other => {
            return Err(Error::Execution(
                format!("unsupported generated-key column type `{other}`").into(),
            ));
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

/// Runs the statement through `fetch_many`, summing affected-row counts and
/// collecting any rows the statement returns as key tuples.
#[allow(deprecated)]
async fn single_with_keys<'c, E>(
    executor: E,
    sql: &str,
    params: &[Value],
    keys: KeyRetrieval,
) -> Result<SingleOutcome, Error>
where
    E: Executor<'c, Database = Postgres>,
{
    let args = encode(params)?;
    let mut stream = executor.fetch_many(sqlx::query_with(sql, args));
    let mut rows_affected = 0;
    let mut generated_keys = Vec::new();
    while let Some(step) = stream.try_next().await? {
        match step {
            Either::Left(done) => rows_affected += done.rows_affected(),
            Either::Right(row) => generated_keys.push(key_tuple(&row, keys)?),
        }
    }
    Ok(SingleOutcome {
        rows_affected,
        generated_keys: Some(generated_keys),
    })
}

impl ExecutionUnit for PgConnection {
    fn bind_marker(&self, n: usize, sql: &mut String) {
        sql.push_str(&format!("${n}"));
    }

    async fn execute_single(
        &mut self,
        sql: &str,
        params: &[Value],
        keys: KeyRetrieval,
    ) -> Result<SingleOutcome, Error> {
        if keys == KeyRetrieval::None {
            let args = encode(params)?;
            let done = (&mut *self).execute(sqlx::query_with(sql, args)).await?;
            return Ok(SingleOutcome {
                rows_affected: done.rows_affected(),
                generated_keys: None,
            });
        }
        single_with_keys(&mut *self, sql, params, keys).await
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        sets: &[Vec<Value>],
    ) -> Result<BatchOutcome, Error> {
        let mut rows_affected = Vec::with_capacity(sets.len());
        for set in sets {
            let args = encode(set)?;
            let done = (&mut *self).execute(sqlx::query_with(sql, args)).await?;
            rows_affected.push(done.rows_affected());
        }
        Ok(BatchOutcome { rows_affected })
    }
}

impl ExecutionUnit for Pool<Postgres> {
    fn bind_marker(&self, n: usize, sql: &mut String) {
        sql.push_str(&format!("${n}"));
    }

    async fn execute_single(
        &mut self,
        sql: &str,
        params: &[Value],
        keys: KeyRetrieval,
    ) -> Result<SingleOutcome, Error> {
        if keys == KeyRetrieval::None {
            let args = encode(params)?;
            let done = (&*self).execute(sqlx::query_with(sql, args)).await?;
            return Ok(SingleOutcome {
                rows_affected: done.rows_affected(),
                generated_keys: None,
            });
        }
        single_with_keys(&*self, sql, params, keys).await
    }

    async fn execute_batch(
        &mut self,
        sql: &str,
        sets: &[Vec<Value>],
    ) -> Result<BatchOutcome, Error> {
        let mut rows_affected = Vec::with_capacity(sets.len());
        for set in sets {
            let args = encode(set)?;
            let done = (&*self).execute(sqlx::query_with(sql, args)).await?;
            rows_affected.push(done.rows_affected());
        }
        Ok(BatchOutcome { rows_affected })
    }
}
