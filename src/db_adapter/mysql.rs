use sqlx::mysql::{MySqlArguments, MySqlQueryResult};
use sqlx::{Arguments, Executor, MySql, MySqlConnection, Pool};

use crate::spec::KeyRetrieval;
use crate::update_execute::{BatchOutcome, ExecutionUnit, SingleOutcome};
use crate::value::Value;
use crate::Error;

fn encode(params: &[Value]) -> Result<MySqlArguments, Error> {
    let mut args = MySqlArguments::default();
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

fn single_outcome(done: &MySqlQueryResult, keys: KeyRetrieval) -> SingleOutcome {
    let generated_keys = match keys {
        KeyRetrieval::None => None,
        _ if done.rows_affected() == 0 => Some(Vec::new()),
        _ => Some(vec![vec![Value::Int(done.last_insert_id() as i64)]]),
    };
    SingleOutcome {
        rows_affected: done.rows_affected(),
        generated_keys,
    }
}

impl ExecutionUnit for MySqlConnection {
    fn bind_marker(&self, _n: usize, sql: &mut String) {
        sql.push('?');
    }

    async fn execute_single(
        &mut self,
        sql: &str,
        params: &[Value],
        keys: KeyRetrieval,
    ) -> Result<SingleOutcome, Error> {
        let args = encode(params)?;
        let done = (&mut *self).execute(sqlx::query_with(sql, args)).await?;
        Ok(single_outcome(&done, keys))
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

impl ExecutionUnit for Pool<MySql> {
    fn bind_marker(&self, _n: usize, sql: &mut String) {
        sql.push('?');
    }

    async fn execute_single(
        &mut self,
        sql: &str,
        params: &[Value],
        keys: KeyRetrieval,
    ) -> Result<SingleOutcome, Error> {
        let args = encode(params)?;
        let done = (&*self).execute(sqlx::query_with(sql, args)).await?;
        Ok(single_outcome(&done, keys))
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
