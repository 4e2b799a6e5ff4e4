use crate::error::BoxDynError;
use crate::template::Placeholder;
use crate::value::{ReaderConvention, Record, Value};
use crate::Error;

/// Caller-supplied per-position value converter.
///
/// Bound to a parameter position by
/// [`BindingSpecBuilder::converter`](crate::BindingSpecBuilder::converter);
/// transforms the resolved value into the representation handed to the
/// execution unit. Must not observe or depend on engine state.
pub trait ValueConverter: Send + Sync {
    fn convert(&self, raw: Value) -> Result<Value, BoxDynError>;
}

impl<F> ValueConverter for F
where
    F: Fn(Value) -> Result<Value, BoxDynError> + Send + Sync,
{
    fn convert(&self, raw: Value) -> Result<Value, BoxDynError> {
        self(raw)
    }
}

/// Resolves a placeholder against the live argument values.
///
/// Validates the 1-based argument index, then descends the dotted path one
/// member at a time. A `Null` intermediate short-circuits to `Null` without
/// further descent.
pub(crate) fn resolve(
    placeholder: &Placeholder,
    arguments: &[Value],
    readers: ReaderConvention,
) -> Result<Value, Error> {
    let index = placeholder.arg_index;
    if index == 0 || index > arguments.len() {
        return Err(Error::binding(format!(
            "placeholder ?{index} is out of range for {} argument(s)",
            arguments.len()
        )));
    }
    let mut current = arguments[index - 1].clone();
    for segment in &placeholder.path {
        current = match current {
            Value::Null => return Ok(Value::Null),
            Value::Record(record) => lookup_member(&*record, segment, readers)?,
            other => {
                return Err(Error::binding(format!(
                    "cannot descend into `{segment}` on a {} value",
                    other.kind()
                )));
            }
        };
    }
    Ok(current)
}

/// Field-then-reader member lookup. A field named exactly `name` wins over
/// any reader the convention derives for it.
fn lookup_member(
    record: &dyn Record,
    name: &str,
    readers: ReaderConvention,
) -> Result<Value, Error> {
    if let Some(value) = record.field(name) {
        return Ok(value);
    }
    for reader in readers.reader_names(name) {
        if let Some(value) = record.reader(&reader) {
            return Ok(value);
        }
    }
    Err(Error::binding(format!(
        "no field or reader for `{name}` on `{}`",
        record.type_name()
    )))
}
