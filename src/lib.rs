#![doc = include_str!("../README.md")]

pub mod db_adapter;
mod error;
mod extract;
mod resolve;
mod spec;
mod template;
mod update_execute;
mod value;

pub use error::{BoxDynError, Error};
pub use extract::{ExecutionResult, KeyTuple, UpdateReturn};
pub use resolve::ValueConverter;
pub use spec::{
    BindingSpec, BindingSpecBuilder, ExecutionMode, KeyRetrieval, ReturnShape, UpdateRegistry,
};
pub use template::{Placeholder, Segment, Template};
pub use update_execute::{BatchOutcome, ExecutionUnit, SingleOutcome};
pub use value::{MapRecord, ReaderConvention, Record, Value};
