use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use parking_lot::RwLock;

use crate::resolve::ValueConverter;
use crate::template::Template;
use crate::value::ReaderConvention;
use crate::Error;

/// Whether an update method executes once per call or once per batch row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Single,
    /// Every argument must be a same-length sequence; the statement runs
    /// against the i-th elements of each sequence, submitted as one batched
    /// execution.
    Batch,
}

/// Whether, and how much of, the server-generated keys are captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyRetrieval {
    #[default]
    None,
    /// Each key tuple is truncated to its first column.
    FirstColumn,
    /// Full key tuples, one per affected row, in unit order.
    AllColumns,
}

/// The declared return shape of an update method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReturnShape {
    /// Affected-row count; in batch mode, the sum over all rows.
    #[default]
    Count,
    /// Ordered per-row counts; batch mode only.
    Counts,
    /// Discard the outcome entirely.
    Void,
    /// The single key value of the first affected row.
    Key,
    /// The full ordered key-tuple collection.
    Keys,
}

/// Immutable per-method binding metadata: the parsed template, execution
/// mode, key retrieval, return shape, declared arity, and per-position
/// converters.
///
/// Built once at registration via [`BindingSpec::builder`], validated there,
/// and shared read-only across any number of concurrent invocations.
pub struct BindingSpec {
    template: Template,
    mode: ExecutionMode,
    keys: KeyRetrieval,
    returns: ReturnShape,
    arity: usize,
    converters: Vec<Option<Arc<dyn ValueConverter>>>,
    readers: ReaderConvention,
}

impl std::fmt::Debug for BindingSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BindingSpec")
            .field("template", &self.template.source())
            .field("mode", &self.mode)
            .field("keys", &self.keys)
            .field("returns", &self.returns)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl BindingSpec {
    /// Starts a declaration for a method with `arity` parameters executing
    /// the given statement template.
    pub fn builder(statement: impl Into<String>, arity: usize) -> BindingSpecBuilder {
        BindingSpecBuilder {
            statement: statement.into(),
            arity,
            mode: ExecutionMode::default(),
            keys: KeyRetrieval::default(),
            returns: ReturnShape::default(),
            converters: Vec::new(),
            readers: ReaderConvention::default(),
        }
    }

    pub fn template(&self) -> &Template {
        &self.template
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn keys(&self) -> KeyRetrieval {
        self.keys
    }

    pub fn returns(&self) -> ReturnShape {
        self.returns
    }

    /// Declared parameter count of the method.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn reader_convention(&self) -> ReaderConvention {
        self.readers
    }

    /// Converter for the 0-based parameter slot, if one was declared.
    pub(crate) fn converter(&self, slot: usize) -> Option<&Arc<dyn ValueConverter>> {
        self.converters.get(slot).and_then(|c| c.as_ref())
    }
}

/// Builder for [`BindingSpec`]. All invalid declarations are rejected by
/// [`build`](BindingSpecBuilder::build), so a method with a broken
/// declaration can never be invoked.
pub struct BindingSpecBuilder {
    statement: String,
    arity: usize,
    mode: ExecutionMode,
    keys: KeyRetrieval,
    returns: ReturnShape,
    converters: Vec<(usize, Arc<dyn ValueConverter>)>,
    readers: ReaderConvention,
}

impl BindingSpecBuilder {
    /// Declares the method as a batch update.
    pub fn batch(mut self) -> Self {
        self.mode = ExecutionMode::Batch;
        self
    }

    pub fn keys(mut self, keys: KeyRetrieval) -> Self {
        self.keys = keys;
        self
    }

    pub fn returns(mut self, returns: ReturnShape) -> Self {
        self.returns = returns;
        self
    }

    /// Attaches a converter to the 1-based parameter position, counted over
    /// placeholders in source order.
    pub fn converter(mut self, position: usize, converter: Arc<dyn ValueConverter>) -> Self {
        self.converters.push((position, converter));
        self
    }

    pub fn reader_convention(mut self, readers: ReaderConvention) -> Self {
        self.readers = readers;
        self
    }

    /// Parses the template and validates the declaration.
    ///
    /// # Errors
    /// [`Error::TemplateSyntax`] for a malformed template;
    /// [`Error::Config`] for an incompatible mode/keys/shape combination or
    /// a converter position out of range.
    pub fn build(self) -> Result<BindingSpec, Error> {
        let template = Template::parse(&self.statement)?;

        if self.mode == ExecutionMode::Batch && self.keys != KeyRetrieval::None {
            return Err(Error::Config(
                "generated keys cannot be combined with a batch update".into(),
            ));
        }
        match self.returns {
            ReturnShape::Void | ReturnShape::Count if self.keys != KeyRetrieval::None => {
                return Err(Error::Config(format!(
                    "return shape {:?} discards the requested generated keys",
                    self.returns
                )));
            }
            ReturnShape::Counts => {
                if self.mode != ExecutionMode::Batch {
                    return Err(Error::Config(
                        "per-row counts require a batch update".into(),
                    ));
                }
                if self.keys != KeyRetrieval::None {
                    return Err(Error::Config(
                        "per-row counts discard the requested generated keys".into(),
                    ));
                }
            }
            ReturnShape::Key => {
                if self.keys != KeyRetrieval::FirstColumn {
                    return Err(Error::Config(
                        "a single key value requires first-column key retrieval".into(),
                    ));
                }
            }
            ReturnShape::Keys => {
                if self.keys == KeyRetrieval::None {
                    return Err(Error::Config(
                        "a key collection requires key retrieval to be enabled".into(),
                    ));
                }
            }
            _ => {}
        }

        let slots = template.placeholder_count();
        let mut converters: Vec<Option<Arc<dyn ValueConverter>>> = vec![None; slots];
        for (position, converter) in self.converters {
            if position == 0 || position > slots {
                return Err(Error::Config(format!(
                    "converter position {position} is out of range for {slots} parameter(s)"
                )));
            }
            converters[position - 1] = Some(converter);
        }

        Ok(BindingSpec {
            template,
            mode: self.mode,
            keys: self.keys,
            returns: self.returns,
            arity: self.arity,
            converters,
            readers: self.readers,
        })
    }
}

/// Named registry of update methods.
///
/// Populated at registration time, read-only thereafter; specs are handed
/// out as `Arc`s and stay valid for the life of the process.
#[derive(Default)]
pub struct UpdateRegistry {
    methods: RwLock<HashMap<String, Arc<BindingSpec>>>,
}

static GLOBAL: LazyLock<UpdateRegistry> = LazyLock::new(UpdateRegistry::default);

impl UpdateRegistry {
    pub fn new() -> UpdateRegistry {
        UpdateRegistry::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static UpdateRegistry {
        &GLOBAL
    }

    /// Registers a method under a unique name.
    ///
    /// # Errors
    /// [`Error::Config`] if the name is already taken.
    pub fn register(
        &self,
        name: impl Into<String>,
        spec: BindingSpec,
    ) -> Result<Arc<BindingSpec>, Error> {
        let name = name.into();
        let mut methods = self.methods.write();
        if methods.contains_key(&name) {
            return Err(Error::Config(format!(
                "update method `{name}` is already registered"
            )));
        }
        let spec = Arc::new(spec);
        methods.insert(name.clone(), Arc::clone(&spec));
        tracing::debug!(method = %name, "registered update method");
        Ok(spec)
    }

    pub fn get(&self, name: &str) -> Option<Arc<BindingSpec>> {
        self.methods.read().get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.methods.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.read().is_empty()
    }
}
