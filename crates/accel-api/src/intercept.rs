//! Prologue/epilogue interception of dispatch-table entries.
//!
//! Every table type can produce an intercepted copy of itself
//! (`intercept`), where each populated entry first runs the hook's
//! prologue, then calls the entry it wraps, then runs the epilogue. Layers
//! such as parameter validation and call tracing are built on this.

use std::fmt;
use std::sync::Arc;

use crate::result::ZeResult;
use crate::types::ApiVersion;

/// A call argument as seen by an interceptor.
///
/// `validate` performs the argument's intrinsic checks: non-null handles,
/// known enumeration values, non-empty required sizes. Output arguments
/// (`&mut T`) are never validated.
pub trait Param: fmt::Debug {
    fn validate(&self) -> Result<(), ZeResult> {
        Ok(())
    }
}

impl<T: Param + ?Sized> Param for &T {
    fn validate(&self) -> Result<(), ZeResult> {
        (**self).validate()
    }
}

impl<T: fmt::Debug + ?Sized> Param for &mut T {}

impl<T: Param> Param for Option<T> {
    fn validate(&self) -> Result<(), ZeResult> {
        match self {
            Some(value) => value.validate(),
            None => Ok(()),
        }
    }
}

impl<T: Param> Param for [T] {
    fn validate(&self) -> Result<(), ZeResult> {
        self.iter().try_for_each(Param::validate)
    }
}

impl Param for u32 {}
impl Param for u64 {}
impl Param for usize {}
impl Param for bool {}

/// One in-flight call: the entry point name and its named arguments.
pub struct Call<'a> {
    pub name: &'static str,
    pub params: &'a [(&'static str, &'a dyn Param)],
}

impl<'a> Call<'a> {
    pub fn new(name: &'static str, params: &'a [(&'static str, &'a dyn Param)]) -> Self {
        Self { name, params }
    }

    /// Run every argument's intrinsic validation, stopping at the first
    /// failure.
    pub fn validate(&self) -> Result<(), ZeResult> {
        self.params.iter().try_for_each(|(_, param)| param.validate())
    }
}

impl fmt::Display for Call<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}={value:?}")?;
        }
        f.write_str(")")
    }
}

/// Hook pair run around every intercepted entry.
pub trait Interceptor: Send + Sync + 'static {
    /// Runs before the wrapped entry. An `Err` short-circuits the call and
    /// becomes its result; the wrapped entry is not invoked.
    fn prologue(&self, call: &Call<'_>) -> Result<(), ZeResult>;

    /// Runs after the wrapped entry (or after a rejected prologue) and may
    /// rewrite the result.
    fn epilogue(&self, name: &'static str, result: ZeResult) -> ZeResult {
        let _ = name;
        result
    }
}

/// A layer component: answers every table request by wrapping the prior
/// table with `hook`.
pub struct InterceptLayer<I> {
    name: String,
    version: ApiVersion,
    hook: Arc<I>,
}

impl<I: Interceptor> InterceptLayer<I> {
    pub fn new(name: impl Into<String>, hook: I) -> Self {
        Self {
            name: name.into(),
            version: ApiVersion::CURRENT,
            hook: Arc::new(hook),
        }
    }

    pub fn hook(&self) -> &Arc<I> {
        &self.hook
    }

    pub fn layer_name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> ApiVersion {
        self.version
    }
}
