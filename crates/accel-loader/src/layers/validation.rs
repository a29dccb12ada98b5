use std::sync::Arc;

use accel_api::{Call, InterceptLayer, Interceptor, ZeResult};
use parking_lot::RwLock;
use tracing::debug;

/// An extra rule set run by the validation layer after the intrinsic
/// argument checks.
pub trait ParamChecker: Send + Sync {
    fn check(&self, call: &Call<'_>) -> Result<(), ZeResult>;
}

impl<F> ParamChecker for F
where
    F: Fn(&Call<'_>) -> Result<(), ZeResult> + Send + Sync,
{
    fn check(&self, call: &Call<'_>) -> Result<(), ZeResult> {
        self(call)
    }
}

/// Parameter validation hook.
///
/// Rejects null required handles, null elements in handle lists, unknown
/// enumeration values and flag bits, and empty required sizes or names,
/// before the call reaches the loader or a driver.
#[derive(Default)]
pub struct Validator {
    checkers: RwLock<Vec<Arc<dyn ParamChecker>>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule set. Checkers run in registration order.
    pub fn add_checker(&self, checker: impl ParamChecker + 'static) {
        self.checkers.write().push(Arc::new(checker));
    }

    pub fn checker_count(&self) -> usize {
        self.checkers.read().len()
    }
}

impl Interceptor for Validator {
    fn prologue(&self, call: &Call<'_>) -> Result<(), ZeResult> {
        if let Err(code) = call.validate() {
            debug!(api = call.name, ?code, "parameter validation failed");
            return Err(code);
        }
        let checkers = self.checkers.read().clone();
        for checker in &checkers {
            if let Err(code) = checker.check(call) {
                debug!(api = call.name, ?code, "parameter checker rejected call");
                return Err(code);
            }
        }
        Ok(())
    }
}

pub type ValidationLayer = InterceptLayer<Validator>;
