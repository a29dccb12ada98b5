use std::sync::Arc;

use accel_api::{DdiTable, DdiTables, ZeResult};
use parking_lot::RwLock;

/// The set of tables a driver filled in.
///
/// Loader handles keep an `Arc` to the bundle of the driver that produced
/// them; the bundle's address is part of the handle identity.
pub struct DispatchBundle {
    driver: String,
    tables: RwLock<DdiTables>,
}

impl DispatchBundle {
    pub fn new(driver: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            tables: RwLock::new(DdiTables::default()),
        }
    }

    /// Name of the driver that owns these tables.
    pub fn driver_name(&self) -> &str {
        &self.driver
    }

    /// Clone one entry out of the bundle.
    ///
    /// An unset entry reports `ERROR_UNINITIALIZED`: the driver either does
    /// not implement it or its table was never populated.
    pub fn entry<F: ?Sized>(
        &self,
        pick: impl FnOnce(&DdiTables) -> Option<Arc<F>>,
    ) -> Result<Arc<F>, ZeResult> {
        pick(&*self.tables.read()).ok_or(ZeResult::ERROR_UNINITIALIZED)
    }

    /// Replace one family's table.
    pub fn install<T: DdiTable>(&self, table: T) {
        *T::select_mut(&mut *self.tables.write()) = table;
    }

    /// Copy of one family's table.
    pub fn table<T: DdiTable>(&self) -> T {
        T::select(&*self.tables.read()).clone()
    }

    pub fn populated(&self) -> usize {
        self.tables.read().populated()
    }
}

impl std::fmt::Debug for DispatchBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchBundle")
            .field("driver", &self.driver)
            .field("populated", &self.populated())
            .finish()
    }
}
