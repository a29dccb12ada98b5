//! Dispatch table construction.
//!
//! For each family the loader (1) asks every usable driver for its table and
//! stores it in that driver's bundle, (2) selects either the only driver's
//! table (passthrough) or the loader trampolines, then (3) lets the
//! validation layer and then the tracing layer wrap the selection.

use std::sync::Arc;

use accel_api::*;
use tracing::{debug, warn};

use crate::context::{Loader, LoaderContext};

/// A table family the loader can serve with trampolines.
pub trait LoaderTable: DdiTable {
    /// Table whose entries route through `context`.
    fn loader_table(context: &Arc<LoaderContext>) -> Self;
}

impl Loader {
    /// Build the application-facing table of family `T` for `version`.
    ///
    /// Errors: `ERROR_UNINITIALIZED` when no driver is registered or none
    /// could supply the table, `ERROR_UNSUPPORTED_VERSION` when `version` is
    /// newer than the loader's, or whatever a layer reports.
    pub fn build_table<T: LoaderTable>(&self, version: ApiVersion) -> Result<T, ZeResult> {
        let ctx = &self.context;
        if ctx.drivers.is_empty() {
            return Err(ZeResult::ERROR_UNINITIALIZED);
        }
        if version > ctx.version {
            return Err(ZeResult::ERROR_UNSUPPORTED_VERSION);
        }

        let mut populated = 0usize;
        for drv in ctx.drivers.iter().filter(|d| !d.is_failed()) {
            match T::request(drv.provider.as_ref(), version, &T::default()) {
                Ok(table) => {
                    debug!(
                        driver = %drv.name,
                        family = %T::FAMILY,
                        entries = table.entry_count(),
                        "driver table populated"
                    );
                    drv.dispatch.install(table);
                    populated += 1;
                }
                Err(code) => {
                    warn!(driver = %drv.name, family = %T::FAMILY, ?code, "driver could not supply table");
                    drv.mark_failed(code);
                }
            }
        }
        if populated == 0 {
            return Err(ZeResult::ERROR_UNINITIALIZED);
        }

        let selected = if ctx.passthrough() {
            ctx.drivers[0].dispatch.table::<T>()
        } else {
            T::loader_table(ctx)
        };

        ctx.layers().into_iter().try_fold(selected, |prior, layer| {
            T::request(layer, version, &prior).map_err(|code| {
                warn!(layer = layer.name(), family = %T::FAMILY, ?code, "layer rejected table");
                code
            })
        })
    }

    /// Table request in the shape of the C entry point: fills `table` and
    /// reports the outcome as a status code. A missing `table` is
    /// `ERROR_INVALID_NULL_POINTER`.
    pub fn get_proc_addr_table<T: LoaderTable>(
        &self,
        version: ApiVersion,
        table: Option<&mut T>,
    ) -> ZeResult {
        if self.context.drivers.is_empty() {
            return ZeResult::ERROR_UNINITIALIZED;
        }
        let Some(table) = table else {
            return ZeResult::ERROR_INVALID_NULL_POINTER;
        };
        match self.build_table::<T>(version) {
            Ok(built) => {
                *table = built;
                ZeResult::SUCCESS
            }
            Err(code) => code,
        }
    }

    /// Every family's table at once.
    pub fn build_all_tables(&self, version: ApiVersion) -> Result<DdiTables, ZeResult> {
        Ok(DdiTables {
            global: self.build_table(version)?,
            driver: self.build_table(version)?,
            device: self.build_table(version)?,
            context: self.build_table(version)?,
            command_queue: self.build_table(version)?,
            command_list: self.build_table(version)?,
            fence: self.build_table(version)?,
            event_pool: self.build_table(version)?,
            event: self.build_table(version)?,
            image: self.build_table(version)?,
            module: self.build_table(version)?,
            module_build_log: self.build_table(version)?,
            kernel: self.build_table(version)?,
            sampler: self.build_table(version)?,
            physical_mem: self.build_table(version)?,
            mem: self.build_table(version)?,
            fabric_vertex: self.build_table(version)?,
            fabric_edge: self.build_table(version)?,
            rtas_builder: self.build_table(version)?,
            rtas_parallel_operation: self.build_table(version)?,
        })
    }
}

