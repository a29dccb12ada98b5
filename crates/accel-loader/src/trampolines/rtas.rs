//! Ray-tracing acceleration structure trampolines.

use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::wrap_output;

// ── Builder ─────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn rtas_builder_create(
        &self,
        driver: DriverHandle,
        desc: &RtasBuilderDesc,
        builder: &mut RtasBuilderHandle,
    ) -> Result<(), ZeResult> {
        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.rtas_builder.create.clone())?;
        pfn(driver, desc, builder).check()?;
        wrap_output(&self.factories.rtas_builder, builder, &dispatch)
    }

    pub(crate) fn rtas_builder_get_build_properties(
        &self,
        builder: RtasBuilderHandle,
        properties: &mut RtasBuilderBuildProperties,
    ) -> Result<(), ZeResult> {
        let (builder, dispatch) = self.factories.rtas_builder.unwrap(builder)?;
        let pfn = dispatch.entry(|t| t.rtas_builder.get_build_properties.clone())?;
        pfn(builder, properties).check()
    }

    pub(crate) fn rtas_builder_destroy(&self, builder: RtasBuilderHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.rtas_builder.unwrap(builder)?;
        let pfn = dispatch.entry(|t| t.rtas_builder.destroy.clone())?;
        pfn(native).check()?;
        self.factories.rtas_builder.release(builder)
    }
}

impl LoaderTable for RtasBuilderDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        RtasBuilderDdi {
            create: route!(ctx, rtas_builder_create, |
                driver: DriverHandle,
                desc: &RtasBuilderDesc,
                builder: &mut RtasBuilderHandle,
            |),
            get_build_properties: route!(ctx, rtas_builder_get_build_properties, |
                builder: RtasBuilderHandle,
                properties: &mut RtasBuilderBuildProperties,
            |),
            destroy: route!(ctx, rtas_builder_destroy, |builder: RtasBuilderHandle|),
        }
    }
}

// ── Parallel operation ──────────────────────────────────────

impl LoaderContext {
    pub(crate) fn rtas_parallel_operation_create(
        &self,
        driver: DriverHandle,
        operation: &mut RtasParallelOperationHandle,
    ) -> Result<(), ZeResult> {
        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.rtas_parallel_operation.create.clone())?;
        pfn(driver, operation).check()?;
        wrap_output(&self.factories.rtas_parallel_operation, operation, &dispatch)
    }

    pub(crate) fn rtas_parallel_operation_join(
        &self,
        operation: RtasParallelOperationHandle,
    ) -> Result<(), ZeResult> {
        let (operation, dispatch) = self.factories.rtas_parallel_operation.unwrap(operation)?;
        let pfn = dispatch.entry(|t| t.rtas_parallel_operation.join.clone())?;
        pfn(operation).check()
    }

    pub(crate) fn rtas_parallel_operation_destroy(
        &self,
        operation: RtasParallelOperationHandle,
    ) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.rtas_parallel_operation.unwrap(operation)?;
        let pfn = dispatch.entry(|t| t.rtas_parallel_operation.destroy.clone())?;
        pfn(native).check()?;
        self.factories.rtas_parallel_operation.release(operation)
    }
}

impl LoaderTable for RtasParallelOperationDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        RtasParallelOperationDdi {
            create: route!(ctx, rtas_parallel_operation_create, |
                driver: DriverHandle,
                operation: &mut RtasParallelOperationHandle,
            |),
            join: route!(ctx, rtas_parallel_operation_join, |operation: RtasParallelOperationHandle|),
            destroy: route!(ctx, rtas_parallel_operation_destroy, |operation: RtasParallelOperationHandle|),
        }
    }
}
