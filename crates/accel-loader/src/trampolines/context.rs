use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::{unwrap_all, wrap_output};

impl LoaderContext {
    pub(crate) fn context_create(
        &self,
        driver: DriverHandle,
        desc: &ContextDesc,
        context: &mut ContextHandle,
    ) -> Result<(), ZeResult> {
        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.context.create.clone())?;
        pfn(driver, desc, context).check()?;
        wrap_output(&self.factories.context, context, &dispatch)
    }

    pub(crate) fn context_create_ex(
        &self,
        driver: DriverHandle,
        desc: &ContextDesc,
        devices: &[DeviceHandle],
        context: &mut ContextHandle,
    ) -> Result<(), ZeResult> {
        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.context.create_ex.clone())?;
        let devices = unwrap_all(&self.factories.device, devices)?;
        pfn(driver, desc, &devices, context).check()?;
        wrap_output(&self.factories.context, context, &dispatch)
    }

    pub(crate) fn context_destroy(&self, context: ContextHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.context.unwrap(context)?;
        let pfn = dispatch.entry(|t| t.context.destroy.clone())?;
        pfn(native).check()?;
        self.factories.context.release(context)
    }

    pub(crate) fn context_get_status(&self, context: ContextHandle) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let pfn = dispatch.entry(|t| t.context.get_status.clone())?;
        pfn(context).check()
    }

    pub(crate) fn context_make_memory_resident(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        ptr: u64,
        size: usize,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.context.make_memory_resident.clone())?;
        pfn(context, device, ptr, size).check()
    }
}

impl LoaderTable for ContextDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        ContextDdi {
            create: route!(ctx, context_create, |
                driver: DriverHandle,
                desc: &ContextDesc,
                context: &mut ContextHandle,
            |),
            create_ex: route!(ctx, context_create_ex, |
                driver: DriverHandle,
                desc: &ContextDesc,
                devices: &[DeviceHandle],
                context: &mut ContextHandle,
            |),
            destroy: route!(ctx, context_destroy, |context: ContextHandle|),
            get_status: route!(ctx, context_get_status, |context: ContextHandle|),
            make_memory_resident: route!(ctx, context_make_memory_resident, |
                context: ContextHandle,
                device: DeviceHandle,
                ptr: u64,
                size: usize,
            |),
        }
    }
}
