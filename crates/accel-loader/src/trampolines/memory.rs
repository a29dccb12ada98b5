use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::wrap_output;

// ── Physical memory ─────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn physical_mem_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        desc: &PhysicalMemDesc,
        memory: &mut PhysicalMemHandle,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.physical_mem.create.clone())?;
        pfn(context, device, desc, memory).check()?;
        wrap_output(&self.factories.physical_mem, memory, &dispatch)
    }

    pub(crate) fn physical_mem_destroy(
        &self,
        context: ContextHandle,
        memory: PhysicalMemHandle,
    ) -> Result<(), ZeResult> {
        let (native_context, dispatch) = self.factories.context.unwrap(context)?;
        let (native_memory, _) = self.factories.physical_mem.unwrap(memory)?;
        let pfn = dispatch.entry(|t| t.physical_mem.destroy.clone())?;
        pfn(native_context, native_memory).check()?;
        self.factories.physical_mem.release(memory)
    }
}

impl LoaderTable for PhysicalMemDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        PhysicalMemDdi {
            create: route!(ctx, physical_mem_create, |
                context: ContextHandle,
                device: DeviceHandle,
                desc: &PhysicalMemDesc,
                memory: &mut PhysicalMemHandle,
            |),
            destroy: route!(ctx, physical_mem_destroy, |context: ContextHandle, memory: PhysicalMemHandle|),
        }
    }
}

// ── Memory ──────────────────────────────────────────────────

impl LoaderContext {
    /// Allocation addresses are not handles and pass through unchanged.
    pub(crate) fn mem_alloc_device(
        &self,
        context: ContextHandle,
        desc: &DeviceMemAllocDesc,
        size: usize,
        alignment: usize,
        device: DeviceHandle,
        ptr: &mut u64,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.mem.alloc_device.clone())?;
        pfn(context, desc, size, alignment, device, ptr).check()
    }

    pub(crate) fn mem_free(&self, context: ContextHandle, ptr: u64) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let pfn = dispatch.entry(|t| t.mem.free.clone())?;
        pfn(context, ptr).check()
    }
}

impl LoaderTable for MemDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        MemDdi {
            alloc_device: route!(ctx, mem_alloc_device, |
                context: ContextHandle,
                desc: &DeviceMemAllocDesc,
                size: usize,
                alignment: usize,
                device: DeviceHandle,
                ptr: &mut u64,
            |),
            free: route!(ctx, mem_free, |context: ContextHandle, ptr: u64|),
        }
    }
}
