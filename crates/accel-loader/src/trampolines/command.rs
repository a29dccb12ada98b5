//! Command queue, command list and fence trampolines.

use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::{unwrap_all, unwrap_optional, wrap_output};

// ── Command queue ───────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn command_queue_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        desc: &CommandQueueDesc,
        queue: &mut CommandQueueHandle,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.command_queue.create.clone())?;
        pfn(context, device, desc, queue).check()?;
        wrap_output(&self.factories.command_queue, queue, &dispatch)
    }

    pub(crate) fn command_queue_destroy(&self, queue: CommandQueueHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.command_queue.unwrap(queue)?;
        let pfn = dispatch.entry(|t| t.command_queue.destroy.clone())?;
        pfn(native).check()?;
        self.factories.command_queue.release(queue)
    }

    pub(crate) fn command_queue_execute_command_lists(
        &self,
        queue: CommandQueueHandle,
        lists: &[CommandListHandle],
        fence: Option<FenceHandle>,
    ) -> Result<(), ZeResult> {
        let (queue, dispatch) = self.factories.command_queue.unwrap(queue)?;
        let pfn = dispatch.entry(|t| t.command_queue.execute_command_lists.clone())?;
        let lists = unwrap_all(&self.factories.command_list, lists)?;
        let fence = unwrap_optional(&self.factories.fence, fence)?;
        pfn(queue, &lists, fence).check()
    }

    pub(crate) fn command_queue_synchronize(
        &self,
        queue: CommandQueueHandle,
        timeout: u64,
    ) -> Result<(), ZeResult> {
        let (queue, dispatch) = self.factories.command_queue.unwrap(queue)?;
        let pfn = dispatch.entry(|t| t.command_queue.synchronize.clone())?;
        pfn(queue, timeout).check()
    }
}

impl LoaderTable for CommandQueueDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        CommandQueueDdi {
            create: route!(ctx, command_queue_create, |
                context: ContextHandle,
                device: DeviceHandle,
                desc: &CommandQueueDesc,
                queue: &mut CommandQueueHandle,
            |),
            destroy: route!(ctx, command_queue_destroy, |queue: CommandQueueHandle|),
            execute_command_lists: route!(ctx, command_queue_execute_command_lists, |
                queue: CommandQueueHandle,
                lists: &[CommandListHandle],
                fence: Option<FenceHandle>,
            |),
            synchronize: route!(ctx, command_queue_synchronize, |queue: CommandQueueHandle, timeout: u64|),
        }
    }
}

// ── Command list ────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn command_list_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        desc: &CommandListDesc,
        list: &mut CommandListHandle,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.command_list.create.clone())?;
        pfn(context, device, desc, list).check()?;
        wrap_output(&self.factories.command_list, list, &dispatch)
    }

    pub(crate) fn command_list_create_immediate(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        desc: &CommandQueueDesc,
        list: &mut CommandListHandle,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.command_list.create_immediate.clone())?;
        pfn(context, device, desc, list).check()?;
        wrap_output(&self.factories.command_list, list, &dispatch)
    }

    pub(crate) fn command_list_destroy(&self, list: CommandListHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.command_list.unwrap(list)?;
        let pfn = dispatch.entry(|t| t.command_list.destroy.clone())?;
        pfn(native).check()?;
        self.factories.command_list.release(list)
    }

    pub(crate) fn command_list_close(&self, list: CommandListHandle) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let pfn = dispatch.entry(|t| t.command_list.close.clone())?;
        pfn(list).check()
    }

    pub(crate) fn command_list_reset(&self, list: CommandListHandle) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let pfn = dispatch.entry(|t| t.command_list.reset.clone())?;
        pfn(list).check()
    }

    pub(crate) fn command_list_append_barrier(
        &self,
        list: CommandListHandle,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let pfn = dispatch.entry(|t| t.command_list.append_barrier.clone())?;
        let signal = unwrap_optional(&self.factories.event, signal)?;
        let wait = unwrap_all(&self.factories.event, wait)?;
        pfn(list, signal, &wait).check()
    }

    pub(crate) fn command_list_append_memory_copy(
        &self,
        list: CommandListHandle,
        dst: u64,
        src: u64,
        size: usize,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let pfn = dispatch.entry(|t| t.command_list.append_memory_copy.clone())?;
        let signal = unwrap_optional(&self.factories.event, signal)?;
        let wait = unwrap_all(&self.factories.event, wait)?;
        pfn(list, dst, src, size, signal, &wait).check()
    }

    pub(crate) fn command_list_append_image_copy(
        &self,
        list: CommandListHandle,
        dst: ImageHandle,
        src: ImageHandle,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let pfn = dispatch.entry(|t| t.command_list.append_image_copy.clone())?;
        let (dst, _) = self.factories.image.unwrap(dst)?;
        let (src, _) = self.factories.image.unwrap(src)?;
        let signal = unwrap_optional(&self.factories.event, signal)?;
        let wait = unwrap_all(&self.factories.event, wait)?;
        pfn(list, dst, src, signal, &wait).check()
    }

    pub(crate) fn command_list_append_signal_event(
        &self,
        list: CommandListHandle,
        event: EventHandle,
    ) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let (event, _) = self.factories.event.unwrap(event)?;
        let pfn = dispatch.entry(|t| t.command_list.append_signal_event.clone())?;
        pfn(list, event).check()
    }

    pub(crate) fn command_list_append_wait_on_events(
        &self,
        list: CommandListHandle,
        events: &[EventHandle],
    ) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let pfn = dispatch.entry(|t| t.command_list.append_wait_on_events.clone())?;
        let events = unwrap_all(&self.factories.event, events)?;
        pfn(list, &events).check()
    }

    pub(crate) fn command_list_append_launch_kernel(
        &self,
        list: CommandListHandle,
        kernel: KernelHandle,
        groups: &GroupCount,
        signal: Option<EventHandle>,
        wait: &[EventHandle],
    ) -> Result<(), ZeResult> {
        let (list, dispatch) = self.factories.command_list.unwrap(list)?;
        let (kernel, _) = self.factories.kernel.unwrap(kernel)?;
        let pfn = dispatch.entry(|t| t.command_list.append_launch_kernel.clone())?;
        let signal = unwrap_optional(&self.factories.event, signal)?;
        let wait = unwrap_all(&self.factories.event, wait)?;
        pfn(list, kernel, groups, signal, &wait).check()
    }
}

impl LoaderTable for CommandListDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        CommandListDdi {
            create: route!(ctx, command_list_create, |
                context: ContextHandle,
                device: DeviceHandle,
                desc: &CommandListDesc,
                list: &mut CommandListHandle,
            |),
            create_immediate: route!(ctx, command_list_create_immediate, |
                context: ContextHandle,
                device: DeviceHandle,
                desc: &CommandQueueDesc,
                list: &mut CommandListHandle,
            |),
            destroy: route!(ctx, command_list_destroy, |list: CommandListHandle|),
            close: route!(ctx, command_list_close, |list: CommandListHandle|),
            reset: route!(ctx, command_list_reset, |list: CommandListHandle|),
            append_barrier: route!(ctx, command_list_append_barrier, |
                list: CommandListHandle,
                signal: Option<EventHandle>,
                wait: &[EventHandle],
            |),
            append_memory_copy: route!(ctx, command_list_append_memory_copy, |
                list: CommandListHandle,
                dst: u64,
                src: u64,
                size: usize,
                signal: Option<EventHandle>,
                wait: &[EventHandle],
            |),
            append_image_copy: route!(ctx, command_list_append_image_copy, |
                list: CommandListHandle,
                dst: ImageHandle,
                src: ImageHandle,
                signal: Option<EventHandle>,
                wait: &[EventHandle],
            |),
            append_signal_event: route!(ctx, command_list_append_signal_event, |
                list: CommandListHandle,
                event: EventHandle,
            |),
            append_wait_on_events: route!(ctx, command_list_append_wait_on_events, |
                list: CommandListHandle,
                events: &[EventHandle],
            |),
            append_launch_kernel: route!(ctx, command_list_append_launch_kernel, |
                list: CommandListHandle,
                kernel: KernelHandle,
                groups: &GroupCount,
                signal: Option<EventHandle>,
                wait: &[EventHandle],
            |),
        }
    }
}

// ── Fence ───────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn fence_create(
        &self,
        queue: CommandQueueHandle,
        desc: &FenceDesc,
        fence: &mut FenceHandle,
    ) -> Result<(), ZeResult> {
        let (queue, dispatch) = self.factories.command_queue.unwrap(queue)?;
        let pfn = dispatch.entry(|t| t.fence.create.clone())?;
        pfn(queue, desc, fence).check()?;
        wrap_output(&self.factories.fence, fence, &dispatch)
    }

    pub(crate) fn fence_destroy(&self, fence: FenceHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.fence.unwrap(fence)?;
        let pfn = dispatch.entry(|t| t.fence.destroy.clone())?;
        pfn(native).check()?;
        self.factories.fence.release(fence)
    }

    pub(crate) fn fence_host_synchronize(&self, fence: FenceHandle, timeout: u64) -> Result<(), ZeResult> {
        let (fence, dispatch) = self.factories.fence.unwrap(fence)?;
        let pfn = dispatch.entry(|t| t.fence.host_synchronize.clone())?;
        pfn(fence, timeout).check()
    }

    pub(crate) fn fence_query_status(&self, fence: FenceHandle) -> Result<(), ZeResult> {
        let (fence, dispatch) = self.factories.fence.unwrap(fence)?;
        let pfn = dispatch.entry(|t| t.fence.query_status.clone())?;
        pfn(fence).check()
    }

    pub(crate) fn fence_reset(&self, fence: FenceHandle) -> Result<(), ZeResult> {
        let (fence, dispatch) = self.factories.fence.unwrap(fence)?;
        let pfn = dispatch.entry(|t| t.fence.reset.clone())?;
        pfn(fence).check()
    }
}

impl LoaderTable for FenceDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        FenceDdi {
            create: route!(ctx, fence_create, |
                queue: CommandQueueHandle,
                desc: &FenceDesc,
                fence: &mut FenceHandle,
            |),
            destroy: route!(ctx, fence_destroy, |fence: FenceHandle|),
            host_synchronize: route!(ctx, fence_host_synchronize, |fence: FenceHandle, timeout: u64|),
            query_status: route!(ctx, fence_query_status, |fence: FenceHandle|),
            reset: route!(ctx, fence_reset, |fence: FenceHandle|),
        }
    }
}
