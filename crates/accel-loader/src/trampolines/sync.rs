use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::{unwrap_all, wrap_output};

// ── Event pool ──────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn event_pool_create(
        &self,
        context: ContextHandle,
        desc: &EventPoolDesc,
        devices: &[DeviceHandle],
        pool: &mut EventPoolHandle,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let pfn = dispatch.entry(|t| t.event_pool.create.clone())?;
        let devices = unwrap_all(&self.factories.device, devices)?;
        pfn(context, desc, &devices, pool).check()?;
        wrap_output(&self.factories.event_pool, pool, &dispatch)
    }

    pub(crate) fn event_pool_destroy(&self, pool: EventPoolHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.event_pool.unwrap(pool)?;
        let pfn = dispatch.entry(|t| t.event_pool.destroy.clone())?;
        pfn(native).check()?;
        self.factories.event_pool.release(pool)
    }
}

impl LoaderTable for EventPoolDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        EventPoolDdi {
            create: route!(ctx, event_pool_create, |
                context: ContextHandle,
                desc: &EventPoolDesc,
                devices: &[DeviceHandle],
                pool: &mut EventPoolHandle,
            |),
            destroy: route!(ctx, event_pool_destroy, |pool: EventPoolHandle|),
        }
    }
}

// ── Event ───────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn event_create(
        &self,
        pool: EventPoolHandle,
        desc: &EventDesc,
        event: &mut EventHandle,
    ) -> Result<(), ZeResult> {
        let (pool, dispatch) = self.factories.event_pool.unwrap(pool)?;
        let pfn = dispatch.entry(|t| t.event.create.clone())?;
        pfn(pool, desc, event).check()?;
        wrap_output(&self.factories.event, event, &dispatch)
    }

    pub(crate) fn event_destroy(&self, event: EventHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.event.unwrap(event)?;
        let pfn = dispatch.entry(|t| t.event.destroy.clone())?;
        pfn(native).check()?;
        self.factories.event.release(event)
    }

    pub(crate) fn event_host_signal(&self, event: EventHandle) -> Result<(), ZeResult> {
        let (event, dispatch) = self.factories.event.unwrap(event)?;
        let pfn = dispatch.entry(|t| t.event.host_signal.clone())?;
        pfn(event).check()
    }

    pub(crate) fn event_host_synchronize(&self, event: EventHandle, timeout: u64) -> Result<(), ZeResult> {
        let (event, dispatch) = self.factories.event.unwrap(event)?;
        let pfn = dispatch.entry(|t| t.event.host_synchronize.clone())?;
        pfn(event, timeout).check()
    }

    pub(crate) fn event_query_status(&self, event: EventHandle) -> Result<(), ZeResult> {
        let (event, dispatch) = self.factories.event.unwrap(event)?;
        let pfn = dispatch.entry(|t| t.event.query_status.clone())?;
        pfn(event).check()
    }

    pub(crate) fn event_host_reset(&self, event: EventHandle) -> Result<(), ZeResult> {
        let (event, dispatch) = self.factories.event.unwrap(event)?;
        let pfn = dispatch.entry(|t| t.event.host_reset.clone())?;
        pfn(event).check()
    }
}

impl LoaderTable for EventDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        EventDdi {
            create: route!(ctx, event_create, |
                pool: EventPoolHandle,
                desc: &EventDesc,
                event: &mut EventHandle,
            |),
            destroy: route!(ctx, event_destroy, |event: EventHandle|),
            host_signal: route!(ctx, event_host_signal, |event: EventHandle|),
            host_synchronize: route!(ctx, event_host_synchronize, |event: EventHandle, timeout: u64|),
            query_status: route!(ctx, event_query_status, |event: EventHandle|),
            host_reset: route!(ctx, event_host_reset, |event: EventHandle|),
        }
    }
}
