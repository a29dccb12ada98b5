use std::sync::Arc;

use accel_api::*;
use accel_core::DispatchBundle;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::{unwrap_all, wrap_output};

// ── Module ──────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn module_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        desc: &ModuleDesc,
        module: &mut ModuleHandle,
        mut build_log: Option<&mut ModuleBuildLogHandle>,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.module.create.clone())?;
        if let Some(log) = build_log.as_deref_mut() {
            *log = ModuleBuildLogHandle::NULL;
        }
        let created = pfn(context, device, desc, module, build_log.as_deref_mut()).check();
        // A failed build still leaves a log for the caller.
        let logged = self.wrap_build_log(build_log, &dispatch);
        created?;
        wrap_output(&self.factories.module, module, &dispatch).and(logged)
    }

    pub(crate) fn module_destroy(&self, module: ModuleHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.module.unwrap(module)?;
        let pfn = dispatch.entry(|t| t.module.destroy.clone())?;
        pfn(native).check()?;
        self.factories.module.release(module)
    }

    /// Dispatched to the driver owning the first module. Linking modules of
    /// different drivers is the driver's to reject.
    pub(crate) fn module_dynamic_link(
        &self,
        modules: &[ModuleHandle],
        mut link_log: Option<&mut ModuleBuildLogHandle>,
    ) -> Result<(), ZeResult> {
        let first = *modules.first().ok_or(ZeResult::ERROR_INVALID_SIZE)?;
        let (_, dispatch) = self.factories.module.unwrap(first)?;
        let pfn = dispatch.entry(|t| t.module.dynamic_link.clone())?;
        let modules = unwrap_all(&self.factories.module, modules)?;
        if let Some(log) = link_log.as_deref_mut() {
            *log = ModuleBuildLogHandle::NULL;
        }
        let linked = pfn(&modules, link_log.as_deref_mut()).check();
        let logged = self.wrap_build_log(link_log, &dispatch);
        linked.and(logged)
    }

    /// Wrap a log the driver wrote, whatever happened to the call that
    /// produced it, so no native log handle reaches the caller.
    fn wrap_build_log(
        &self,
        log: Option<&mut ModuleBuildLogHandle>,
        dispatch: &Arc<DispatchBundle>,
    ) -> Result<(), ZeResult> {
        match log {
            Some(log) if !log.is_null() => wrap_output(&self.factories.module_build_log, log, dispatch),
            _ => Ok(()),
        }
    }

    pub(crate) fn module_get_kernel_names(
        &self,
        module: ModuleHandle,
        count: &mut u32,
        names: Option<&mut [String]>,
    ) -> Result<(), ZeResult> {
        let (module, dispatch) = self.factories.module.unwrap(module)?;
        let pfn = dispatch.entry(|t| t.module.get_kernel_names.clone())?;
        pfn(module, count, names).check()
    }
}

impl LoaderTable for ModuleDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        ModuleDdi {
            create: route!(ctx, module_create, |
                context: ContextHandle,
                device: DeviceHandle,
                desc: &ModuleDesc,
                module: &mut ModuleHandle,
                build_log: Option<&mut ModuleBuildLogHandle>,
            |),
            destroy: route!(ctx, module_destroy, |module: ModuleHandle|),
            dynamic_link: route!(ctx, module_dynamic_link, |
                modules: &[ModuleHandle],
                link_log: Option<&mut ModuleBuildLogHandle>,
            |),
            get_kernel_names: route!(ctx, module_get_kernel_names, |
                module: ModuleHandle,
                count: &mut u32,
                names: Option<&mut [String]>,
            |),
        }
    }
}

// ── Module build log ────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn module_build_log_destroy(&self, log: ModuleBuildLogHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.module_build_log.unwrap(log)?;
        let pfn = dispatch.entry(|t| t.module_build_log.destroy.clone())?;
        pfn(native).check()?;
        self.factories.module_build_log.release(log)
    }

    pub(crate) fn module_build_log_get_string(
        &self,
        log: ModuleBuildLogHandle,
        text: &mut String,
    ) -> Result<(), ZeResult> {
        let (log, dispatch) = self.factories.module_build_log.unwrap(log)?;
        let pfn = dispatch.entry(|t| t.module_build_log.get_string.clone())?;
        pfn(log, text).check()
    }
}

impl LoaderTable for ModuleBuildLogDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        ModuleBuildLogDdi {
            destroy: route!(ctx, module_build_log_destroy, |log: ModuleBuildLogHandle|),
            get_string: route!(ctx, module_build_log_get_string, |log: ModuleBuildLogHandle, text: &mut String|),
        }
    }
}

// ── Kernel ──────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn kernel_create(
        &self,
        module: ModuleHandle,
        desc: &KernelDesc,
        kernel: &mut KernelHandle,
    ) -> Result<(), ZeResult> {
        let (module, dispatch) = self.factories.module.unwrap(module)?;
        let pfn = dispatch.entry(|t| t.kernel.create.clone())?;
        pfn(module, desc, kernel).check()?;
        wrap_output(&self.factories.kernel, kernel, &dispatch)
    }

    pub(crate) fn kernel_destroy(&self, kernel: KernelHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.kernel.unwrap(kernel)?;
        let pfn = dispatch.entry(|t| t.kernel.destroy.clone())?;
        pfn(native).check()?;
        self.factories.kernel.release(kernel)
    }

    /// Image and sampler arguments are rewritten through the auxiliary maps;
    /// values the maps do not know are forwarded untouched.
    pub(crate) fn kernel_set_argument_value(
        &self,
        kernel: KernelHandle,
        index: u32,
        value: ArgValue<'_>,
    ) -> Result<(), ZeResult> {
        let (kernel, dispatch) = self.factories.kernel.unwrap(kernel)?;
        let pfn = dispatch.entry(|t| t.kernel.set_argument_value.clone())?;
        let value = match value {
            ArgValue::Image(image) => ArgValue::Image(self.images.translate(image)),
            ArgValue::Sampler(sampler) => ArgValue::Sampler(self.samplers.translate(sampler)),
            other => other,
        };
        pfn(kernel, index, value).check()
    }

    pub(crate) fn kernel_set_group_size(
        &self,
        kernel: KernelHandle,
        x: u32,
        y: u32,
        z: u32,
    ) -> Result<(), ZeResult> {
        let (kernel, dispatch) = self.factories.kernel.unwrap(kernel)?;
        let pfn = dispatch.entry(|t| t.kernel.set_group_size.clone())?;
        pfn(kernel, x, y, z).check()
    }

    pub(crate) fn kernel_get_name(&self, kernel: KernelHandle, name: &mut String) -> Result<(), ZeResult> {
        let (kernel, dispatch) = self.factories.kernel.unwrap(kernel)?;
        let pfn = dispatch.entry(|t| t.kernel.get_name.clone())?;
        pfn(kernel, name).check()
    }
}

impl LoaderTable for KernelDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        KernelDdi {
            create: route!(ctx, kernel_create, |
                module: ModuleHandle,
                desc: &KernelDesc,
                kernel: &mut KernelHandle,
            |),
            destroy: route!(ctx, kernel_destroy, |kernel: KernelHandle|),
            set_argument_value: route!(ctx, kernel_set_argument_value, |
                kernel: KernelHandle,
                index: u32,
                value: ArgValue<'_>,
            |),
            set_group_size: route!(ctx, kernel_set_group_size, |kernel: KernelHandle, x: u32, y: u32, z: u32|),
            get_name: route!(ctx, kernel_get_name, |kernel: KernelHandle, name: &mut String|),
        }
    }
}
