//! Image and sampler trampolines. Both families are also recorded in the
//! auxiliary maps so kernel arguments carrying them can be rewritten.

use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::LoaderContext;
use crate::fanout::wrap_output;

// ── Image ───────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn image_get_properties(
        &self,
        device: DeviceHandle,
        desc: &ImageDesc,
        properties: &mut ImageProperties,
    ) -> Result<(), ZeResult> {
        let (device, dispatch) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.image.get_properties.clone())?;
        pfn(device, desc, properties).check()
    }

    pub(crate) fn image_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        desc: &ImageDesc,
        image: &mut ImageHandle,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.image.create.clone())?;
        pfn(context, device, desc, image).check()?;
        let native = *image;
        wrap_output(&self.factories.image, image, &dispatch)?;
        self.images.insert(*image, native);
        Ok(())
    }

    pub(crate) fn image_destroy(&self, image: ImageHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.image.unwrap(image)?;
        let pfn = dispatch.entry(|t| t.image.destroy.clone())?;
        pfn(native).check()?;
        self.images.remove(image);
        self.factories.image.release(image)
    }
}

impl LoaderTable for ImageDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        ImageDdi {
            get_properties: route!(ctx, image_get_properties, |
                device: DeviceHandle,
                desc: &ImageDesc,
                properties: &mut ImageProperties,
            |),
            create: route!(ctx, image_create, |
                context: ContextHandle,
                device: DeviceHandle,
                desc: &ImageDesc,
                image: &mut ImageHandle,
            |),
            destroy: route!(ctx, image_destroy, |image: ImageHandle|),
        }
    }
}

// ── Sampler ─────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn sampler_create(
        &self,
        context: ContextHandle,
        device: DeviceHandle,
        desc: &SamplerDesc,
        sampler: &mut SamplerHandle,
    ) -> Result<(), ZeResult> {
        let (context, dispatch) = self.factories.context.unwrap(context)?;
        let (device, _) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.sampler.create.clone())?;
        pfn(context, device, desc, sampler).check()?;
        let native = *sampler;
        wrap_output(&self.factories.sampler, sampler, &dispatch)?;
        self.samplers.insert(*sampler, native);
        Ok(())
    }

    pub(crate) fn sampler_destroy(&self, sampler: SamplerHandle) -> Result<(), ZeResult> {
        let (native, dispatch) = self.factories.sampler.unwrap(sampler)?;
        let pfn = dispatch.entry(|t| t.sampler.destroy.clone())?;
        pfn(native).check()?;
        self.samplers.remove(sampler);
        self.factories.sampler.release(sampler)
    }
}

impl LoaderTable for SamplerDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        SamplerDdi {
            create: route!(ctx, sampler_create, |
                context: ContextHandle,
                device: DeviceHandle,
                desc: &SamplerDesc,
                sampler: &mut SamplerHandle,
            |),
            destroy: route!(ctx, sampler_destroy, |sampler: SamplerHandle|),
        }
    }
}
