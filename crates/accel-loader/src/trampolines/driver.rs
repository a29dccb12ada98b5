//! Global, driver and device trampolines.

use std::sync::Arc;

use accel_api::*;

use super::route;
use crate::builder::LoaderTable;
use crate::context::{DriverDescriptor, LoaderContext};
use crate::fanout::{enumerate_one, fan_out, wrap_output};

// ── Global ──────────────────────────────────────────────────

impl LoaderTable for GlobalDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        GlobalDdi {
            init: route!(ctx, init, |flags: InitFlags|),
        }
    }
}

// ── Driver ──────────────────────────────────────────────────

impl LoaderContext {
    pub(crate) fn driver_get(
        &self,
        count: &mut u32,
        drivers: Option<&mut [DriverHandle]>,
    ) -> Result<(), ZeResult> {
        let ready = self.ready_drivers();
        fan_out(
            &ready,
            count,
            drivers,
            &self.factories.driver,
            |drv, n, out| match drv.dispatch.entry(|t| t.driver.get.clone()) {
                Ok(get) => get(n, out),
                Err(code) => code,
            },
            |drv| Arc::clone(&drv.dispatch),
        )
    }

    pub(crate) fn driver_get_api_version(
        &self,
        driver: DriverHandle,
        version: &mut ApiVersion,
    ) -> Result<(), ZeResult> {
        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.driver.get_api_version.clone())?;
        pfn(driver, version).check()
    }

    pub(crate) fn driver_get_properties(
        &self,
        driver: DriverHandle,
        properties: &mut DriverProperties,
    ) -> Result<(), ZeResult> {
        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.driver.get_properties.clone())?;
        pfn(driver, properties).check()
    }

    pub(crate) fn driver_get_extension_properties(
        &self,
        driver: DriverHandle,
        count: &mut u32,
        extensions: Option<&mut [ExtensionProperties]>,
    ) -> Result<(), ZeResult> {
        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.driver.get_extension_properties.clone())?;
        pfn(driver, count, extensions).check()
    }

    /// Every native driver instance of every ready driver module, paired with
    /// its owner. Used when a child enumeration is asked for without a
    /// parent driver handle.
    pub(crate) fn native_driver_instances(&self) -> Result<Vec<(&DriverDescriptor, DriverHandle)>, ZeResult> {
        let mut instances = Vec::new();
        for drv in self.ready_drivers() {
            let get = drv.dispatch.entry(|t| t.driver.get.clone())?;
            let mut count = 0u32;
            get(&mut count, None).check()?;
            if count == 0 {
                continue;
            }
            let mut handles = Vec::new();
            handles
                .try_reserve_exact(count as usize)
                .map_err(|_| ZeResult::ERROR_OUT_OF_HOST_MEMORY)?;
            handles.resize(count as usize, DriverHandle::NULL);
            get(&mut count, Some(handles.as_mut_slice())).check()?;
            handles.truncate(count as usize);
            instances.extend(handles.into_iter().map(|h| (drv, h)));
        }
        Ok(instances)
    }
}

impl LoaderTable for DriverDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        DriverDdi {
            get: route!(ctx, driver_get, |count: &mut u32, drivers: Option<&mut [DriverHandle]>|),
            get_api_version: route!(ctx, driver_get_api_version, |driver: DriverHandle, version: &mut ApiVersion|),
            get_properties: route!(ctx, driver_get_properties, |driver: DriverHandle, properties: &mut DriverProperties|),
            get_extension_properties: route!(ctx, driver_get_extension_properties, |
                driver: DriverHandle,
                count: &mut u32,
                extensions: Option<&mut [ExtensionProperties]>,
            |),
        }
    }
}

// ── Device ──────────────────────────────────────────────────

impl LoaderContext {
    /// With a null driver handle, enumerates the devices of every driver
    /// instance of every ready driver.
    pub(crate) fn device_get(
        &self,
        driver: DriverHandle,
        count: &mut u32,
        devices: Option<&mut [DeviceHandle]>,
    ) -> Result<(), ZeResult> {
        if driver.is_null() {
            let instances = self.native_driver_instances()?;
            return fan_out(
                &instances,
                count,
                devices,
                &self.factories.device,
                |(drv, native), n, out| match drv.dispatch.entry(|t| t.device.get.clone()) {
                    Ok(get) => get(*native, n, out),
                    Err(code) => code,
                },
                |(drv, _)| Arc::clone(&drv.dispatch),
            );
        }

        let (driver, dispatch) = self.factories.driver.unwrap(driver)?;
        let pfn = dispatch.entry(|t| t.device.get.clone())?;
        enumerate_one(count, devices, &self.factories.device, &dispatch, |n, out| {
            pfn(driver, n, out)
        })
    }

    pub(crate) fn device_get_sub_devices(
        &self,
        device: DeviceHandle,
        count: &mut u32,
        sub_devices: Option<&mut [DeviceHandle]>,
    ) -> Result<(), ZeResult> {
        let (device, dispatch) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.device.get_sub_devices.clone())?;
        enumerate_one(count, sub_devices, &self.factories.device, &dispatch, |n, out| {
            pfn(device, n, out)
        })
    }

    pub(crate) fn device_get_properties(
        &self,
        device: DeviceHandle,
        properties: &mut DeviceProperties,
    ) -> Result<(), ZeResult> {
        let (device, dispatch) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.device.get_properties.clone())?;
        pfn(device, properties).check()
    }

    pub(crate) fn device_can_access_peer(
        &self,
        device: DeviceHandle,
        peer: DeviceHandle,
        value: &mut bool,
    ) -> Result<(), ZeResult> {
        let (device, dispatch) = self.factories.device.unwrap(device)?;
        let (peer, _) = self.factories.device.unwrap(peer)?;
        let pfn = dispatch.entry(|t| t.device.can_access_peer.clone())?;
        pfn(device, peer, value).check()
    }

    pub(crate) fn device_get_status(&self, device: DeviceHandle) -> Result<(), ZeResult> {
        let (device, dispatch) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.device.get_status.clone())?;
        pfn(device).check()
    }

    pub(crate) fn device_get_fabric_vertex(
        &self,
        device: DeviceHandle,
        vertex: &mut FabricVertexHandle,
    ) -> Result<(), ZeResult> {
        let (device, dispatch) = self.factories.device.unwrap(device)?;
        let pfn = dispatch.entry(|t| t.device.get_fabric_vertex.clone())?;
        pfn(device, vertex).check()?;
        wrap_output(&self.factories.fabric_vertex, vertex, &dispatch)
    }
}

impl LoaderTable for DeviceDdi {
    fn loader_table(ctx: &Arc<LoaderContext>) -> Self {
        DeviceDdi {
            get: route!(ctx, device_get, |
                driver: DriverHandle,
                count: &mut u32,
                devices: Option<&mut [DeviceHandle]>,
            |),
            get_sub_devices: route!(ctx, device_get_sub_devices, |
                device: DeviceHandle,
                count: &mut u32,
                sub_devices: Option<&mut [DeviceHandle]>,
            |),
            get_properties: route!(ctx, device_get_properties, |device: DeviceHandle, properties: &mut DeviceProperties|),
            can_access_peer: route!(ctx, device_can_access_peer, |device: DeviceHandle, peer: DeviceHandle, value: &mut bool|),
            get_status: route!(ctx, device_get_status, |device: DeviceHandle|),
            get_fabric_vertex: route!(ctx, device_get_fabric_vertex, |device: DeviceHandle, vertex: &mut FabricVertexHandle|),
        }
    }
}
