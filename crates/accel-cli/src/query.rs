//! `accel info`: walk drivers and devices through the application-facing
//! tables.

use std::sync::Arc;

use accel_api::*;
use accel_loader::{ComponentKind, Loader};
use serde::Serialize;

/// A table entry, or an error naming the missing API.
pub fn entry<'a, F: ?Sized>(entry: &'a Option<Arc<F>>, api: &str) -> anyhow::Result<&'a F> {
    entry
        .as_deref()
        .ok_or_else(|| anyhow::anyhow!("{} is not available", api))
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub loader_version: String,
    pub api_version: String,
    pub platform: &'static str,
    pub passthrough: bool,
    pub components: Vec<ComponentInfo>,
    pub drivers: Vec<DriverInfo>,
}

#[derive(Debug, Serialize)]
pub struct ComponentInfo {
    pub kind: String,
    pub name: String,
    pub api_version: String,
}

#[derive(Debug, Serialize)]
pub struct DriverInfo {
    pub api_version: String,
    pub driver_version: u32,
    pub extensions: Vec<String>,
    pub devices: Vec<DeviceInfo>,
}

#[derive(Debug, Serialize)]
pub struct DeviceInfo {
    pub name: String,
    pub device_type: String,
    pub vendor_id: u32,
    pub device_id: u32,
    pub sub_devices: u32,
    pub max_mem_alloc_size: u64,
}

/// Run a two-phase query to completion.
pub fn enumerate<T: Clone + Default>(
    mut query: impl FnMut(&mut u32, Option<&mut [T]>) -> ZeResult,
) -> anyhow::Result<Vec<T>> {
    let mut count = 0u32;
    query(&mut count, None).check()?;
    let mut items = vec![T::default(); count as usize];
    if count > 0 {
        query(&mut count, Some(items.as_mut_slice())).check()?;
        items.truncate(count as usize);
    }
    Ok(items)
}

pub fn drivers(tables: &DdiTables) -> anyhow::Result<Vec<DriverHandle>> {
    let get = entry(&tables.driver.get, "zeDriverGet")?;
    enumerate(|n, out| get(n, out))
}

pub fn devices(tables: &DdiTables, driver: DriverHandle) -> anyhow::Result<Vec<DeviceHandle>> {
    let get = entry(&tables.device.get, "zeDeviceGet")?;
    enumerate(|n, out| get(driver, n, out))
}

pub fn collect(loader: &Loader, tables: &DdiTables) -> anyhow::Result<Report> {
    let components = loader
        .component_versions()
        .into_iter()
        .map(|c| ComponentInfo {
            kind: match c.kind {
                ComponentKind::Loader => "loader",
                ComponentKind::Driver => "driver",
                ComponentKind::Layer => "layer",
            }
            .to_string(),
            name: c.name,
            api_version: c.api_version.to_string(),
        })
        .collect();

    let get_version = entry(&tables.driver.get_api_version, "zeDriverGetApiVersion")?;
    let get_properties = entry(&tables.driver.get_properties, "zeDriverGetProperties")?;
    let get_extensions = entry(
        &tables.driver.get_extension_properties,
        "zeDriverGetExtensionProperties",
    )?;
    let device_properties = entry(&tables.device.get_properties, "zeDeviceGetProperties")?;
    let sub_devices = entry(&tables.device.get_sub_devices, "zeDeviceGetSubDevices")?;

    let mut drivers = Vec::new();
    for driver in self::drivers(tables)? {
        let mut version = ApiVersion::default();
        get_version(driver, &mut version).check()?;
        let mut properties = DriverProperties::default();
        get_properties(driver, &mut properties).check()?;
        let extensions = enumerate(|n, out| get_extensions(driver, n, out))?
            .into_iter()
            .map(|e: ExtensionProperties| format!("{} v{}", e.name, e.version))
            .collect();

        let mut devices = Vec::new();
        for device in self::devices(tables, driver)? {
            let mut props = DeviceProperties::default();
            device_properties(device, &mut props).check()?;
            let mut subs = 0u32;
            sub_devices(device, &mut subs, None).check()?;
            devices.push(DeviceInfo {
                name: props.name,
                device_type: format!("{:?}", props.device_type),
                vendor_id: props.vendor_id,
                device_id: props.device_id,
                sub_devices: subs,
                max_mem_alloc_size: props.max_mem_alloc_size,
            });
        }

        drivers.push(DriverInfo {
            api_version: version.to_string(),
            driver_version: properties.driver_version,
            extensions,
            devices,
        });
    }

    Ok(Report {
        loader_version: Loader::VERSION.to_string(),
        api_version: loader.api_version().to_string(),
        platform: accel_common::platform::platform_name(),
        passthrough: loader.is_passthrough(),
        components,
        drivers,
    })
}

pub fn print_report(report: &Report) {
    println!();
    println!(
        "Accelerator loader {} (API {}, {})",
        report.loader_version, report.api_version, report.platform
    );
    println!(
        "Dispatch: {}",
        if report.passthrough { "passthrough" } else { "loader intercept" }
    );
    println!();

    println!("Components:");
    for c in &report.components {
        println!("  {:<7} {} (API {})", c.kind, c.name, c.api_version);
    }
    println!();

    for (i, driver) in report.drivers.iter().enumerate() {
        println!("Driver {}: API {}, version {}", i, driver.api_version, driver.driver_version);
        for ext in &driver.extensions {
            println!("  extension {}", ext);
        }
        for (j, device) in driver.devices.iter().enumerate() {
            println!("  Device {}: {}", j, device.name);
            println!("    Type:        {}", device.device_type);
            println!("    Vendor/ID:   {:#06x}/{:#06x}", device.vendor_id, device.device_id);
            println!("    Sub-devices: {}", device.sub_devices);
            println!("    Max alloc:   {} MB", device.max_mem_alloc_size / (1024 * 1024));
        }
        println!();
    }
}
