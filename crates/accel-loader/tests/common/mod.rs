//! Shared setup for the loader integration tests: null drivers recording
//! into one journal, a loader over them, and small two-phase query helpers.

#![allow(dead_code)]

use std::sync::Arc;

use accel_api::*;
use accel_loader::{Loader, LoaderBuilder};
use accel_null_driver::{Journal, NullDriver, NullDriverConfig};

pub struct Harness {
    pub loader: Loader,
    pub tables: DdiTables,
    pub drivers: Vec<Arc<NullDriver>>,
    pub journal: Arc<Journal>,
}

impl Harness {
    pub fn new(configs: Vec<NullDriverConfig>) -> Self {
        Self::with(configs, |builder| builder)
    }

    /// Build a loader over one null driver per config, letting `customize`
    /// adjust the builder, and fetch every table.
    pub fn with(
        configs: Vec<NullDriverConfig>,
        customize: impl FnOnce(LoaderBuilder) -> LoaderBuilder,
    ) -> Self {
        let journal = Journal::new();
        let drivers: Vec<Arc<NullDriver>> = configs
            .into_iter()
            .map(|config| Arc::new(NullDriver::with_journal(config, Arc::clone(&journal))))
            .collect();

        let mut builder = Loader::builder();
        for driver in &drivers {
            builder = builder.driver_arc(driver.clone());
        }
        let loader = customize(builder).build();
        let tables = loader
            .build_all_tables(ApiVersion::CURRENT)
            .expect("tables should build");

        Self {
            loader,
            tables,
            drivers,
            journal,
        }
    }

    /// Build, then run `zeInit` through the application-facing table.
    pub fn initialized(configs: Vec<NullDriverConfig>) -> Self {
        Self::initialized_with(configs, |builder| builder)
    }

    pub fn initialized_with(
        configs: Vec<NullDriverConfig>,
        customize: impl FnOnce(LoaderBuilder) -> LoaderBuilder,
    ) -> Self {
        let harness = Self::with(configs, customize);
        assert_eq!(harness.init(), ZeResult::SUCCESS);
        harness
    }

    pub fn init(&self) -> ZeResult {
        self.tables.global.init.as_deref().unwrap()(InitFlags::empty())
    }

    pub fn driver(&self, index: usize) -> &NullDriver {
        &self.drivers[index]
    }
}

pub fn drivers(t: &DdiTables) -> Vec<DriverHandle> {
    let get = t.driver.get.as_deref().unwrap();
    let mut count = 0;
    assert_eq!(get(&mut count, None), ZeResult::SUCCESS);
    let mut handles = vec![DriverHandle::NULL; count as usize];
    assert_eq!(get(&mut count, Some(handles.as_mut_slice())), ZeResult::SUCCESS);
    handles.truncate(count as usize);
    handles
}

pub fn devices(t: &DdiTables, driver: DriverHandle) -> Vec<DeviceHandle> {
    let get = t.device.get.as_deref().unwrap();
    let mut count = 0;
    assert_eq!(get(driver, &mut count, None), ZeResult::SUCCESS);
    let mut handles = vec![DeviceHandle::NULL; count as usize];
    assert_eq!(get(driver, &mut count, Some(handles.as_mut_slice())), ZeResult::SUCCESS);
    handles.truncate(count as usize);
    handles
}

pub fn device_count(t: &DdiTables, driver: DriverHandle) -> u32 {
    let mut count = 0;
    assert_eq!(
        t.device.get.as_deref().unwrap()(driver, &mut count, None),
        ZeResult::SUCCESS
    );
    count
}

pub fn context(t: &DdiTables, driver: DriverHandle) -> ContextHandle {
    let mut context = ContextHandle::NULL;
    assert_eq!(
        t.context.create.as_deref().unwrap()(driver, &ContextDesc::default(), &mut context),
        ZeResult::SUCCESS
    );
    context
}
