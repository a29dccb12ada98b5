//! Descriptors, property records and enumerations passed through the
//! dispatch tables.
//!
//! Enumerations are open `u32` newtypes: a caller can pass any raw value, and
//! the validation layer is what rejects unknown ones with
//! `ERROR_INVALID_ENUMERATION`.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use crate::handle::{ImageHandle, SamplerHandle};
use crate::intercept::Param;
use crate::result::ZeResult;

// ── API version ──────────────────────────────────────────────────────

/// `(major << 16) | minor`, so versions order numerically.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable, Serialize, Deserialize,
)]
#[repr(transparent)]
pub struct ApiVersion(pub u32);

impl ApiVersion {
    pub const V1_0: Self = Self::new(1, 0);
    pub const V1_1: Self = Self::new(1, 1);
    pub const V1_2: Self = Self::new(1, 2);
    pub const V1_3: Self = Self::new(1, 3);
    pub const CURRENT: Self = Self::V1_3;

    pub const fn new(major: u16, minor: u16) -> Self {
        Self(((major as u32) << 16) | minor as u32)
    }

    pub const fn major(self) -> u16 {
        (self.0 >> 16) as u16
    }

    pub const fn minor(self) -> u16 {
        (self.0 & 0xffff) as u16
    }
}

impl Default for ApiVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major(), self.minor())
    }
}

impl fmt::Debug for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ApiVersion({self})")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid API version {0:?}, expected MAJOR.MINOR")]
pub struct ParseApiVersionError(pub String);

impl FromStr for ApiVersion {
    type Err = ParseApiVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseApiVersionError(s.to_string());
        let (major, minor) = s.trim().split_once('.').ok_or_else(err)?;
        let major = major.parse::<u16>().map_err(|_| err())?;
        let minor = minor.parse::<u16>().map_err(|_| err())?;
        Ok(Self::new(major, minor))
    }
}

impl Param for ApiVersion {}

// ── Enumerations ─────────────────────────────────────────────────────

macro_rules! open_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident = $value:expr),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable, Serialize, Deserialize)]
        #[repr(transparent)]
        pub struct $name(pub u32);

        impl $name {
            $(pub const $variant: Self = Self($value);)*

            pub const KNOWN: &'static [Self] = &[$(Self::$variant),*];

            pub fn is_known(self) -> bool {
                Self::KNOWN.contains(&self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                $(
                    if *self == Self::$variant {
                        return f.write_str(stringify!($variant));
                    }
                )*
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl Param for $name {
            fn validate(&self) -> Result<(), ZeResult> {
                if self.is_known() {
                    Ok(())
                } else {
                    Err(ZeResult::ERROR_INVALID_ENUMERATION)
                }
            }
        }
    };
}

open_enum!(DeviceType { GPU = 1, CPU = 2, FPGA = 3, MCA = 4, VPU = 5 });

open_enum!(CommandQueueMode {
    DEFAULT = 0,
    SYNCHRONOUS = 1,
    ASYNCHRONOUS = 2,
});

open_enum!(CommandQueuePriority {
    NORMAL = 0,
    PRIORITY_LOW = 1,
    PRIORITY_HIGH = 2,
});

open_enum!(ImageType {
    D1 = 0,
    D1_ARRAY = 1,
    D2 = 2,
    D2_ARRAY = 3,
    D3 = 4,
    BUFFER = 5,
});

open_enum!(ImageFormatLayout {
    R8 = 0,
    R16 = 1,
    R32 = 2,
    R8G8 = 3,
    R8G8B8A8 = 4,
    R32G32B32A32 = 5,
});

open_enum!(ModuleFormat { IL_SPIRV = 0, NATIVE = 1 });

open_enum!(SamplerAddressMode {
    NONE = 0,
    REPEAT = 1,
    CLAMP = 2,
    CLAMP_TO_BORDER = 3,
    MIRROR = 4,
});

open_enum!(SamplerFilterMode { NEAREST = 0, LINEAR = 1 });

open_enum!(FabricVertexType {
    UNKNOWN = 0,
    DEVICE = 1,
    SUBDEVICE = 2,
    SWITCH = 3,
});

open_enum!(RtasBuilderVersion { V1_0 = 0x0001_0000 });

// ── Flags ────────────────────────────────────────────────────────────

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InitFlags: u32 {
        const GPU_ONLY = 1 << 0;
        const VPU_ONLY = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ContextFlags: u32 {
        const TBD = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandQueueFlags: u32 {
        const EXPLICIT_ONLY = 1 << 0;
        const IN_ORDER = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CommandListFlags: u32 {
        const RELAXED_ORDERING = 1 << 0;
        const MAXIMIZE_THROUGHPUT = 1 << 1;
        const EXPLICIT_ONLY = 1 << 2;
        const IN_ORDER = 1 << 3;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FenceFlags: u32 {
        const SIGNALED = 1 << 0;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventPoolFlags: u32 {
        const HOST_VISIBLE = 1 << 0;
        const IPC = 1 << 1;
        const KERNEL_TIMESTAMP = 1 << 2;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventScopeFlags: u32 {
        const SUBDEVICE = 1 << 0;
        const DEVICE = 1 << 1;
        const HOST = 1 << 2;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageFlags: u32 {
        const KERNEL_WRITE = 1 << 0;
        const BIAS_UNCACHED = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageSamplerFilterFlags: u32 {
        const POINT = 1 << 0;
        const LINEAR = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KernelFlags: u32 {
        const FORCE_RESIDENCY = 1 << 0;
        const EXPLICIT_RESIDENCY = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PhysicalMemFlags: u32 {
        const ALLOCATE_ON_DEVICE = 1 << 0;
        const ALLOCATE_ON_HOST = 1 << 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceMemAllocFlags: u32 {
        const BIAS_CACHED = 1 << 0;
        const BIAS_UNCACHED = 1 << 1;
        const BIAS_INITIAL_PLACEMENT = 1 << 2;
    }
}

macro_rules! flags_param {
    ($($name:ident),* $(,)?) => {
        $(
            impl Param for $name {
                fn validate(&self) -> Result<(), ZeResult> {
                    if self.bits() & !Self::all().bits() == 0 {
                        Ok(())
                    } else {
                        Err(ZeResult::ERROR_INVALID_ENUMERATION)
                    }
                }
            }
        )*
    };
}

flags_param!(
    InitFlags,
    ContextFlags,
    CommandQueueFlags,
    CommandListFlags,
    FenceFlags,
    EventPoolFlags,
    EventScopeFlags,
    ImageFlags,
    KernelFlags,
    PhysicalMemFlags,
    DeviceMemAllocFlags,
);

// ── Descriptors ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContextDesc {
    pub flags: ContextFlags,
}

impl Param for ContextDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandQueueDesc {
    pub ordinal: u32,
    pub index: u32,
    pub flags: CommandQueueFlags,
    pub mode: CommandQueueMode,
    pub priority: CommandQueuePriority,
}

impl Param for CommandQueueDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()?;
        self.mode.validate()?;
        self.priority.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommandListDesc {
    pub command_queue_group_ordinal: u32,
    pub flags: CommandListFlags,
}

impl Param for CommandListDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FenceDesc {
    pub flags: FenceFlags,
}

impl Param for FenceDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventPoolDesc {
    pub flags: EventPoolFlags,
    /// Number of events the pool holds. Must be non-zero.
    pub count: u32,
}

impl Param for EventPoolDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()?;
        if self.count == 0 {
            return Err(ZeResult::ERROR_INVALID_SIZE);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventDesc {
    pub index: u32,
    pub signal: EventScopeFlags,
    pub wait: EventScopeFlags,
}

impl Param for EventDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.signal.validate()?;
        self.wait.validate()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageDesc {
    pub flags: ImageFlags,
    pub image_type: ImageType,
    pub format: ImageFormatLayout,
    pub width: u64,
    pub height: u32,
    pub depth: u32,
    pub array_levels: u32,
    pub mip_levels: u32,
}

impl Default for ImageDesc {
    fn default() -> Self {
        Self {
            flags: ImageFlags::empty(),
            image_type: ImageType::D2,
            format: ImageFormatLayout::R8G8B8A8,
            width: 1,
            height: 1,
            depth: 1,
            array_levels: 0,
            mip_levels: 0,
        }
    }
}

impl Param for ImageDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()?;
        self.image_type.validate()?;
        self.format.validate()?;
        if self.width == 0 {
            return Err(ZeResult::ERROR_INVALID_SIZE);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleDesc {
    pub format: ModuleFormat,
    pub input: Vec<u8>,
    pub build_flags: String,
}

impl Param for ModuleDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.format.validate()?;
        if self.input.is_empty() {
            return Err(ZeResult::ERROR_INVALID_SIZE);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct KernelDesc {
    pub flags: KernelFlags,
    pub name: String,
}

impl Param for KernelDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()?;
        if self.name.is_empty() {
            return Err(ZeResult::ERROR_INVALID_NULL_POINTER);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SamplerDesc {
    pub address_mode: SamplerAddressMode,
    pub filter_mode: SamplerFilterMode,
    pub normalized: bool,
}

impl Param for SamplerDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.address_mode.validate()?;
        self.filter_mode.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicalMemDesc {
    pub flags: PhysicalMemFlags,
    pub size: u64,
}

impl Param for PhysicalMemDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()?;
        if self.size == 0 {
            return Err(ZeResult::ERROR_UNSUPPORTED_SIZE);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceMemAllocDesc {
    pub flags: DeviceMemAllocFlags,
    pub ordinal: u32,
}

impl Param for DeviceMemAllocDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.flags.validate()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RtasBuilderDesc {
    pub builder_version: RtasBuilderVersion,
}

impl Param for RtasBuilderDesc {
    fn validate(&self) -> Result<(), ZeResult> {
        self.builder_version.validate()
    }
}

/// Thread-group counts for a kernel launch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct GroupCount {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Param for GroupCount {}

/// Value passed to `zeKernelSetArgumentValue`.
///
/// Image and sampler arguments are carried as handles so the loader can
/// translate them to the owning driver's native handle on the way down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgValue<'a> {
    /// Null pointer argument (local memory or an unset buffer).
    Null,
    Bytes(&'a [u8]),
    Image(ImageHandle),
    Sampler(SamplerHandle),
}

impl Param for ArgValue<'_> {}

// ── Properties ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DriverProperties {
    pub uuid: [u8; 16],
    pub driver_version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionProperties {
    pub name: String,
    pub version: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceProperties {
    pub device_type: DeviceType,
    pub vendor_id: u32,
    pub device_id: u32,
    pub name: String,
    pub is_sub_device: bool,
    pub sub_device_id: u32,
    pub core_clock_rate: u32,
    pub max_mem_alloc_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageProperties {
    pub sampler_filter_flags: ImageSamplerFilterFlags,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FabricVertexProperties {
    pub uuid: [u8; 16],
    pub vertex_type: FabricVertexType,
    pub remote: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FabricEdgeProperties {
    pub uuid: [u8; 16],
    pub model: String,
    pub bandwidth: u32,
    pub latency: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RtasBuilderBuildProperties {
    pub scratch_buffer_size_bytes: u64,
    pub rtas_buffer_size_bytes: u64,
}
