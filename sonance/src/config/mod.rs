mod device_desc;

pub use device_desc::DeviceDesc;
