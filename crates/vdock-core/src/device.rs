//! The emulated dock switch, backed by a uinput device.

use std::io;
use std::path::PathBuf;

use evdev::uinput::VirtualDevice;
use evdev::{AttributeSet, BusType, EventType, InputEvent, InputId, SwitchCode};
use tracing::debug;

use vdock_config::DeviceConfig;

use crate::daemon::DaemonError;
use crate::event::Event;

/// A single write to the virtual device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceWrite {
    /// `EV_SW`/`SW_DOCK` with the switch asserted (`true`) or cleared.
    DockSwitch(bool),
    /// `EV_SYN`/`SYN_REPORT`, publishing the preceding writes to readers.
    SyncReport,
}

/// Destination for device writes.
pub trait EventSink {
    fn write(&mut self, write: DeviceWrite) -> io::Result<()>;
}

/// The writes that report `event`, in order.
pub fn writes_for(event: Event) -> [DeviceWrite; 2] {
    [DeviceWrite::DockSwitch(event.docked()), DeviceWrite::SyncReport]
}

/// The uinput-backed dock switch.
///
/// The kernel device is destroyed when this value is dropped.
pub struct VirtualDock {
    device: VirtualDevice,
    name: String,
    devnode: Option<PathBuf>,
    pending: Vec<InputEvent>,
}

impl VirtualDock {
    /// Create a uinput device with a single `SW_DOCK` switch.
    pub fn create(config: &DeviceConfig) -> Result<Self, DaemonError> {
        let mut device = build_device(config).map_err(DaemonError::Device)?;

        let devnode = device
            .enumerate_dev_nodes_blocking()
            .ok()
            .and_then(|mut nodes| nodes.find_map(Result::ok));

        debug!(
            name = %config.name,
            devnode = ?devnode,
            "Created uinput device"
        );

        Ok(Self {
            device,
            name: config.name.clone(),
            devnode,
            pending: Vec::with_capacity(1),
        })
    }
}

fn build_device(config: &DeviceConfig) -> io::Result<VirtualDevice> {
    let mut switches = AttributeSet::<SwitchCode>::new();
    switches.insert(SwitchCode::SW_DOCK);

    VirtualDevice::builder()?
        .name(&config.name)
        .input_id(InputId::new(
            BusType::BUS_VIRTUAL,
            config.vendor,
            config.product,
            1,
        ))
        .with_switches(&switches)?
        .build()
}

impl EventSink for VirtualDock {
    // evdev terminates every emitted batch with SYN_REPORT itself, so switch
    // writes are held back until the report marker arrives.
    fn write(&mut self, write: DeviceWrite) -> io::Result<()> {
        match write {
            DeviceWrite::DockSwitch(docked) => {
                self.pending.push(InputEvent::new(
                    EventType::SWITCH.0,
                    SwitchCode::SW_DOCK.0,
                    i32::from(docked),
                ));
                Ok(())
            }
            DeviceWrite::SyncReport => {
                let batch = std::mem::take(&mut self.pending);
                self.device.emit(&batch)
            }
        }
    }
}

impl Drop for VirtualDock {
    fn drop(&mut self) {
        debug!(name = %self.name, devnode = ?self.devnode, "Removing uinput device");
    }
}
