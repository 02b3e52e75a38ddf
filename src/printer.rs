use log::{debug, info, warn};
use rusb::{Context, Device, DeviceDescriptor, DeviceHandle, Direction, TransferType, UsbContext};
use std::time::Duration;

use crate::{
    error::Error,
    rescale::rescale,
    resolution::{label_dpi, printer_dpi},
};

/// USB vendor id of Zebra Technologies.
pub const ZEBRA_VENDOR_ID: u16 = 0x0A5F;

/// Runs the printer's media calibration.
pub const AUTOSENSE: &str = "\nxa\n";

/// Soft reset.
pub const RESET: &str = "\n^@\n";

/// Restore factory defaults.
pub const RESET_DEFAULT: &str = "\n^default\n";

/// Anything that takes a finished stream and knows the resolution it prints
/// at.
pub trait LabelSink {
    /// Rated resolution in dots per inch, 0 when unknown.
    fn dpi(&self) -> u32;

    /// Send raw bytes to the device.
    fn send(&self, buf: &[u8]) -> Result<(), Error>;
}

/// Print a label, rescaling it first when the label and the printer disagree
/// on resolution.
///
/// The label's resolution comes from its `^LL` directive and the printer's
/// from the sink. When either is unknown, or rescaling fails, the stream is
/// sent as it is.
pub fn print_label<S: LabelSink>(sink: &S, commands: &str) -> Result<(), Error> {
    let printer = sink.dpi();
    let label = label_dpi(commands);

    if printer > 0 && label > 0 && printer != label {
        match rescale(commands, printer, label) {
            Ok(scaled) => return sink.send(scaled.as_bytes()),
            Err(err) => warn!("rescale failed, printing unscaled label: {}", err),
        }
    } else {
        debug!(
            "printing unscaled label (printer {}dpi, label {}dpi)",
            printer, label
        );
    }
    sink.send(commands.as_bytes())
}

/// Commands that set label size and print method by hand.
///
/// `label_height` and `label_gap` set the form length and the gap between
/// labels, `label_width` the print width, all in dots.
pub fn setup_commands(
    label_height: u32,
    label_gap: u32,
    label_width: u32,
    direct_thermal: bool,
) -> String {
    let mut commands = String::from("\n");
    if direct_thermal {
        commands.push_str("OD\n");
    }
    commands.push_str(&format!("Q{},{}\n", label_height, label_gap));
    commands.push_str(&format!("q{}\n", label_width));
    commands
}

#[derive(Debug, Clone, Copy)]
struct Endpoint {
    config: u8,
    iface: u8,
    setting: u8,
    address: u8,
}

/// An attached Zebra printer, as reported by [`list_printers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub product_id: u16,
    pub serial: String,
    pub product: String,
}

impl DeviceInfo {
    pub fn dpi(&self) -> u32 {
        printer_dpi(&self.product)
    }
}

/// List the Zebra printers attached over USB.
pub fn list_printers() -> Result<Vec<DeviceInfo>, Error> {
    let context = Context::new()?;
    let devices = context.devices()?;
    let timeout = Duration::from_secs(1);
    let mut printers = Vec::new();

    for device in devices.iter() {
        let device_desc = match device.device_descriptor() {
            Ok(d) => d,
            Err(err) => {
                debug!("{:?}", err);
                continue;
            }
        };
        if device_desc.vendor_id() != ZEBRA_VENDOR_ID {
            continue;
        }
        match device.open() {
            Ok(handle) => {
                let (serial, product) = read_strings(&handle, &device_desc, timeout);
                printers.push(DeviceInfo {
                    product_id: device_desc.product_id(),
                    serial,
                    product,
                });
            }
            Err(err) => debug!("Failed to open device: {:?}", err),
        }
    }
    Ok(printers)
}

/// Serial number and product strings, empty when the device won't say.
fn read_strings(
    handle: &DeviceHandle<Context>,
    device_desc: &DeviceDescriptor,
    timeout: Duration,
) -> (String, String) {
    let language = match handle.read_languages(timeout) {
        Ok(languages) if !languages.is_empty() => languages[0],
        _ => return (String::new(), String::new()),
    };
    let serial = handle
        .read_serial_number_string(language, device_desc, timeout)
        .unwrap_or_default();
    let product = handle
        .read_product_string(language, device_desc, timeout)
        .unwrap_or_default();
    (serial, product)
}

pub struct Printer {
    handle: Box<DeviceHandle<Context>>,
    endpoint_out: Endpoint,
    product: String,
    dpi: u32,
    config: Config,
}

impl Printer {
    pub fn new(config: Config) -> Result<Self, Error> {
        let mut context = Context::new()?;
        let (mut device, device_desc, mut handle, product) =
            match Self::open_device(&mut context, &config) {
                Ok(opened) => opened,
                Err(err) => {
                    debug!("{:?}", err);
                    return Err(Error::DeviceOffline);
                }
            };

        let endpoint_out =
            match Self::find_endpoint(&mut device, &device_desc, Direction::Out, TransferType::Bulk)
            {
                Some(endpoint) => endpoint,
                None => return Err(Error::MissingEndpoint),
            };

        // Printers that also enumerate as a printer class device have a
        // kernel driver bound, which must be detached before claiming.
        handle.set_auto_detach_kernel_driver(true)?;
        let has_kernel_driver = matches!(handle.kernel_driver_active(endpoint_out.iface), Ok(true));
        info!(" Kernel driver support is {}", has_kernel_driver);
        handle.set_active_configuration(endpoint_out.config)?;
        handle.claim_interface(endpoint_out.iface)?;
        handle.set_alternate_setting(endpoint_out.iface, endpoint_out.setting)?;

        let dpi = config.dpi.unwrap_or_else(|| printer_dpi(&product));
        info!("Opened {:?} at {}dpi", product, dpi);

        Ok(Printer {
            handle: Box::new(handle),
            endpoint_out,
            product,
            dpi,
            config,
        })
    }

    fn open_device(
        context: &mut Context,
        config: &Config,
    ) -> Result<(Device<Context>, DeviceDescriptor, DeviceHandle<Context>, String), Error> {
        let devices = context.devices()?;

        if devices.is_empty() {
            debug!("Failed to read device list");
            return Err(Error::DeviceListNotReadable);
        }
        for device in devices.iter() {
            let device_desc = match device.device_descriptor() {
                Ok(d) => d,
                Err(err) => {
                    debug!("{:?}", err);
                    continue;
                }
            };

            if device_desc.vendor_id() != ZEBRA_VENDOR_ID {
                continue;
            }
            if let Some(pid) = config.product_id {
                if device_desc.product_id() != pid {
                    continue;
                }
            }
            debug!("{:?}", device_desc);

            match device.open() {
                Ok(handle) => {
                    let (serial, product) = read_strings(&handle, &device_desc, config.timeout);
                    match &config.serial {
                        Some(wanted) if *wanted != serial => {
                            debug!("Skipping printer with serial {:?}", serial);
                            continue;
                        }
                        _ => return Ok((device, device_desc, handle, product)),
                    }
                }
                Err(err) => {
                    debug!("Failed to open device: {:?}", err);
                    continue;
                }
            }
        }
        debug!("No device match with this serial: {:?}", config.serial);
        Err(Error::DeviceOffline)
    }

    fn find_endpoint(
        device: &mut Device<Context>,
        device_desc: &DeviceDescriptor,
        direction: Direction,
        transfer_type: TransferType,
    ) -> Option<Endpoint> {
        for n in 0..device_desc.num_configurations() {
            let config_desc = match device.config_descriptor(n) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for interface in config_desc.interfaces() {
                for interface_desc in interface.descriptors() {
                    for endpoint_desc in interface_desc.endpoint_descriptors() {
                        if endpoint_desc.direction() == direction
                            && endpoint_desc.transfer_type() == transfer_type
                        {
                            return Some(Endpoint {
                                config: config_desc.number(),
                                iface: interface_desc.interface_number(),
                                setting: interface_desc.setting_number(),
                                address: endpoint_desc.address(),
                            });
                        }
                    }
                }
            }
        }
        None
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    /// Write the whole buffer, retrying transient USB errors.
    fn write(&self, buf: &[u8]) -> Result<usize, Error> {
        let mut written = 0;
        let mut attempts = 0;

        while written < buf.len() {
            let result = self
                .handle
                .write_bulk(self.endpoint_out.address, &buf[written..], self.config.timeout)
                .map_err(Error::UsbError);
            match result {
                Ok(0) => {
                    debug!("write error: printer accepted nothing after {} bytes", written);
                    return Err(Error::InvalidResponse(written));
                }
                Ok(n) => {
                    written += n;
                    attempts = 0;
                }
                Err(err) if err.is_transient() && attempts < self.config.retries => {
                    attempts += 1;
                    debug!("write attempt {} failed: {}", attempts, err);
                    std::thread::sleep(Duration::from_millis(500));
                }
                Err(err) if err.is_transient() => {
                    debug!("giving up after {} retries: {}", attempts, err);
                    return Err(Error::WriteTimeout);
                }
                Err(err) => return Err(err),
            }
        }
        debug!("wrote {} bytes", written);
        Ok(written)
    }

    /// Set label size and print method by hand.
    pub fn setup(
        &self,
        label_height: u32,
        label_gap: u32,
        label_width: u32,
        direct_thermal: bool,
    ) -> Result<(), Error> {
        self.send(setup_commands(label_height, label_gap, label_width, direct_thermal).as_bytes())
    }

    /// Calibrate to the installed media.
    pub fn autosense(&self) -> Result<(), Error> {
        self.send(AUTOSENSE.as_bytes())
    }

    pub fn reset(&self) -> Result<(), Error> {
        self.send(RESET.as_bytes())
    }

    pub fn reset_default(&self) -> Result<(), Error> {
        self.send(RESET_DEFAULT.as_bytes())
    }

    /// Print a label, see [`print_label`].
    pub fn print(&self, commands: &str) -> Result<(), Error> {
        print_label(self, commands)
    }
}

impl LabelSink for Printer {
    fn dpi(&self) -> u32 {
        self.dpi
    }

    fn send(&self, buf: &[u8]) -> Result<(), Error> {
        self.write(buf).map(|_| ())
    }
}

/// Config
///
#[derive(Debug, Clone)]
pub struct Config {
    serial: Option<String>,
    product_id: Option<u16>,
    timeout: Duration,
    retries: u8,
    dpi: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Config::new()
    }
}

impl Config {
    /// Match the first Zebra printer found, 10 second writes, 3 retries.
    ///
    /// # Example
    ///
    /// ```
    /// use zpl_rescale::Config;
    ///
    /// let config = Config::new().serial("D2J184800123".to_string()).retries(5);
    /// ```
    pub fn new() -> Config {
        Config {
            serial: None,
            product_id: None,
            timeout: Duration::from_secs(10),
            retries: 3,
            dpi: None,
        }
    }

    pub fn serial(self, serial: String) -> Self {
        Config {
            serial: Some(serial),
            ..self
        }
    }

    pub fn product_id(self, pid: u16) -> Self {
        Config {
            product_id: Some(pid),
            ..self
        }
    }

    pub fn timeout(self, timeout: Duration) -> Self {
        Config { timeout, ..self }
    }

    pub fn retries(self, retries: u8) -> Self {
        Config { retries, ..self }
    }

    /// Use this resolution instead of the one in the product string.
    pub fn dpi(self, dpi: u32) -> Self {
        Config {
            dpi: Some(dpi),
            ..self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct MemorySink {
        dpi: u32,
        sent: RefCell<Vec<u8>>,
    }

    impl MemorySink {
        fn new(dpi: u32) -> Self {
            MemorySink {
                dpi,
                sent: RefCell::new(Vec::new()),
            }
        }

        fn sent(&self) -> String {
            String::from_utf8(self.sent.borrow().clone()).unwrap()
        }
    }

    impl LabelSink for MemorySink {
        fn dpi(&self) -> u32 {
            self.dpi
        }

        fn send(&self, buf: &[u8]) -> Result<(), Error> {
            self.sent.borrow_mut().extend_from_slice(buf);
            Ok(())
        }
    }

    #[test]
    fn rescales_when_resolutions_differ() {
        let sink = MemorySink::new(400);
        print_label(&sink, "^XA^LL200^FO10,20^FS^XZ").unwrap();
        assert_eq!(sink.sent(), "^XA^LL400^FO20,40^FS^XZ");
    }

    #[test]
    fn unscaled_when_equal_or_unknown() {
        let label = "^XA^LL203^FO10,20^FS^XZ";
        for dpi in [0, 203] {
            let sink = MemorySink::new(dpi);
            print_label(&sink, label).unwrap();
            assert_eq!(sink.sent(), label);
        }

        let sink = MemorySink::new(300);
        print_label(&sink, "^XA^FO10,20^FS^XZ").unwrap();
        assert_eq!(sink.sent(), "^XA^FO10,20^FS^XZ");
    }

    #[test]
    fn falls_back_to_original_on_failure() {
        let label = "^XA^LL203\n^FO10,10^GFA,8,8,2,:Z99:AAAA:0000^FS\n^XZ";
        let sink = MemorySink::new(300);
        print_label(&sink, label).unwrap();
        assert_eq!(sink.sent(), label);
    }

    #[test]
    fn setup_stream() {
        assert_eq!(setup_commands(406, 32, 812, true), "\nOD\nQ406,32\nq812\n");
        assert_eq!(setup_commands(406, 32, 812, false), "\nQ406,32\nq812\n");
    }

    #[test]
    fn config_builder() {
        let config = Config::new()
            .serial("XXQLJ120900310".to_string())
            .product_id(0x0100)
            .retries(1)
            .dpi(300);
        assert_eq!(config.serial.as_deref(), Some("XXQLJ120900310"));
        assert_eq!(config.product_id, Some(0x0100));
        assert_eq!(config.retries, 1);
        assert_eq!(config.dpi, Some(300));
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn device_info_dpi() {
        let info = DeviceInfo {
            product_id: 0x0100,
            serial: "50J162000000".to_string(),
            product: "ZTC ZD420-203dpi ZPL".to_string(),
        };
        assert_eq!(info.dpi(), 203);
    }
}
