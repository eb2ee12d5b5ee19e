use std::env;

use inquire::Select;
use log::info;
use serialport::{DataBits, Parity, SerialPort, StopBits};
use studer_scom::{Engine, Instant, PollConfig, PollEvent, SensorConfigBuilder, Sink};

// Configuration constants - adjust these for your setup
const BAUD_RATE: u32 = 115200;
// Reads must not block the poll loop.
const SERIAL_TIMEOUT_MS: u64 = 1;
const LOOP_DELAY_MS: u64 = 1;

/// Values to poll: (user info, device address, name, unit, multiplier).
///
/// Active powers are inverted so that export to the grid reads negative.
const SENSORS: &[(u16, u16, &str, &str, f32)] = &[
    (3137, 101, "xt1_input_active_power", "kW", -1.0),
    (3138, 101, "xt1_input_apparent_power", "kVA", 1.0),
    (3136, 101, "xt1_output_active_power", "kW", -1.0),
    (3139, 101, "xt1_output_apparent_power", "kVA", 1.0),
    (3104, 101, "xt1_temperature", "°C", 1.0),
    (3085, 100, "output_freq", "Hz", 1.0),
    (3137, 100, "total_input_active_power", "kW", -1.0),
    (3136, 100, "total_output_active_power", "kW", -1.0),
    (3000, 100, "battery_voltage", "V", 1.0),
    (3005, 101, "xt1_batt_current", "A", 1.0),
];

/// Logs every value it receives.
struct Printed {
    name: &'static str,
    unit: &'static str,
}

impl Sink for Printed {
    fn publish(&self, value: f32) {
        info!("{} = {:.3} {}", self.name, value, self.unit);
    }
}

pub struct PortWrapper(Box<dyn SerialPort>);

#[derive(Debug)]
pub struct IoError(std::io::Error);

impl core::fmt::Display for IoError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for IoError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl embedded_io::Error for IoError {
    fn kind(&self) -> embedded_io::ErrorKind {
        match self.0.kind() {
            std::io::ErrorKind::NotFound => embedded_io::ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => embedded_io::ErrorKind::PermissionDenied,
            std::io::ErrorKind::BrokenPipe => embedded_io::ErrorKind::BrokenPipe,
            std::io::ErrorKind::InvalidInput => embedded_io::ErrorKind::InvalidInput,
            std::io::ErrorKind::InvalidData => embedded_io::ErrorKind::InvalidData,
            std::io::ErrorKind::TimedOut => embedded_io::ErrorKind::TimedOut,
            std::io::ErrorKind::Interrupted => embedded_io::ErrorKind::Interrupted,
            std::io::ErrorKind::Unsupported => embedded_io::ErrorKind::Unsupported,
            _ => embedded_io::ErrorKind::Other,
        }
    }
}

impl embedded_io::ErrorType for PortWrapper {
    type Error = IoError;
}

impl embedded_io::Read for PortWrapper {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        std::io::Read::read(&mut self.0, buf).map_err(IoError)
    }
}

impl embedded_io::ReadReady for PortWrapper {
    fn read_ready(&mut self) -> Result<bool, Self::Error> {
        let waiting = self
            .0
            .bytes_to_read()
            .map_err(|err| IoError(err.into()))?;
        Ok(waiting > 0)
    }
}

impl embedded_io::Write for PortWrapper {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        std::io::Write::write(&mut self.0, buf).map_err(IoError)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        std::io::Write::flush(&mut self.0).map_err(IoError)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Get serial port from command line arg or interactive selection
    let port_name = env::args().nth(1).unwrap_or_else(|| {
        let ports = serialport::available_ports().expect("Failed to enumerate serial ports");

        if ports.is_empty() {
            eprintln!("No serial ports found!");
            std::process::exit(1);
        }

        let port_names: Vec<String> = ports.iter().map(|p| p.port_name.clone()).collect();

        Select::new("Select the Xcom-232i serial port:", port_names)
            .prompt()
            .expect("Failed to select port")
    });

    println!("Using port: {}", port_name);

    // The Xcom-232i insists on even parity.
    let port = serialport::new(&port_name, BAUD_RATE)
        .data_bits(DataBits::Eight)
        .parity(Parity::Even)
        .stop_bits(StopBits::One)
        .timeout(std::time::Duration::from_millis(SERIAL_TIMEOUT_MS))
        .open()
        .expect("Failed to open serial port");

    let sinks: Vec<Printed> = SENSORS
        .iter()
        .map(|&(_, _, name, unit, _)| Printed { name, unit })
        .collect();

    let mut engine: Engine<PortWrapper> = Engine::new(PortWrapper(port), PollConfig::default());
    for (&(parameter, address, _, _, multiply), sink) in SENSORS.iter().zip(&sinks) {
        let sensor = SensorConfigBuilder::new(address, parameter)
            .with_multiply(multiply)
            .build()
            .expect("Invalid sensor");
        engine.register(&sensor, sink).expect("Too many sensors");
    }
    engine.log_config();

    let start = std::time::Instant::now();
    loop {
        let now = Instant::from_ticks(start.elapsed().as_millis() as u32);
        match engine.tick(now) {
            Ok(Some(PollEvent::Exhausted { key, failure, .. })) => {
                println!("No value for {key}: {failure}");
            }
            Ok(_) => {}
            Err(err) => {
                eprintln!("Giving up: {err}");
                std::process::exit(1);
            }
        }
        std::thread::sleep(std::time::Duration::from_millis(LOOP_DELAY_MS));
    }
}
