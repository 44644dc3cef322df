//! Serial port transport, factory and catalog (serialport backend)
//!
//! `serialport` I/O is blocking, so every call runs on the blocking pool.
//! Reads and writes go through separate cloned handles: a read waiting out its
//! poll interval never delays a reply.

use std::io::{ErrorKind, Read, Write};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use contracts::{
    ContractError, DeviceCatalog, Parity, SerialConfig, StopBits, Transport, TransportError,
    TransportFactory,
};
use serialport::{ClearBuffer, DataBits, SerialPort};
use tracing::{debug, info, instrument};

type PortSlot = Arc<Mutex<Option<Box<dyn SerialPort>>>>;

fn lock(slot: &PortSlot) -> MutexGuard<'_, Option<Box<dyn SerialPort>>> {
    match slot.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Convert data bits count to serialport's DataBits
pub fn to_serialport_data_bits(bits: u8) -> Option<DataBits> {
    match bits {
        5 => Some(DataBits::Five),
        6 => Some(DataBits::Six),
        7 => Some(DataBits::Seven),
        8 => Some(DataBits::Eight),
        _ => None,
    }
}

/// Convert parity to serialport's Parity; mark/space are unsupported
pub fn to_serialport_parity(parity: Parity) -> Option<serialport::Parity> {
    match parity {
        Parity::None => Some(serialport::Parity::None),
        Parity::Odd => Some(serialport::Parity::Odd),
        Parity::Even => Some(serialport::Parity::Even),
        Parity::Mark | Parity::Space => None,
    }
}

/// Convert stop bits to serialport's StopBits; 1.5 is unsupported
pub fn to_serialport_stop_bits(stop_bits: StopBits) -> Option<serialport::StopBits> {
    match stop_bits {
        StopBits::One => Some(serialport::StopBits::One),
        StopBits::Two => Some(serialport::StopBits::Two),
        StopBits::OnePointFive => None,
    }
}

/// An open serial port
pub struct SerialTransport {
    id: String,
    reader: PortSlot,
    writer: PortSlot,
}

impl SerialTransport {
    /// Open and prepare `id` (blocking)
    ///
    /// Applies line settings, sets the initial DTR/RTS state and discards
    /// anything already waiting in the OS input buffer.
    pub fn open_blocking(id: &str, config: &SerialConfig) -> Result<Self, TransportError> {
        let data_bits = to_serialport_data_bits(config.data_bits).ok_or_else(|| {
            TransportError::open(id, format!("unsupported data bits {}", config.data_bits))
        })?;
        let parity = to_serialport_parity(config.parity).ok_or_else(|| {
            TransportError::open(id, format!("parity {:?} is not supported", config.parity))
        })?;
        let stop_bits = to_serialport_stop_bits(config.stop_bits).ok_or_else(|| {
            TransportError::open(id, format!("stop bits {:?} is not supported", config.stop_bits))
        })?;

        let open_err = |e: serialport::Error| TransportError::open(id, e.to_string());
        let mut port = serialport::new(id, config.baud_rate)
            .data_bits(data_bits)
            .parity(parity)
            .stop_bits(stop_bits)
            .timeout(Duration::from_millis(config.read_poll_ms))
            .open()
            .map_err(open_err)?;

        let bits = config.modem_bits();
        port.write_data_terminal_ready(bits.dtr).map_err(open_err)?;
        port.write_request_to_send(bits.rts).map_err(open_err)?;
        port.clear(ClearBuffer::Input).map_err(open_err)?;
        let writer = port.try_clone().map_err(open_err)?;

        info!(
            port = %id,
            baud_rate = config.baud_rate,
            data_bits = config.data_bits,
            parity = ?config.parity,
            stop_bits = ?config.stop_bits,
            dtr = bits.dtr,
            rts = bits.rts,
            "serial port opened"
        );

        Ok(Self {
            id: id.to_string(),
            reader: Arc::new(Mutex::new(Some(port))),
            writer: Arc::new(Mutex::new(Some(writer))),
        })
    }
}

impl Transport for SerialTransport {
    fn id(&self) -> &str {
        &self.id
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        let slot = self.reader.clone();
        let id = self.id.clone();
        let len = buf.len();

        let data = tokio::task::spawn_blocking(move || {
            let mut guard = lock(&slot);
            let port = guard.as_mut().ok_or_else(|| TransportError::closed(&id))?;
            let mut chunk = vec![0u8; len];
            match port.read(&mut chunk) {
                Ok(0) => Err(TransportError::EndOfStream),
                Ok(n) => {
                    chunk.truncate(n);
                    Ok(chunk)
                }
                Err(e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
                Err(e) => Err(TransportError::read(&id, e.to_string())),
            }
        })
        .await
        .map_err(|e| TransportError::read(&self.id, e.to_string()))??;

        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }

    async fn write(&self, data: &[u8]) -> Result<usize, TransportError> {
        let slot = self.writer.clone();
        let id = self.id.clone();
        let data = data.to_vec();

        tokio::task::spawn_blocking(move || {
            let mut guard = lock(&slot);
            let port = guard.as_mut().ok_or_else(|| TransportError::closed(&id))?;
            port.write_all(&data)
                .and_then(|()| port.flush())
                .map_err(|e| TransportError::write(&id, e.to_string()))?;
            Ok::<_, TransportError>(data.len())
        })
        .await
        .map_err(|e| TransportError::write(&self.id, e.to_string()))?
    }

    async fn close(&self) -> Result<(), TransportError> {
        let reader = self.reader.clone();
        let writer = self.writer.clone();
        let id = self.id.clone();

        tokio::task::spawn_blocking(move || {
            let had_writer = lock(&writer).take().is_some();
            let had_reader = lock(&reader).take().is_some();
            if had_reader || had_writer {
                debug!(port = %id, "serial port closed");
            }
        })
        .await
        .map_err(|e| TransportError::close(&self.id, e.to_string()))
    }
}

/// Opens [`SerialTransport`]s with fixed line settings
#[derive(Debug, Clone)]
pub struct SerialFactory {
    config: SerialConfig,
}

impl SerialFactory {
    pub fn new(config: SerialConfig) -> Self {
        Self { config }
    }
}

impl TransportFactory for SerialFactory {
    type Transport = SerialTransport;

    #[instrument(name = "serial_factory_open", skip(self))]
    async fn open(&self, id: &str) -> Result<SerialTransport, TransportError> {
        let config = self.config.clone();
        let port = id.to_string();
        tokio::task::spawn_blocking(move || SerialTransport::open_blocking(&port, &config))
            .await
            .map_err(|e| TransportError::open(id, e.to_string()))?
    }
}

/// Enumerates OS serial ports
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialCatalog;

impl DeviceCatalog for SerialCatalog {
    fn enumerate_ports(&self) -> Result<Vec<String>, ContractError> {
        let ports = serialport::available_ports()
            .map_err(|e| ContractError::enumeration(e.to_string()))?;

        Ok(ports
            .into_iter()
            // macOS lists every device twice; tty.* blocks on open waiting for carrier
            .filter(|_p| {
                #[cfg(target_os = "macos")]
                {
                    !_p.port_name.starts_with("/dev/tty.")
                }
                #[cfg(not(target_os = "macos"))]
                {
                    true
                }
            })
            .map(|p| p.port_name)
            .collect())
    }
}
