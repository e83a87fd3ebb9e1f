use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral};
use futures::StreamExt;
use once_cell::sync::Lazy;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{PrintError, PrintResult};
use crate::job::Transport;
use crate::protocol::chunk_data;

/// Write characteristic the printers accept raster data on.
static PRINT_CHARACTERISTIC: Lazy<Uuid> =
    Lazy::new(|| Uuid::parse_str("0000ae01-0000-1000-8000-00805f9b34fb").expect("valid uuid"));

/// Advertised names of known compatible printers.
const SUPPORTED_NAMES: &[&str] = &[
    "MXW01", "MX05", "MX06", "MX08", "MX10", "GB01", "GB02", "GB03", "GT01", "YT01",
];

const CONNECT_ATTEMPTS: u32 = 3;
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);
const CHUNK_DELAY: Duration = Duration::from_millis(20);
const DRAIN_DELAY: Duration = Duration::from_millis(500);

/// A BLE device seen while scanning.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub id: String,
    pub name: Option<String>,
}

/// Scans for BLE devices for the given duration.
///
/// Returns every visible device; callers filter for printers themselves.
pub async fn scan(timeout: Duration) -> PrintResult<Vec<DeviceInfo>> {
    let adapter = default_adapter().await?;
    let mut events = adapter.events().await.map_err(transport_err)?;
    adapter.start_scan(ScanFilter::default()).await.map_err(transport_err)?;

    let deadline = tokio::time::sleep(timeout);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut deadline => break,
            Some(event) = events.next() => {
                if let CentralEvent::DeviceDiscovered(id) = event {
                    debug!(%id, "discovered device");
                }
            }
        }
    }
    adapter.stop_scan().await.map_err(transport_err)?;

    let mut devices = Vec::new();
    for peripheral in adapter.peripherals().await.map_err(transport_err)? {
        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);
        devices.push(DeviceInfo { id: peripheral.id().to_string(), name });
    }
    Ok(devices)
}

/// BLE transport for cat printers.
///
/// Discovers the target device, connects with bounded retries for
/// transient failures, and streams the encoded job in small chunks.
pub struct BleTransport {
    device: Option<String>,
    chunk_size: usize,
    connect_timeout: Duration,
}

impl BleTransport {
    /// - `device`: optional device id, address or name; autodiscovery of
    ///   known printers when absent
    pub fn new(device: Option<String>) -> Self {
        Self {
            device,
            chunk_size: 180,
            connect_timeout: Duration::from_secs(10),
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    async fn transmit(&mut self, data: &[u8]) -> PrintResult<()> {
        let adapter = default_adapter().await?;
        let peripheral = discover_printer(&adapter, self.device.as_deref()).await?;
        connect_with_retry(&peripheral, self.connect_timeout).await?;
        peripheral.discover_services().await.map_err(transport_err)?;

        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.uuid == *PRINT_CHARACTERISTIC)
            .ok_or_else(|| {
                PrintError::Transport("printer write characteristic not found".into())
            })?;

        info!(bytes = data.len(), "transmitting print data");
        for chunk in chunk_data(data, self.chunk_size) {
            peripheral
                .write(&characteristic, chunk, WriteType::WithoutResponse)
                .await
                .map_err(transport_err)?;
            tokio::time::sleep(CHUNK_DELAY).await;
        }

        // let the printer drain its buffer before the link drops
        tokio::time::sleep(DRAIN_DELAY).await;
        let _ = peripheral.disconnect().await;
        info!("print data sent");
        Ok(())
    }
}

async fn default_adapter() -> PrintResult<Adapter> {
    let manager = Manager::new().await.map_err(transport_err)?;
    manager
        .adapters()
        .await
        .map_err(transport_err)?
        .into_iter()
        .next()
        .ok_or_else(|| PrintError::Transport("no bluetooth adapter found".into()))
}

/// Scans until a matching printer shows up or the discovery window closes.
async fn discover_printer(adapter: &Adapter, device: Option<&str>) -> PrintResult<Peripheral> {
    let mut events = adapter.events().await.map_err(transport_err)?;
    adapter.start_scan(ScanFilter::default()).await.map_err(transport_err)?;

    let deadline = tokio::time::sleep(DISCOVERY_TIMEOUT);
    tokio::pin!(deadline);
    // the adapter may already know the printer from an earlier scan
    let mut found = find_match(adapter, device).await?;
    while found.is_none() {
        tokio::select! {
            _ = &mut deadline => break,
            Some(event) = events.next() => {
                if matches!(
                    event,
                    CentralEvent::DeviceDiscovered(_) | CentralEvent::DeviceUpdated(_)
                ) {
                    found = find_match(adapter, device).await?;
                }
            }
        }
    }
    adapter.stop_scan().await.map_err(transport_err)?;

    found.ok_or_else(|| match device {
        Some(d) => PrintError::Transport(format!("device '{}' not found", d)),
        None => PrintError::Transport("no compatible printer found".into()),
    })
}

async fn find_match(adapter: &Adapter, device: Option<&str>) -> PrintResult<Option<Peripheral>> {
    for peripheral in adapter.peripherals().await.map_err(transport_err)? {
        let name = peripheral
            .properties()
            .await
            .ok()
            .flatten()
            .and_then(|p| p.local_name);
        let matched = match device {
            Some(filter) => {
                peripheral.id().to_string() == filter
                    || peripheral.address().to_string().eq_ignore_ascii_case(filter)
                    || name
                        .as_deref()
                        .is_some_and(|n| n.eq_ignore_ascii_case(filter))
            }
            None => name.as_deref().is_some_and(is_supported_printer),
        };
        if matched {
            info!(id = %peripheral.id(), ?name, "found printer");
            return Ok(Some(peripheral));
        }
    }
    Ok(None)
}

/// Whether an advertised name belongs to a known compatible printer.
fn is_supported_printer(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    SUPPORTED_NAMES.iter().any(|known| upper.starts_with(known))
}

async fn connect_with_retry(peripheral: &Peripheral, timeout: Duration) -> PrintResult<()> {
    let mut last_error = String::new();
    for attempt in 1..=CONNECT_ATTEMPTS {
        match tokio::time::timeout(timeout, peripheral.connect()).await {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => last_error = e.to_string(),
            Err(_) => last_error = format!("connect timed out after {:?}", timeout),
        }
        warn!(attempt, error = %last_error, "connect attempt failed");
    }
    Err(PrintError::Transport(format!(
        "could not connect after {} attempts: {}",
        CONNECT_ATTEMPTS, last_error
    )))
}

fn transport_err(e: btleplug::Error) -> PrintError {
    PrintError::Transport(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_printer_names_match() {
        assert!(is_supported_printer("MXW01"));
        assert!(is_supported_printer("gb01"));
        assert!(is_supported_printer("GT01-ABC123"));
        assert!(!is_supported_printer("JBL Speaker"));
    }

    #[test]
    fn print_characteristic_is_valid() {
        assert_eq!(
            PRINT_CHARACTERISTIC.to_string(),
            "0000ae01-0000-1000-8000-00805f9b34fb"
        );
    }
}
