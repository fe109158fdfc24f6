// Network stats scraping from the kernel's /proc/net/dev text layout.

use crate::error::ScrapeError;
use std::io::Read;

/// Interface used when the selector is empty.
pub const DEFAULT_INTERFACE: &str = "eth0";

/// Column of received bytes on a /proc/net/dev line (after the "iface:" field).
const RECEIVED_BYTES_FIELD: usize = 1;
/// Column of transmitted bytes: 8 receive columns precede it.
const TRANSMITTED_BYTES_FIELD: usize = 9;

/// Received/transmitted byte counters for one interface, as read from a single scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NetworkStats {
    pub received_bytes: u64,
    pub transmitted_bytes: u64,
}

impl NetworkStats {
    /// Cumulative counter for the interface: received + transmitted.
    pub fn total(&self) -> u64 {
        self.received_bytes.wrapping_add(self.transmitted_bytes)
    }
}

/// Parses a stats blob into [`NetworkStats`]. Must not keep the reader after returning.
pub trait NetworkStatsScraper: Send + Sync {
    fn scrape(&self, data: &mut dyn Read) -> Result<NetworkStats, ScrapeError>;
}

/// Scraper for the Linux network devices file (`/proc/net/dev`).
///
/// The first line containing `"<interface>:"` wins. This is a substring match,
/// so `eth0` also matches a line for `veth0:` if it comes first.
#[derive(Debug, Clone)]
pub struct NetDevScraper {
    interface: String,
}

impl Default for NetDevScraper {
    fn default() -> Self {
        Self::new(DEFAULT_INTERFACE)
    }
}

impl NetDevScraper {
    pub fn new(interface: impl Into<String>) -> Self {
        let interface = interface.into();
        let interface = if interface.is_empty() {
            DEFAULT_INTERFACE.to_string()
        } else {
            interface
        };
        Self { interface }
    }

    pub fn interface(&self) -> &str {
        &self.interface
    }

    fn field(&self, fields: &[&str], index: usize) -> Result<u64, ScrapeError> {
        let raw = fields.get(index).ok_or_else(|| ScrapeError::MissingField {
            interface: self.interface.clone(),
            index,
        })?;
        raw.parse::<u64>().map_err(|_| ScrapeError::InvalidField {
            interface: self.interface.clone(),
            index,
            value: (*raw).to_string(),
        })
    }
}

impl NetworkStatsScraper for NetDevScraper {
    fn scrape(&self, data: &mut dyn Read) -> Result<NetworkStats, ScrapeError> {
        // Interface names are arbitrary bytes; one odd device must not hide the others.
        let mut raw = Vec::new();
        data.read_to_end(&mut raw).map_err(ScrapeError::Read)?;
        let content = String::from_utf8_lossy(&raw);

        let needle = format!("{}:", self.interface);
        let line = content
            .lines()
            .find(|line| line.contains(&needle))
            .ok_or_else(|| ScrapeError::InterfaceNotFound {
                interface: self.interface.clone(),
            })?;

        let fields: Vec<&str> = line.split_whitespace().collect();
        Ok(NetworkStats {
            received_bytes: self.field(&fields, RECEIVED_BYTES_FIELD)?,
            transmitted_bytes: self.field(&fields, TRANSMITTED_BYTES_FIELD)?,
        })
    }
}
