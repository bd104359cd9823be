//! Hardware resource types
//!
//! A Hardware resource describes one physical machine: its network
//! interfaces with their DHCP records and netboot policy. Workers are
//! identified by the MAC address of a Hardware interface.

use crate::{CrdError, ObjectMeta, Result, TypeMeta};
use serde::{Deserialize, Serialize};

/// Hardware resource representing a physical machine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Hardware {
    /// Type metadata (apiVersion, kind)
    #[serde(flatten)]
    pub type_meta: TypeMeta,

    /// Object metadata (name, namespace, uid, etc.)
    pub metadata: ObjectMeta,

    /// Hardware specification
    pub spec: HardwareSpec,
}

impl Hardware {
    /// Create a new Hardware resource
    pub fn new(name: impl Into<String>, spec: HardwareSpec) -> Self {
        Self {
            type_meta: TypeMeta::hardware(),
            metadata: ObjectMeta::new(name),
            spec,
        }
    }

    /// All MAC addresses carried by this hardware's interfaces
    pub fn macs(&self) -> impl Iterator<Item = &str> {
        self.spec
            .interfaces
            .iter()
            .filter_map(|iface| iface.dhcp.as_ref())
            .map(|dhcp| dhcp.mac.as_str())
    }

    /// All IP addresses carried by this hardware's interfaces
    pub fn ips(&self) -> impl Iterator<Item = &str> {
        self.spec
            .interfaces
            .iter()
            .filter_map(|iface| iface.dhcp.as_ref())
            .filter_map(|dhcp| dhcp.ip.as_ref())
            .map(|ip| ip.address.as_str())
    }

    /// The primary MAC address (first interface)
    pub fn primary_mac(&self) -> Option<&str> {
        self.macs().next()
    }

    /// Validate the hardware resource
    pub fn validate(&self) -> Result<()> {
        if self.metadata.name.is_empty() {
            return Err(CrdError::MissingField("metadata.name".to_string()));
        }
        if self.spec.interfaces.is_empty() {
            return Err(CrdError::MissingField("spec.interfaces".to_string()));
        }
        for (i, iface) in self.spec.interfaces.iter().enumerate() {
            if let Some(dhcp) = &iface.dhcp {
                dhcp.validate().map_err(|e| CrdError::InvalidFieldValue {
                    field: format!("spec.interfaces[{}].dhcp", i),
                    message: e.to_string(),
                })?;
            }
        }
        Ok(())
    }
}

/// Hardware specification
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HardwareSpec {
    /// Network interface specifications
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

impl HardwareSpec {
    /// Create a spec with a single DHCP interface
    pub fn new(mac: impl Into<String>) -> Self {
        Self {
            interfaces: vec![Interface {
                dhcp: Some(Dhcp::new(mac)),
                netboot: None,
            }],
        }
    }

    /// Builder method to set the IP on the first interface
    pub fn with_ip(mut self, address: impl Into<String>) -> Self {
        if let Some(iface) = self.interfaces.first_mut() {
            if let Some(dhcp) = &mut iface.dhcp {
                dhcp.ip = Some(Ip {
                    address: address.into(),
                    gateway: None,
                    netmask: None,
                });
            }
        }
        self
    }

    /// Builder method to set the hostname on the first interface
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        if let Some(iface) = self.interfaces.first_mut() {
            if let Some(dhcp) = &mut iface.dhcp {
                dhcp.hostname = Some(hostname.into());
            }
        }
        self
    }

    /// Builder method to allow netboot on the first interface
    pub fn with_netboot_allowed(mut self) -> Self {
        if let Some(iface) = self.interfaces.first_mut() {
            iface.netboot = Some(Netboot {
                allow_pxe: Some(true),
                allow_workflow: Some(true),
            });
        }
        self
    }
}

/// A network interface
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Interface {
    /// DHCP record for this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp: Option<Dhcp>,

    /// Netboot policy for this interface
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netboot: Option<Netboot>,
}

/// DHCP record: MAC, optional IP, optional hostname
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Dhcp {
    /// MAC address (lowercase, colon-separated)
    pub mac: String,

    /// Assigned IP
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<Ip>,

    /// Hostname
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
}

impl Dhcp {
    /// Create a DHCP record for a MAC address
    pub fn new(mac: impl Into<String>) -> Self {
        Self {
            mac: mac.into(),
            ip: None,
            hostname: None,
        }
    }

    /// Validate the record
    pub fn validate(&self) -> Result<()> {
        if !is_valid_mac(&self.mac) {
            return Err(CrdError::InvalidMacAddress(self.mac.clone()));
        }
        Ok(())
    }
}

/// An IP assignment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ip {
    pub address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub netmask: Option<String>,
}

/// Netboot policy
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Netboot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_pxe: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub allow_workflow: Option<bool>,
}

fn is_valid_mac(mac: &str) -> bool {
    let parts: Vec<&str> = mac.split(':').collect();
    parts.len() == 6
        && parts
            .iter()
            .all(|p| p.len() == 2 && p.chars().all(|c| c.is_ascii_hexdigit()))
}
