//! Link layer addresses and IP prefixes.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::Layer2Error;

/// MAC-48 or EUI-64 link layer address
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkAddr {
    /// 6 byte MAC address
    Mac48([u8; 6]),
    /// 8 byte EUI-64
    Eui64([u8; 8]),
}

impl LinkAddr {
    /// Address bytes
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            LinkAddr::Mac48(b) => b,
            LinkAddr::Eui64(b) => b,
        }
    }
}

impl FromStr for LinkAddr {
    type Err = Layer2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Layer2Error::InvalidLinkAddr(s.to_string());

        let mut bytes = Vec::with_capacity(8);
        for part in s.split(|c| c == ':' || c == '-') {
            if part.len() != 2 {
                return Err(invalid());
            }
            bytes.push(u8::from_str_radix(part, 16).map_err(|_| invalid())?);
        }

        match bytes.len() {
            6 => {
                let mut mac = [0u8; 6];
                mac.copy_from_slice(&bytes);
                Ok(LinkAddr::Mac48(mac))
            }
            8 => {
                let mut eui = [0u8; 8];
                eui.copy_from_slice(&bytes);
                Ok(LinkAddr::Eui64(eui))
            }
            _ => Err(invalid()),
        }
    }
}

impl fmt::Display for LinkAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.as_bytes().iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl Serialize for LinkAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// IPv4 or IPv6 address with prefix length
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IpPrefix {
    addr: IpAddr,
    prefix_len: u8,
}

impl IpPrefix {
    /// Create a prefix, failing if the length exceeds the address size
    pub fn new(addr: IpAddr, prefix_len: u8) -> Result<Self, Layer2Error> {
        if prefix_len > max_prefix_len(&addr) {
            return Err(Layer2Error::InvalidPrefix(format!("{}/{}", addr, prefix_len)));
        }
        Ok(Self { addr, prefix_len })
    }

    /// Host prefix of a single address
    pub fn host(addr: IpAddr) -> Self {
        Self {
            addr,
            prefix_len: max_prefix_len(&addr),
        }
    }

    /// Network address
    pub fn addr(&self) -> IpAddr {
        self.addr
    }

    /// Prefix length in bits
    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    /// Whether `addr` lies inside this prefix
    pub fn contains(&self, addr: IpAddr) -> bool {
        match (self.addr, addr) {
            (IpAddr::V4(net), IpAddr::V4(a)) => {
                let mask = mask_u32(self.prefix_len);
                u32::from(net) & mask == u32::from(a) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(a)) => {
                let mask = mask_u128(self.prefix_len);
                u128::from(net) & mask == u128::from(a) & mask
            }
            _ => false,
        }
    }
}

fn max_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

fn mask_u32(len: u8) -> u32 {
    if len == 0 {
        0
    } else {
        u32::MAX << (32 - len as u32)
    }
}

fn mask_u128(len: u8) -> u128 {
    if len == 0 {
        0
    } else {
        u128::MAX << (128 - len as u32)
    }
}

impl FromStr for IpPrefix {
    type Err = Layer2Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || Layer2Error::InvalidPrefix(s.to_string());
        match s.split_once('/') {
            Some((addr, len)) => {
                let addr: IpAddr = addr.parse().map_err(|_| invalid())?;
                let len: u8 = len.parse().map_err(|_| invalid())?;
                Self::new(addr, len)
            }
            None => Ok(Self::host(s.parse().map_err(|_| invalid())?)),
        }
    }
}

impl fmt::Display for IpPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.prefix_len)
    }
}

impl Serialize for IpPrefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
