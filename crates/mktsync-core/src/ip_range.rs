// ── IPv4 range membership ──
//
// Scope ranges come from device address lists, where operators write them in
// whichever notation they like. Three notations are recognized, tried in
// this order:
//
//   CIDR       10.0.0.0/8, 10.0/8, 10.0.0.0/255.0.0.0, 10.0.0.0/255.*.*.*
//   wildcard   192.168.*.*
//   bounds     10.0.0.1-10.0.0.10
//
// All arithmetic is on `u32`, so ranges above 128.0.0.0 compare correctly.

use std::net::Ipv4Addr;
use std::str::FromStr;

use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeError {
    #[error(
        "range {0:?} is not in 1.2.3.4/24, 1.2.3.4/255.255.255.0, 1.2.3.* or 1.2.3.0-1.2.3.255 format"
    )]
    UnrecognizedFormat(String),

    #[error("invalid IPv4 address {0:?}")]
    InvalidAddress(String),

    #[error("invalid prefix length {0:?}")]
    InvalidPrefix(String),
}

/// A parsed scope range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkRange {
    /// Base address and netmask; membership is `addr & mask == base & mask`.
    Masked { base: u32, netmask: u32 },
    /// Inclusive numeric bounds.
    Bounds { lower: u32, upper: u32 },
}

impl NetworkRange {
    pub fn contains(&self, addr: Ipv4Addr) -> bool {
        let addr = u32::from(addr);
        match *self {
            Self::Masked { base, netmask } => addr & netmask == base & netmask,
            Self::Bounds { lower, upper } => (lower..=upper).contains(&addr),
        }
    }
}

impl FromStr for NetworkRange {
    type Err = RangeError;

    fn from_str(range: &str) -> Result<Self, Self::Err> {
        if let Some((base, mask)) = range.split_once('/') {
            return parse_masked(base, mask);
        }

        if range.contains('*') {
            let lower = range.replace('*', "0");
            let upper = range.replace('*', "255");
            return parse_bounds(&lower, &upper);
        }

        if let Some((lower, upper)) = range.split_once('-') {
            return parse_bounds(lower, upper);
        }

        Err(RangeError::UnrecognizedFormat(range.to_owned()))
    }
}

fn parse_masked(base: &str, mask: &str) -> Result<NetworkRange, RangeError> {
    let netmask = if mask.contains('.') {
        u32::from(parse_addr(&mask.replace('*', "0"))?)
    } else {
        let bits: u32 = mask
            .trim()
            .parse()
            .ok()
            .filter(|b| *b <= 32)
            .ok_or_else(|| RangeError::InvalidPrefix(mask.to_owned()))?;
        prefix_to_netmask(bits)
    };

    Ok(NetworkRange::Masked {
        base: u32::from(pad_base(base)?),
        netmask,
    })
}

fn parse_bounds(lower: &str, upper: &str) -> Result<NetworkRange, RangeError> {
    Ok(NetworkRange::Bounds {
        lower: u32::from(parse_addr(lower)?),
        upper: u32::from(parse_addr(upper)?),
    })
}

/// `~((1 << (32 - bits)) - 1)`, without overflowing at `/0`.
fn prefix_to_netmask(bits: u32) -> u32 {
    u32::MAX.checked_shl(32 - bits).unwrap_or(0)
}

/// Accept a short base such as `10.1` as `10.1.0.0`. Empty octets read as 0.
fn pad_base(base: &str) -> Result<Ipv4Addr, RangeError> {
    let parts: Vec<&str> = base.trim().split('.').collect();
    if parts.len() > 4 {
        return Err(RangeError::InvalidAddress(base.to_owned()));
    }

    let mut octets = [0u8; 4];
    for (slot, part) in octets.iter_mut().zip(&parts) {
        if !part.is_empty() {
            *slot = part
                .parse()
                .map_err(|_| RangeError::InvalidAddress(base.to_owned()))?;
        }
    }
    Ok(Ipv4Addr::from(octets))
}

fn parse_addr(raw: &str) -> Result<Ipv4Addr, RangeError> {
    raw.trim()
        .parse()
        .map_err(|_| RangeError::InvalidAddress(raw.to_owned()))
}

/// Whether `address` falls inside `range`.
///
/// Malformed input is logged and treated as "not in range".
pub fn ip_in_range(address: &str, range: &str) -> bool {
    let addr = match parse_addr(address) {
        Ok(addr) => addr,
        Err(e) => {
            warn!(address, error = %e, "cannot test address against scope range");
            return false;
        }
    };

    match range.parse::<NetworkRange>() {
        Ok(parsed) => parsed.contains(addr),
        Err(e) => {
            warn!(range, error = %e, "ignoring scope range");
            false
        }
    }
}
