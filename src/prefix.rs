use std::cmp::Ordering;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use ipnetwork::{IpNetwork, Ipv6Network};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::shared::ParseError;

pub const MAX_LENGTH: u8 = 128;

/// An IPv6 CIDR block with its host bits cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Prefix {
    base: u128,
    length: u8,
}

fn netmask(length: u8) -> u128 {
    if length == 0 {
        0
    } else {
        u128::MAX << (MAX_LENGTH - length)
    }
}

impl Prefix {
    /// Builds a prefix, clearing every bit of `base` beyond `length`.
    pub fn new(base: u128, length: u8) -> Result<Self, ParseError> {
        if length > MAX_LENGTH {
            return Err(ParseError::InvalidLength(length));
        }
        Ok(Prefix {
            base: base & netmask(length),
            length,
        })
    }

    pub fn from_network(network: Ipv6Network) -> Self {
        Prefix {
            base: u128::from(network.network()),
            length: network.prefix(),
        }
    }

    pub fn base(&self) -> u128 {
        self.base
    }

    pub fn length(&self) -> u8 {
        self.length
    }

    pub fn network_address(&self) -> Ipv6Addr {
        Ipv6Addr::from(self.base)
    }

    /// Bit `index` of the base address, counted from the most significant bit.
    pub fn bit(&self, index: u8) -> bool {
        debug_assert!(index < MAX_LENGTH);
        (self.base >> (MAX_LENGTH - 1 - index)) & 1 == 1
    }

    /// True when `other` lies inside this block (a prefix contains itself).
    pub fn contains(&self, other: &Prefix) -> bool {
        other.length >= self.length && other.base & netmask(self.length) == self.base
    }

    /// The same-length block that together with this one forms the
    /// enclosing prefix one bit shorter.
    pub fn sibling(&self) -> Option<Prefix> {
        if self.length == 0 {
            return None;
        }
        Some(Prefix {
            base: self.base ^ (1u128 << (MAX_LENGTH - self.length)),
            length: self.length,
        })
    }
}

impl Ord for Prefix {
    fn cmp(&self, other: &Self) -> Ordering {
        self.length
            .cmp(&other.length)
            .then_with(|| self.base.cmp(&other.base))
    }
}

impl PartialOrd for Prefix {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl FromStr for Prefix {
    type Err = ParseError;

    /// Parses CIDR notation. Host bits are masked off; a bare address is
    /// read as a /128.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match IpNetwork::from_str(trimmed) {
            Ok(IpNetwork::V6(network)) => Ok(Prefix::from_network(network)),
            Ok(IpNetwork::V4(_)) => Err(ParseError::NotIpv6(trimmed.to_string())),
            Err(_) => Err(ParseError::InvalidPrefix(trimmed.to_string())),
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_address(), self.length)
    }
}

impl Serialize for Prefix {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Prefix {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_masks_host_bits() {
        let prefix: Prefix = "2001:db8::1/32".parse().unwrap();
        assert_eq!(prefix, "2001:db8::/32".parse().unwrap());
        assert_eq!(prefix.to_string(), "2001:db8::/32");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!(matches!("2001:db8::/129".parse::<Prefix>(), Err(ParseError::InvalidPrefix(_))));
        assert!(matches!("not a prefix".parse::<Prefix>(), Err(ParseError::InvalidPrefix(_))));
        assert!(matches!("10.0.0.0/8".parse::<Prefix>(), Err(ParseError::NotIpv6(_))));
        assert_eq!(Prefix::new(0, 129), Err(ParseError::InvalidLength(129)));
    }

    #[test]
    fn test_ordering_is_length_then_base() {
        let mut prefixes: Vec<Prefix> = ["2001:db9::/48", "2001:db8::/48", "2001:db8::/32"]
            .iter()
            .map(|s| s.parse().unwrap())
            .collect();
        prefixes.sort();

        let rendered: Vec<String> = prefixes.iter().map(|p| p.to_string()).collect();
        assert_eq!(rendered, vec!["2001:db8::/32", "2001:db8::/48", "2001:db9::/48"]);
    }

    #[test]
    fn test_sibling() {
        let lower: Prefix = "2001:db8::/33".parse().unwrap();
        let upper: Prefix = "2001:db8:8000::/33".parse().unwrap();

        assert_eq!(lower.sibling(), Some(upper));
        assert_eq!(upper.sibling(), Some(lower));
        assert_eq!(upper.base() - lower.base(), 1u128 << 95);
        assert_eq!(Prefix::new(0, 0).unwrap().sibling(), None);
    }

    #[test]
    fn test_contains() {
        let wide: Prefix = "2001:db8::/32".parse().unwrap();
        let narrow: Prefix = "2001:db8:ff::/48".parse().unwrap();
        let outside: Prefix = "2001:db9::/48".parse().unwrap();

        assert!(wide.contains(&narrow));
        assert!(wide.contains(&wide));
        assert!(!narrow.contains(&wide));
        assert!(!wide.contains(&outside));
    }
}
