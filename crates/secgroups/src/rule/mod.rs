//! Ingress rules: the normalized values the rule grammar produces and the
//! reconciler compares.
//!
//! A rule line such as `tcp port 80, 443 0.0.0.0/0` parses into a
//! [`RuleLine`] holding both port ranges; [`RuleLine::expand`] turns it into
//! one [`Rule`] per range, which is the unit everything downstream reasons
//! about.

pub mod parser;

pub use parser::{
    GrammarError, parse, parse_cidr, parse_line, parse_mask, parse_port_range, parse_ports,
    parse_target,
};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Transport protocol of a rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Icmp,
}

impl Protocol {
    /// Protocol name as used in rule text and API calls.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "tcp",
            Protocol::Udp => "udp",
            Protocol::Icmp => "icmp",
        }
    }

    /// Parse a protocol name. Only the lowercase forms are accepted.
    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "tcp" => Some(Protocol::Tcp),
            "udp" => Some(Protocol::Udp),
            "icmp" => Some(Protocol::Icmp),
            _ => None,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive port range. `from <= to` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPortRange")]
pub struct PortRange {
    from: u16,
    to: u16,
}

#[derive(Deserialize)]
struct RawPortRange {
    from: u16,
    to: u16,
}

impl TryFrom<RawPortRange> for PortRange {
    type Error = String;

    fn try_from(raw: RawPortRange) -> Result<Self, Self::Error> {
        Self::new(raw.from, raw.to)
            .ok_or_else(|| format!("port range {}-{} is inverted", raw.from, raw.to))
    }
}

impl PortRange {
    /// Create a range, returning `None` if `from > to`.
    pub fn new(from: u16, to: u16) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// A range covering a single port.
    pub fn single(port: u16) -> Self {
        Self {
            from: port,
            to: port,
        }
    }

    pub fn from(&self) -> u16 {
        self.from
    }

    pub fn to(&self) -> u16 {
        self.to
    }

    /// The range as a `(from, to)` pair.
    pub fn as_tuple(&self) -> (u16, u16) {
        (self.from, self.to)
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.from == self.to {
            write!(f, "{}", self.from)
        } else {
            write!(f, "{}-{}", self.from, self.to)
        }
    }
}

/// IPv4 address block. The mask is kept exactly as written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCidr")]
pub struct Cidr {
    addr: Ipv4Addr,
    mask: u8,
}

#[derive(Deserialize)]
struct RawCidr {
    addr: Ipv4Addr,
    mask: u8,
}

impl TryFrom<RawCidr> for Cidr {
    type Error = String;

    fn try_from(raw: RawCidr) -> Result<Self, Self::Error> {
        Self::new(raw.addr, raw.mask).ok_or_else(|| format!("mask /{} exceeds 32", raw.mask))
    }
}

impl Cidr {
    /// Create a block, returning `None` for masks above 32.
    pub fn new(addr: Ipv4Addr, mask: u8) -> Option<Self> {
        (mask <= 32).then_some(Self { addr, mask })
    }

    /// A single-host block (`/32`).
    pub fn host(addr: Ipv4Addr) -> Self {
        Self { addr, mask: 32 }
    }

    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }
}

impl fmt::Display for Cidr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.mask)
    }
}

/// A reference to another security group, as written in a rule.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRef {
    /// Literal remote identifier (`sg-...`), used as is
    Id(String),
    /// Logical group name, resolved against the desired and remote topology
    Name(String),
}

impl fmt::Display for GroupRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupRef::Id(id) => f.write_str(id),
            GroupRef::Name(name) => f.write_str(name),
        }
    }
}

/// Source of the traffic a rule lets in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Cidr(Cidr),
    Group(GroupRef),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Cidr(cidr) => write!(f, "{cidr}"),
            Target::Group(group) => write!(f, "{group}"),
        }
    }
}

/// One normalized ingress rule: protocol, a single port range, one target.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rule {
    pub protocol: Protocol,
    pub ports: PortRange,
    pub target: Target,
}

impl Rule {
    pub fn new(protocol: Protocol, ports: PortRange, target: Target) -> Self {
        Self {
            protocol,
            ports,
            target,
        }
    }

    /// Parse a rule line into its expanded rules.
    pub fn parse(text: &str) -> Result<Vec<Rule>, GrammarError> {
        parse(text)
    }

    pub fn from_port(&self) -> u16 {
        self.ports.from()
    }

    pub fn to_port(&self) -> u16 {
        self.ports.to()
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} port {} {}", self.protocol, self.ports, self.target)
    }
}

/// A parsed rule line before expansion: several port ranges sharing one
/// protocol and target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleLine {
    pub protocol: Protocol,
    pub ports: Vec<PortRange>,
    pub target: Target,
}

impl RuleLine {
    /// One rule per port range, in the order written.
    pub fn expand(&self) -> Vec<Rule> {
        self.ports
            .iter()
            .map(|range| Rule::new(self.protocol, *range, self.target.clone()))
            .collect()
    }
}

/// A group as seen from a rule after reference resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupHandle {
    /// Group exists remotely under this identifier
    Existing(String),
    /// Group will be created by the current plan; only its name is known
    Pending(String),
}

impl GroupHandle {
    /// Remote identifier, if the group exists.
    pub fn id(&self) -> Option<&str> {
        match self {
            GroupHandle::Existing(id) => Some(id),
            GroupHandle::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, GroupHandle::Pending(_))
    }
}

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupHandle::Existing(id) => f.write_str(id),
            GroupHandle::Pending(name) => write!(f, "(pending {name})"),
        }
    }
}

/// Target after reference resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolvedTarget {
    Cidr(Cidr),
    Group(GroupHandle),
}

impl fmt::Display for ResolvedTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedTarget::Cidr(cidr) => write!(f, "{cidr}"),
            ResolvedTarget::Group(handle) => write!(f, "{handle}"),
        }
    }
}

/// A rule whose target no longer depends on names. Remote rules and
/// resolved desired rules compare structurally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolvedRule {
    pub protocol: Protocol,
    pub ports: PortRange,
    pub target: ResolvedTarget,
}

impl ResolvedRule {
    pub fn new(protocol: Protocol, ports: PortRange, target: ResolvedTarget) -> Self {
        Self {
            protocol,
            ports,
            target,
        }
    }

    /// The grant to send to the API, or `None` while the source group is pending.
    pub fn grant(&self) -> Option<netkit::Grant> {
        match &self.target {
            ResolvedTarget::Cidr(cidr) => Some(netkit::Grant::Cidr(cidr.to_string())),
            ResolvedTarget::Group(GroupHandle::Existing(id)) => {
                Some(netkit::Grant::SourceGroup(id.clone()))
            }
            ResolvedTarget::Group(GroupHandle::Pending(_)) => None,
        }
    }
}

impl fmt::Display for ResolvedRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} port {} {}", self.protocol, self.ports, self.target)
    }
}
