//! Parser for the rule description language.
//!
//! ```text
//! rule       := protocol "port" ports target
//! protocol   := "tcp" | "udp" | "icmp"
//! ports      := port_range ("," port_range)*
//! port_range := NUMBER ["-" NUMBER]
//! target     := cidr | group_ref
//! cidr       := IPV4 ["/" NUMBER]
//! group_ref  := IDENTIFIER | "sg-" HEX+
//! ```
//!
//! Examples: `tcp port 80 192.168.1.1/32`, `tcp port 80, 100 10.0.0.1`,
//! `tcp port 100-110 web_server`, `udp port 53 sg-edcd9784`.

use super::{Cidr, GroupRef, PortRange, Protocol, Rule, RuleLine, Target};
use regex::Regex;
use std::net::Ipv4Addr;
use std::sync::LazyLock;
use thiserror::Error;

static GROUP_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^sg-[0-9a-fA-F]+$").expect("Invalid group id pattern"));

static GROUP_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").expect("Invalid group name pattern")
});

/// A rule line (or part of one) that does not follow the grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid rule fragment '{fragment}': {reason}")]
pub struct GrammarError {
    /// The offending piece of input
    pub fragment: String,
    /// What was expected instead
    pub reason: String,
}

impl GrammarError {
    fn new(fragment: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            reason: reason.into(),
        }
    }
}

/// Parse a rule line and expand it into one rule per port range.
pub fn parse(text: &str) -> Result<Vec<Rule>, GrammarError> {
    Ok(parse_line(text)?.expand())
}

/// Parse a rule line, keeping its port ranges together.
pub fn parse_line(text: &str) -> Result<RuleLine, GrammarError> {
    let text = text.trim();
    let tokens: Vec<&str> = text.split_whitespace().collect();

    let Some(first) = tokens.first() else {
        return Err(GrammarError::new(text, "empty rule"));
    };
    let protocol = Protocol::from_name(first)
        .ok_or_else(|| GrammarError::new(*first, "unknown protocol, expected tcp, udp or icmp"))?;

    match tokens.get(1) {
        Some(&"port") => {}
        Some(other) => return Err(GrammarError::new(*other, "expected 'port' after protocol")),
        None => return Err(GrammarError::new(text, "expected 'port' after protocol")),
    }

    if tokens.len() < 4 {
        return Err(GrammarError::new(text, "expected a port list followed by a target"));
    }

    let target_token = tokens[tokens.len() - 1];
    let ports_text = tokens[2..tokens.len() - 1].join(" ");

    let ports = parse_ports(&ports_text)?;
    let target = parse_target(target_token)?;

    Ok(RuleLine {
        protocol,
        ports,
        target,
    })
}

/// Parse a comma-separated port list such as `22, 80-100`.
pub fn parse_ports(text: &str) -> Result<Vec<PortRange>, GrammarError> {
    text.split(',')
        .map(|piece| {
            let piece = piece.trim();
            if piece.is_empty() {
                Err(GrammarError::new(text.trim(), "empty entry in port list"))
            } else {
                parse_port_range(piece)
            }
        })
        .collect()
}

/// Parse `P` into `(P, P)` or `A-B` into `(A, B)`.
pub fn parse_port_range(text: &str) -> Result<PortRange, GrammarError> {
    let text = text.trim();
    match text.split_once('-') {
        Some((from, to)) => {
            let from = parse_port(from.trim(), text)?;
            let to = parse_port(to.trim(), text)?;
            PortRange::new(from, to)
                .ok_or_else(|| GrammarError::new(text, "range start is greater than range end"))
        }
        None => Ok(PortRange::single(parse_port(text, text)?)),
    }
}

fn parse_port(digits: &str, fragment: &str) -> Result<u16, GrammarError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GrammarError::new(fragment, "expected a port number"));
    }
    digits
        .parse()
        .map_err(|_| GrammarError::new(fragment, "port number out of range (0-65535)"))
}

/// Parse an IPv4 address with an optional mask; a bare address becomes `/32`.
pub fn parse_cidr(text: &str) -> Result<Cidr, GrammarError> {
    let text = text.trim();
    let (addr_text, mask) = match text.find('/') {
        Some(pos) => (&text[..pos], parse_mask(&text[pos..])?),
        None => (text, 32),
    };

    let addr: Ipv4Addr = addr_text
        .parse()
        .map_err(|_| GrammarError::new(text, "invalid IPv4 address"))?;

    Cidr::new(addr, mask).ok_or_else(|| GrammarError::new(text, "mask must be between 0 and 32"))
}

/// Parse a mask written as `/N`.
pub fn parse_mask(text: &str) -> Result<u8, GrammarError> {
    let text = text.trim();
    let digits = text
        .strip_prefix('/')
        .ok_or_else(|| GrammarError::new(text, "mask must start with '/'"))?;

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(GrammarError::new(text, "expected a mask length"));
    }
    match digits.parse::<u8>() {
        Ok(mask) if mask <= 32 => Ok(mask),
        _ => Err(GrammarError::new(text, "mask must be between 0 and 32")),
    }
}

/// Classify a target token as a CIDR, a group id, or a group name.
pub fn parse_target(token: &str) -> Result<Target, GrammarError> {
    let token = token.trim();

    if GROUP_ID.is_match(token) {
        return Ok(Target::Group(GroupRef::Id(token.to_string())));
    }
    if token.starts_with(|c: char| c.is_ascii_digit()) {
        return parse_cidr(token).map(Target::Cidr);
    }
    if GROUP_NAME.is_match(token) {
        return Ok(Target::Group(GroupRef::Name(token.to_string())));
    }

    Err(GrammarError::new(
        token,
        "expected an IPv4 address, a group id (sg-...) or a group name",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cidr(text: &str) -> Target {
        Target::Cidr(parse_cidr(text).unwrap())
    }

    #[test]
    fn test_tcp_with_ip() {
        let line = parse_line("tcp port 80 192.168.1.1/32").unwrap();
        assert_eq!(line.protocol, Protocol::Tcp);
        assert_eq!(line.target.to_string(), "192.168.1.1/32");
        assert_eq!(line.ports[0].as_tuple(), (80, 80));
    }

    #[test]
    fn test_icmp_and_udp_protocols() {
        let rules = parse("icmp port 0 10.0.0.0/8").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].protocol, Protocol::Icmp);
        assert_eq!(rules[0].ports.as_tuple(), (0, 0));
        assert_eq!(rules[0].target, cidr("10.0.0.0/8"));

        let line = parse_line("udp port 53 dns").unwrap();
        assert_eq!(line.protocol, Protocol::Udp);
    }

    #[test]
    fn test_multiple_ports_expand_to_separate_rules() {
        let rules = parse("tcp port 80, 100 192.168.1.1/32").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].ports.as_tuple(), (80, 80));
        assert_eq!(rules[1].ports.as_tuple(), (100, 100));
        assert_eq!(rules[0].target, cidr("192.168.1.1/32"));
        assert_eq!(rules[1].target, cidr("192.168.1.1/32"));
        assert!(rules.iter().all(|r| r.protocol == Protocol::Tcp));
    }

    #[test]
    fn test_single_rule() {
        let rules = Rule::parse("tcp port 80 127.0.0.1/32").unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].from_port(), 80);
        assert_eq!(rules[0].to_port(), 80);
    }

    #[test]
    fn test_group_name_target() {
        let rules = parse("tcp port 100-110 web_server").unwrap();
        assert_eq!(rules[0].ports.as_tuple(), (100, 110));
        assert_eq!(rules[0].target, Target::Group(GroupRef::Name("web_server".into())));
    }

    #[test]
    fn test_group_id_target_kept_literal() {
        let rules = parse("tcp port 80 sg-edcd9784").unwrap();
        assert_eq!(rules[0].target, Target::Group(GroupRef::Id("sg-edcd9784".into())));
    }

    #[test]
    fn test_non_hex_sg_prefix_is_a_name() {
        let target = parse_target("sg-backend").unwrap();
        assert_eq!(target, Target::Group(GroupRef::Name("sg-backend".into())));
    }

    #[test]
    fn test_ip_no_mask_defaults_to_32() {
        assert_eq!(parse_cidr("192.168.1.1").unwrap().to_string(), "192.168.1.1/32");
    }

    #[test]
    fn test_ip_with_mask_preserved() {
        assert_eq!(parse_cidr("192.168.1.1/32").unwrap().to_string(), "192.168.1.1/32");
        // Host bits are kept as written
        assert_eq!(parse_cidr("10.1.2.3/8").unwrap().to_string(), "10.1.2.3/8");
        assert_eq!(parse_cidr("0.0.0.0/0").unwrap().mask(), 0);
    }

    #[test]
    fn test_mask() {
        assert_eq!(parse_mask("/32").unwrap(), 32);
        assert!(parse_mask("32").is_err());
        assert!(parse_mask("/33").is_err());
        assert!(parse_mask("/").is_err());
    }

    #[test]
    fn test_single_port() {
        assert_eq!(parse_port_range("80").unwrap().as_tuple(), (80, 80));
    }

    #[test]
    fn test_port_range() {
        assert_eq!(parse_port_range("80-100").unwrap().as_tuple(), (80, 100));
    }

    #[test]
    fn test_port_and_range() {
        let ports = parse_ports("22, 80-100").unwrap();
        assert_eq!(ports[0].as_tuple(), (22, 22));
        assert_eq!(ports[1].as_tuple(), (80, 100));
    }

    #[test]
    fn test_double_range() {
        let ports = parse_ports("10-20, 80-100").unwrap();
        assert_eq!(ports[0].as_tuple(), (10, 20));
        assert_eq!(ports[1].as_tuple(), (80, 100));
    }

    #[test]
    fn test_inverted_range_fails() {
        let err = parse("tcp port 100-80 10.0.0.1").unwrap_err();
        assert_eq!(err.fragment, "100-80");
    }

    #[test]
    fn test_port_out_of_range_fails() {
        let err = parse_port_range("70000").unwrap_err();
        assert_eq!(err.fragment, "70000");
    }

    #[test]
    fn test_unknown_protocol_fails() {
        let err = parse("sctp port 80 10.0.0.1").unwrap_err();
        assert_eq!(err.fragment, "sctp");
    }

    #[test]
    fn test_missing_protocol_fails() {
        let err = parse("port 80 192.168.1.1").unwrap_err();
        assert_eq!(err.fragment, "port");
    }

    #[test]
    fn test_missing_port_keyword_fails() {
        let err = parse("tcp 80 10.0.0.1").unwrap_err();
        assert_eq!(err.fragment, "80");
    }

    #[test]
    fn test_missing_target_fails() {
        assert!(parse("tcp port 80").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_ports_without_comma_fail() {
        let err = parse("tcp port 80 443 10.0.0.1").unwrap_err();
        assert_eq!(err.fragment, "80 443");
    }

    #[test]
    fn test_trailing_comma_fails() {
        assert!(parse("tcp port 80, web").is_err());
    }

    #[test]
    fn test_malformed_ip_fails() {
        let err = parse("tcp port 22 10.0.0/24").unwrap_err();
        assert_eq!(err.fragment, "10.0.0/24");
        let err = parse("tcp port 22 300.1.1.1").unwrap_err();
        assert_eq!(err.fragment, "300.1.1.1");
        let err = parse("tcp port 22 10.0.0.1/40").unwrap_err();
        assert_eq!(err.fragment, "/40");
    }

    #[test]
    fn test_invalid_target_token_fails() {
        let err = parse("tcp port 22 web$server").unwrap_err();
        assert_eq!(err.fragment, "web$server");
    }

    #[test]
    fn test_extra_whitespace_is_ignored() {
        let rules = parse("  udp   port  53 ,54   10.0.0.2 ").unwrap();
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[1].ports.as_tuple(), (54, 54));
        assert_eq!(rules[0].protocol, Protocol::Udp);
    }

    #[test]
    fn test_error_message_names_fragment() {
        let err = parse("tcp port x 10.0.0.1").unwrap_err();
        assert_eq!(err.to_string(), "invalid rule fragment 'x': expected a port number");
    }
}
