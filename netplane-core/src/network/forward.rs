//! Address forward validation.

use super::common::NetworkCommon;
use crate::error::{NetplaneError, Result};
use crate::network::keys::{is_user_config, split_list};
use crate::types::forward::TARGET_ADDRESS_KEY;
use crate::types::{ForwardPortMap, NetworkForwardPut, Protocol};
use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;
use std::ops::RangeInclusive;

/// Parse a single port (`"80"`) or port range (`"8000-8010"`).
pub fn parse_port_range(range: &str) -> Result<RangeInclusive<u16>> {
    let invalid = |reason: &str| NetplaneError::InvalidPortRange {
        range: range.to_string(),
        reason: reason.to_string(),
    };

    let mut parts = range.split('-');
    let first = parts.next().unwrap_or_default();
    let last = parts.next();
    if parts.next().is_some() {
        return Err(invalid("Only one '-' allowed in port range"));
    }

    let start: u16 = first.parse().map_err(|_| invalid("Invalid port number"))?;

    let Some(last) = last else {
        return Ok(start..=start);
    };

    let end: u16 = last.parse().map_err(|_| invalid("Invalid port number"))?;
    if end <= start {
        return Err(invalid("End port should be higher than start port"));
    }

    Ok(start..=end)
}

fn parse_ports(ports: &str) -> Result<Vec<u16>> {
    let mut expanded = Vec::new();
    for token in split_list(ports) {
        expanded.extend(parse_port_range(token)?);
    }
    Ok(expanded)
}

impl NetworkCommon {
    /// Network subnet of the same family as `addr`, if one is configured.
    fn subnet_for(&self, addr: &IpAddr) -> Result<Option<IpNet>> {
        let key = if addr.is_ipv4() { "ipv4.address" } else { "ipv6.address" };

        match self.config.get(key).map(String::as_str) {
            None | Some("") | Some("none") => Ok(None),
            Some(value) => value.parse::<IpNet>().map(|n| Some(n.trunc())).map_err(|_| {
                NetplaneError::InvalidValue {
                    network: self.name.clone(),
                    key: key.to_string(),
                    reason: format!("Not a CIDR address {:?}", value),
                }
            }),
        }
    }

    /// Validate a forward on `listen_address` and expand its port specifications.
    ///
    /// Returns one port map per port specification, in order.
    pub fn forward_validate(
        &self,
        listen_address: &str,
        forward: &NetworkForwardPut,
    ) -> Result<Vec<ForwardPortMap>> {
        let invalid = |reason: String| NetplaneError::InvalidForward { reason };

        let listen: IpAddr =
            listen_address.parse().map_err(|_| invalid("Invalid listen address".to_string()))?;
        let listen_v4 = listen.is_ipv4();

        let subnet = self.subnet_for(&listen)?;

        for key in forward.config.keys() {
            if key != TARGET_ADDRESS_KEY && !is_user_config(key) {
                return Err(invalid(format!("Invalid option {:?}", key)));
            }
        }

        let default_target = match forward.config.get(TARGET_ADDRESS_KEY).map(String::as_str) {
            None | Some("") => None,
            Some(value) => {
                let addr: IpAddr = value
                    .parse()
                    .map_err(|_| invalid("Invalid default target address".to_string()))?;

                if addr.is_ipv4() != listen_v4 {
                    return Err(invalid(
                        "Cannot mix IP versions in listen address and default target address"
                            .to_string(),
                    ));
                }

                if subnet.is_some_and(|s| !s.contains(&addr)) {
                    return Err(invalid(
                        "Default target address is not within the network subnet".to_string(),
                    ));
                }

                Some(addr)
            }
        };

        let mut used: HashSet<(Protocol, u16)> = HashSet::new();
        let mut port_maps = Vec::with_capacity(forward.ports.len());

        for (spec, port) in forward.ports.iter().enumerate() {
            let protocol: Protocol = port.protocol.parse().map_err(|_| {
                invalid(format!(
                    "Invalid port protocol in port specification {}, protocol must be one of: tcp, udp",
                    spec
                ))
            })?;

            let target: IpAddr = port.target_address.parse().map_err(|_| {
                invalid(format!("Invalid target address in port specification {}", spec))
            })?;

            if Some(target) == default_target {
                return Err(invalid(format!(
                    "Target address is same as default target address in port specification {}",
                    spec
                )));
            }

            if target.is_ipv4() != listen_v4 {
                return Err(invalid(format!(
                    "Cannot mix IP versions in listen address and port specification {} target address",
                    spec
                )));
            }

            if subnet.is_some_and(|s| !s.contains(&target)) {
                return Err(invalid(format!(
                    "Target address is not within the network subnet in port specification {}",
                    spec
                )));
            }

            if split_list(&port.listen_port).is_empty() {
                return Err(invalid(format!("Missing listen port in port specification {}", spec)));
            }

            let listen_ports = parse_ports(&port.listen_port).map_err(|e| {
                invalid(format!("Invalid listen port in port specification {}: {}", spec, e))
            })?;

            for &listen_port in &listen_ports {
                if !used.insert((protocol, listen_port)) {
                    return Err(NetplaneError::DuplicateListenPort {
                        port: listen_port,
                        protocol: protocol.to_string(),
                        spec,
                    });
                }
            }

            let target_ports = parse_ports(&port.target_port).map_err(|e| {
                invalid(format!("Invalid target port in port specification {}: {}", spec, e))
            })?;

            // A single target port takes traffic from every listen port.
            if !target_ports.is_empty()
                && target_ports.len() != 1
                && target_ports.len() != listen_ports.len()
            {
                return Err(invalid(format!(
                    "Mismatch of listen port(s) and target port(s) count in port specification {}",
                    spec
                )));
            }

            port_maps.push(ForwardPortMap {
                listen_ports,
                target_ports,
                target_address: target,
                protocol,
            });
        }

        Ok(port_maps)
    }
}
