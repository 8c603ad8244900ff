// ABOUTME: Port publication entries: `[hostIp:]hostPort:containerPort[/proto]`.
// ABOUTME: A bare container port is exposed and the engine picks the host port.

use crate::error::{Error, Result};
use crate::runtime::{PortMapping, Protocol};

pub fn parse_port(entry: &str) -> Result<PortMapping> {
    let parts: Vec<&str> = entry.split(':').collect();
    let (host_ip, host_port, container) = match parts.as_slice() {
        [container] => ("", "", *container),
        [host_port, container] => ("", *host_port, *container),
        [host_ip, host_port, container] => (*host_ip, *host_port, *container),
        _ => return Err(invalid(entry)),
    };

    let (container_port, protocol) = if let Some(port) = container.strip_suffix("/udp") {
        (port, Protocol::Udp)
    } else if let Some(port) = container.strip_suffix("/tcp") {
        (port, Protocol::Tcp)
    } else {
        (container, Protocol::Tcp)
    };

    if container_port.is_empty() {
        return Err(invalid(entry));
    }

    Ok(PortMapping {
        host_ip: host_ip.to_string(),
        host_port: (!host_port.is_empty()).then(|| host_port.to_string()),
        container_port: container_port.to_string(),
        protocol,
    })
}

fn invalid(entry: &str) -> Error {
    Error::Config(format!(
        "invalid port \"{}\", expected [hostIp:]hostPort:containerPort[/proto]",
        entry
    ))
}
