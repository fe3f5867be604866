//! Works out which address the phone should dial.
//!
//! The listener binds `0.0.0.0`, which is not an address a phone can use.
//! The address shown on screen and put into the pairing payload is the first
//! non-loopback IPv4 address found on the machine's network interfaces.
//! Interfaces that only exist for containers or VMs are used only when
//! nothing else is up.
//!
//! When no interface qualifies the host falls back to `"localhost"`, which
//! still works for a client on the same machine.

use std::net::IpAddr;

use tracing::debug;

/// Fallback shown when no LAN address can be determined.
pub const FALLBACK_HOST: &str = "localhost";

/// Name prefixes of bridges and tunnels a phone cannot reach.
const VIRTUAL_PREFIXES: &[&str] = &[
    "docker", "veth", "br-", "virbr", "vmnet", "vboxnet", "tun", "utun", "zt", "tailscale",
];

/// Returns the LAN IPv4 address to advertise, if any.
pub fn detect_lan_ip() -> Option<IpAddr> {
    match local_ip_address::list_afinet_netifas() {
        Ok(interfaces) => pick_lan_ip(&interfaces),
        Err(e) => {
            debug!("interface listing failed ({e}); asking for the default address");
            local_ip_address::local_ip()
                .ok()
                .filter(|ip| usable(ip))
        }
    }
}

/// Picks the first usable IPv4 address, preferring physical interfaces.
fn pick_lan_ip(interfaces: &[(String, IpAddr)]) -> Option<IpAddr> {
    let candidates = || interfaces.iter().filter(|(_, ip)| usable(ip));
    candidates()
        .find(|(name, _)| !is_virtual(name))
        .or_else(|| candidates().next())
        .map(|(name, ip)| {
            debug!("advertising {ip} from interface {name}");
            *ip
        })
}

fn usable(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => !v4.is_loopback() && !v4.is_unspecified() && !v4.is_link_local(),
        IpAddr::V6(_) => false,
    }
}

fn is_virtual(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    VIRTUAL_PREFIXES.iter().any(|prefix| name.starts_with(prefix))
}

/// Host address to advertise: the configured bind address if it is a
/// concrete one, otherwise the detected LAN address, otherwise `localhost`.
pub fn advertised_host(bind_address: &str) -> String {
    match bind_address.parse::<IpAddr>() {
        Ok(ip) if !ip.is_unspecified() => ip.to_string(),
        _ => detect_lan_ip()
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| FALLBACK_HOST.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iface(name: &str, ip: &str) -> (String, IpAddr) {
        (name.to_string(), ip.parse().unwrap())
    }

    #[test]
    fn test_concrete_bind_address_is_advertised_as_is() {
        assert_eq!(advertised_host("192.168.1.20"), "192.168.1.20");
        assert_eq!(advertised_host("127.0.0.1"), "127.0.0.1");
    }

    #[test]
    fn test_unspecified_bind_address_is_never_advertised() {
        let host = advertised_host("0.0.0.0");
        assert_ne!(host, "0.0.0.0");
        assert!(host == FALLBACK_HOST || host.parse::<IpAddr>().is_ok());
    }

    #[test]
    fn test_first_non_loopback_ipv4_is_picked() {
        // Arrange
        let interfaces = vec![
            iface("lo", "127.0.0.1"),
            iface("wlan0", "fe80::1"),
            iface("wlan0", "192.168.43.17"),
            iface("eth0", "10.0.0.5"),
        ];

        // Act
        let picked = pick_lan_ip(&interfaces);

        // Assert
        assert_eq!(picked, Some("192.168.43.17".parse().unwrap()));
    }

    #[test]
    fn test_address_found_without_default_route() {
        // A hotspot LAN with no gateway still lists its interface address.
        let interfaces = vec![iface("lo", "127.0.0.1"), iface("wlp2s0", "172.20.10.3")];
        assert_eq!(pick_lan_ip(&interfaces), Some("172.20.10.3".parse().unwrap()));
    }

    #[test]
    fn test_virtual_interfaces_only_as_last_resort() {
        let with_lan = vec![iface("docker0", "172.17.0.1"), iface("en0", "192.168.1.20")];
        let only_virtual = vec![iface("lo", "127.0.0.1"), iface("docker0", "172.17.0.1")];

        assert_eq!(pick_lan_ip(&with_lan), Some("192.168.1.20".parse().unwrap()));
        assert_eq!(pick_lan_ip(&only_virtual), Some("172.17.0.1".parse().unwrap()));
    }

    #[test]
    fn test_loopback_and_link_local_are_never_picked() {
        let interfaces = vec![iface("lo", "127.0.0.1"), iface("eth0", "169.254.10.2")];
        assert_eq!(pick_lan_ip(&interfaces), None);
    }
}
