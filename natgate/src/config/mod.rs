use crate::common::{Ingress, Route};
use crate::nat::Translation;
use anyhow::Result;
use serde::Deserialize;
use smol_str::SmolStr;
use std::net::{Ipv4Addr, SocketAddr};
use tokio::fs::File;
use tokio::io::AsyncReadExt;

#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
  pub capture: CaptureConfig,
  pub nat: NatConfig,
  pub inbounds: InboundsConfig,
  pub outbounds: OutboundsConfig,
  pub metrics_interval: MetricsInterval,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct CaptureConfig {
  pub enabled: bool,
  pub interface: SmolStr,
  pub snaplen: usize,
  pub promiscuous: bool,
}

impl Default for CaptureConfig {
  fn default() -> Self {
    Self {
      enabled: true,
      interface: "ens5".into(),
      snaplen: 1600,
      promiscuous: true,
    }
  }
}

/// Addresses swapped by the rewriter.
#[derive(Deserialize, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct NatConfig {
  /// Source address of the hosts whose traffic is captured.
  pub internal_addr: Ipv4Addr,
  /// The gateway's own address on the host network.
  pub gateway_addr: Ipv4Addr,
  /// The gateway's address on the server network.
  pub external_addr: Ipv4Addr,
}

impl Default for NatConfig {
  fn default() -> Self {
    Self {
      internal_addr: Ipv4Addr::new(192, 168, 10, 2),
      gateway_addr: Ipv4Addr::new(10, 10, 10, 1),
      external_addr: Ipv4Addr::new(100, 87, 50, 2),
    }
  }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct InboundsConfig {
  pub host: SocketAddr,
  pub server: SocketAddr,
}

impl Default for InboundsConfig {
  fn default() -> Self {
    Self {
      host: ([10, 10, 10, 1], 8080).into(),
      server: ([100, 87, 50, 2], 8080).into(),
    }
  }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(default, deny_unknown_fields)]
pub struct OutboundsConfig {
  pub server: MptcpOutbound,
  pub host: TcpOutbound,
}

impl Default for OutboundsConfig {
  fn default() -> Self {
    Self {
      server: MptcpOutbound {
        addr: "100.87.50.1:8080".into(),
        interface: "ens8".into(),
      },
      host: TcpOutbound {
        addr: "10.10.10.2:8080".into(),
      },
    }
  }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct MptcpOutbound {
  pub addr: SmolStr,
  pub interface: SmolStr,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(deny_unknown_fields)]
pub struct TcpOutbound {
  pub addr: SmolStr,
}

/// Seconds between metrics log lines, 0 turns them off.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(transparent)]
pub struct MetricsInterval(pub u64);

impl Default for MetricsInterval {
  fn default() -> Self {
    MetricsInterval(10)
  }
}

impl Config {
  pub fn translation(&self, ingress: Ingress) -> Translation {
    let nat = &self.nat;
    match ingress {
      Ingress::Capture => Translation::new(nat.internal_addr, nat.external_addr, Route::Server),
      Ingress::Host => Translation::new(nat.gateway_addr, nat.external_addr, Route::Server),
      Ingress::Server => Translation::new(nat.external_addr, nat.gateway_addr, Route::Host),
    }
  }

  pub fn listen_addr(&self, ingress: Ingress) -> Option<SocketAddr> {
    match ingress {
      Ingress::Capture => None,
      Ingress::Host => Some(self.inbounds.host),
      Ingress::Server => Some(self.inbounds.server),
    }
  }
}

pub async fn load_file(path: &str) -> Result<Config> {
  let mut file = File::open(path).await?;
  let mut buffer = String::new();

  file.read_to_string(&mut buffer).await?;
  load_string(&buffer)
}

pub fn load_string(input: &str) -> Result<Config> {
  Ok(serde_yaml::from_str(input)?)
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn defaults_match_deployment() {
    let config = Config::default();
    assert_eq!(config.capture.interface, "ens5");
    assert_eq!(config.capture.snaplen, 1600);
    assert_eq!(config.inbounds.host, "10.10.10.1:8080".parse::<SocketAddr>().unwrap());
    assert_eq!(config.inbounds.server, "100.87.50.2:8080".parse::<SocketAddr>().unwrap());
    assert_eq!(config.outbounds.server.addr, "100.87.50.1:8080");
    assert_eq!(config.outbounds.server.interface, "ens8");
    assert_eq!(config.outbounds.host.addr, "10.10.10.2:8080");
    assert_eq!(config.metrics_interval, MetricsInterval(10));
  }

  #[test]
  fn translations_per_ingress() {
    let config = Config::default();

    let capture = config.translation(Ingress::Capture);
    assert_eq!(capture.from, Ipv4Addr::new(192, 168, 10, 2));
    assert_eq!(capture.to, Ipv4Addr::new(100, 87, 50, 2));
    assert_eq!(capture.route, Route::Server);

    let host = config.translation(Ingress::Host);
    assert_eq!(host.from, Ipv4Addr::new(10, 10, 10, 1));
    assert_eq!(host.to, Ipv4Addr::new(100, 87, 50, 2));
    assert_eq!(host.route, Route::Server);

    let server = config.translation(Ingress::Server);
    assert_eq!(server.from, Ipv4Addr::new(100, 87, 50, 2));
    assert_eq!(server.to, Ipv4Addr::new(10, 10, 10, 1));
    assert_eq!(server.route, Route::Host);

    assert_eq!(config.listen_addr(Ingress::Capture), None);
  }

  #[test]
  fn partial_yaml_keeps_defaults() {
    let config = load_string(
      r#"
capture:
  enabled: false
  interface: eth1
nat:
  external_addr: 203.0.113.7
outbounds:
  host:
    addr: "127.0.0.1:9000"
metrics_interval: 0
"#,
    )
    .unwrap();

    assert!(!config.capture.enabled);
    assert_eq!(config.capture.interface, "eth1");
    assert_eq!(config.capture.snaplen, 1600);
    assert_eq!(config.nat.external_addr, Ipv4Addr::new(203, 0, 113, 7));
    assert_eq!(config.nat.gateway_addr, Ipv4Addr::new(10, 10, 10, 1));
    assert_eq!(config.outbounds.host.addr, "127.0.0.1:9000");
    assert_eq!(config.outbounds.server.interface, "ens8");
    assert_eq!(config.metrics_interval, MetricsInterval(0));
  }

  #[test]
  fn example_file_spells_out_defaults() {
    let config = load_string(include_str!("../../../config.example.yml")).unwrap();
    let defaults = Config::default();
    assert_eq!(format!("{:?}", config), format!("{:?}", defaults));
  }

  #[test]
  fn rejects_unknown_keys() {
    assert!(load_string("nat:\n  internal: 1.2.3.4\n").is_err());
    assert!(load_string("inbounds:\n  host: not-an-address\n").is_err());
  }
}
