use std::fs;
use std::path::PathBuf;
use std::vec;

use ipnet::{IpAddrRange, IpNet, Ipv4AddrRange, Ipv6AddrRange};
use tracing::{debug, info};

use crate::error::{LookupError, Result};

/// Where the list of lookup targets comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSource {
    Ip(String),
    Files(Vec<PathBuf>),
    /// Caller-provided default list, selected with `--ignore`.
    Defaults(Vec<String>),
}

impl TargetSource {
    /// Picks the source from CLI arguments. Files win over a literal ip, which
    /// wins over the default list.
    pub fn from_args(
        ip: Option<String>,
        files: Vec<PathBuf>,
        ignore: bool,
        defaults: Vec<String>,
    ) -> Result<Self> {
        if !files.is_empty() {
            Ok(TargetSource::Files(files))
        } else if let Some(ip) = ip {
            Ok(TargetSource::Ip(ip))
        } else if ignore {
            Ok(TargetSource::Defaults(defaults))
        } else {
            Err(LookupError::NoTarget)
        }
    }

    fn candidates(&self) -> Result<Vec<String>> {
        match self {
            TargetSource::Ip(ip) => Ok(vec![ip.clone()]),
            TargetSource::Defaults(list) => Ok(list.clone()),
            TargetSource::Files(paths) => {
                let mut lines = Vec::new();
                for path in paths {
                    let bytes = fs::read(path).map_err(|source| LookupError::FileRead {
                        path: path.clone(),
                        source,
                    })?;
                    let content = String::from_utf8_lossy(&bytes);
                    debug!("read {} lines from {}", content.lines().count(), path.display());
                    lines.extend(content.lines().map(str::to_string));
                }
                Ok(lines)
            }
        }
    }
}

#[derive(Debug)]
enum Entry {
    Single(String),
    Block(IpAddrRange),
}

/// Lazily yields every target in order. Network blocks are walked one address
/// at a time, so a /64 costs no more memory than a single ip.
#[derive(Debug)]
pub struct Targets {
    entries: vec::IntoIter<Entry>,
    block: Option<IpAddrRange>,
}

impl Iterator for Targets {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(block) = self.block.as_mut() {
                if let Some(ip) = block.next() {
                    return Some(ip.to_string());
                }
                self.block = None;
            }

            match self.entries.next()? {
                Entry::Single(target) => return Some(target),
                Entry::Block(block) => self.block = Some(block),
            }
        }
    }
}

/// Validates every candidate up front, then hands back the targets with each
/// network block expanded in place.
pub fn resolve_targets(source: &TargetSource) -> Result<Targets> {
    let mut entries = Vec::new();

    for candidate in source.candidates()? {
        let candidate = candidate.trim();
        if candidate.is_empty() {
            continue;
        }

        if candidate.contains('/') {
            entries.push(Entry::Block(expand_cidr(candidate)?));
        } else {
            entries.push(Entry::Single(candidate.to_string()));
        }
    }

    Ok(Targets {
        entries: entries.into_iter(),
        block: None,
    })
}

/// Every address in the block, network through broadcast, in ascending order.
pub fn expand_cidr(block: &str) -> Result<IpAddrRange> {
    let block = block.trim();
    let net: IpNet = block.parse().map_err(|source| LookupError::InvalidCidr {
        value: block.to_string(),
        source,
    })?;

    let host_bits = net.max_prefix_len() - net.prefix_len();
    info!("building ip list from {} (2^{} addresses)", block, host_bits);

    Ok(match net {
        IpNet::V4(net) => IpAddrRange::V4(Ipv4AddrRange::new(net.network(), net.broadcast())),
        IpNet::V6(net) => IpAddrRange::V6(Ipv6AddrRange::new(net.network(), net.broadcast())),
    })
}
