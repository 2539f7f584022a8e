//! IP/CIDR deduplication and containment.
//!
//! [`clean`] collapses duplicate addresses and blocks and drops addresses
//! already covered by a block. It does not merge adjacent blocks and does not
//! drop a block nested inside another one; downstream consumers rely on the
//! blocks coming out the way the sources wrote them.

use ipnet::IpNet;
use std::collections::HashSet;
use std::net::IpAddr;

/// Outcome of a [`clean`] pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanReport {
    /// Unique blocks plus uncovered addresses, sorted by string form
    pub cleaned: Vec<String>,
    /// `entries.len() - cleaned.len()`
    pub removed: usize,
    /// Non-fatal oddities found along the way
    pub warnings: Vec<String>,
}

/// Deduplicate `entries` and drop addresses contained in one of the blocks.
///
/// Lines that are neither an address nor a block are ignored. The output is
/// sorted lexicographically, not numerically.
pub fn clean(entries: &[String]) -> CleanReport {
    let mut warnings = Vec::new();
    let addresses = unique_addresses(entries);
    let networks = unique_networks(entries, &mut warnings);

    let mut index = ContainmentIndex::new();
    for net in &networks {
        index.insert(net);
    }

    let mut cleaned: Vec<String> = networks.iter().map(IpNet::to_string).collect();
    cleaned.extend(
        addresses
            .iter()
            .filter(|ip| !index.contains(**ip))
            .map(IpAddr::to_string),
    );
    cleaned.sort_unstable();

    CleanReport {
        removed: entries.len().saturating_sub(cleaned.len()),
        cleaned,
        warnings,
    }
}

fn unique_addresses(entries: &[String]) -> HashSet<IpAddr> {
    entries
        .iter()
        .filter_map(|line| line.parse::<IpAddr>().ok())
        .map(|ip| ip.to_canonical())
        .collect()
}

fn unique_networks(entries: &[String], warnings: &mut Vec<String>) -> HashSet<IpNet> {
    let mut networks = HashSet::new();
    for line in entries {
        let Ok(net) = line.parse::<IpNet>() else {
            continue;
        };
        let trunc = net.trunc();
        if trunc != net {
            warnings.push(format!("{line} has host bits set, using {trunc}"));
        }
        networks.insert(trunc);
    }
    networks
}

/// Binary prefix trie answering "is this address inside a known block".
///
/// IPv4 and IPv6 blocks live in separate trees keyed by address bits, most
/// significant first. Built fresh for every [`clean`] pass.
#[derive(Debug, Default)]
pub struct ContainmentIndex {
    v4: Node,
    v6: Node,
}

#[derive(Debug, Default)]
struct Node {
    /// A block ends at this node
    terminal: bool,
    children: [Option<Box<Node>>; 2],
}

impl ContainmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a block; its host bits are ignored.
    pub fn insert(&mut self, net: &IpNet) {
        let (root, bits, width) = match net {
            IpNet::V4(v4) => (&mut self.v4, u128::from(u32::from(v4.network())), 32),
            IpNet::V6(v6) => (&mut self.v6, u128::from(v6.network()), 128),
        };
        let mut node = root;
        for depth in 0..net.prefix_len() {
            if node.terminal {
                // Already covered by a shorter block
                return;
            }
            let bit = bit_at(bits, width, depth);
            node = node.children[bit].get_or_insert_with(Box::default);
        }
        node.terminal = true;
    }

    /// True when `ip` lies inside any inserted block.
    pub fn contains(&self, ip: IpAddr) -> bool {
        let (root, bits, width) = match ip.to_canonical() {
            IpAddr::V4(v4) => (&self.v4, u128::from(u32::from(v4)), 32),
            IpAddr::V6(v6) => (&self.v6, u128::from(v6), 128),
        };
        let mut node = root;
        for depth in 0..width {
            if node.terminal {
                return true;
            }
            match &node.children[bit_at(bits, width, depth)] {
                Some(child) => node = child,
                None => return false,
            }
        }
        node.terminal
    }
}

/// Bit `depth` of a `width`-bit value, counting from the most significant bit.
fn bit_at(bits: u128, width: u8, depth: u8) -> usize {
    ((bits >> (width - 1 - depth)) & 1) as usize
}
