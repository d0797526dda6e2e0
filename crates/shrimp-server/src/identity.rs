//! Address-keyed identities.
//!
//! A client keeps its display name (and admin flag) across reconnects from
//! the same address for the lifetime of the process.

use std::collections::HashMap;
use std::net::IpAddr;

use rand::seq::SliceRandom;
use rand::Rng;

const NAMES: &[&str] = &[
    "Commodore", "Aqua", "Bay", "Coral", "Cove", "Delta", "Drake", "Harbor", "Jetty", "Ocean",
    "Reef", "Tide", "River", "Wave", "Wharf", "Anchor", "Breeze", "Captain", "Cast", "Catcher",
    "Current", "Deep", "Fisher", "Flounder", "Gale", "Hauler", "Hook", "Leviathan", "Lobster",
    "Navigator", "Netty", "Octave", "Paddle", "Pilot", "Poseidon", "Quay", "Ray", "Sailor",
    "Scallop", "Skipper", "Snapper", "Spray", "Trawler", "Voyager", "Abyss", "Breaker", "Crabber",
    "Drift", "Horizon", "Mackerel", "Narwhal", "Seaworthy", "Storm", "Billow", "Buoy", "Dolphin",
    "Gull", "Kelp", "Kraken", "Narrows", "Oyster", "Pelican", "Seaside",
];

/// Finite pool of display names handed out without repetition
#[derive(Clone, Debug)]
pub struct NamePool {
    names: Vec<String>,
}

impl NamePool {
    /// The standard nautical names in random order
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut names: Vec<String> = NAMES.iter().map(|name| name.to_string()).collect();
        names.shuffle(rng);
        Self { names }
    }

    /// Names handed out in the given order (first name first)
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        names.reverse();
        Self { names }
    }

    pub fn allocate(&mut self) -> Option<String> {
        self.names.pop()
    }

    pub fn remaining(&self) -> usize {
        self.names.len()
    }
}

impl Default for NamePool {
    fn default() -> Self {
        Self::shuffled(&mut rand::thread_rng())
    }
}

#[derive(Clone, Debug)]
struct IdentityRecord {
    name: String,
    is_admin: bool,
}

/// Result of looking up (or creating) an identity
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    pub name: String,
    pub is_admin: bool,
    /// False when the address was already known
    pub is_new: bool,
}

/// Maps client addresses to display names and admin flags
#[derive(Debug, Default)]
pub struct IdentityRegistry {
    records: HashMap<IpAddr, IdentityRecord>,
    pool: NamePool,
    /// Fallback names issued after the pool ran dry
    guests: u32,
}

impl IdentityRegistry {
    pub fn new(pool: NamePool) -> Self {
        Self {
            records: HashMap::new(),
            pool,
            guests: 0,
        }
    }

    /// Return the identity for `address`, creating one on first contact
    pub fn identify(&mut self, address: IpAddr) -> Identity {
        if let Some(record) = self.records.get(&address) {
            return Identity {
                name: record.name.clone(),
                is_admin: record.is_admin,
                is_new: false,
            };
        }

        let name = match self.pool.allocate() {
            Some(name) => name,
            None => self.next_guest_name(),
        };
        self.records.insert(
            address,
            IdentityRecord {
                name: name.clone(),
                is_admin: false,
            },
        );

        Identity {
            name,
            is_admin: false,
            is_new: true,
        }
    }

    /// Record the admin flag when `supplied` matches `real`. A wrong
    /// password never clears an existing flag.
    pub fn promote(&mut self, address: IpAddr, supplied: &str, real: &str) -> bool {
        if supplied != real {
            return false;
        }
        match self.records.get_mut(&address) {
            Some(record) => record.is_admin = true,
            None => {
                // Promoted before asking for a name; the name comes later.
                let name = match self.pool.allocate() {
                    Some(name) => name,
                    None => self.next_guest_name(),
                };
                self.records.insert(
                    address,
                    IdentityRecord {
                        name,
                        is_admin: true,
                    },
                );
            }
        }
        true
    }

    pub fn is_admin(&self, address: IpAddr) -> bool {
        self.records.get(&address).is_some_and(|r| r.is_admin)
    }

    pub fn name_of(&self, address: IpAddr) -> Option<&str> {
        self.records.get(&address).map(|r| r.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn next_guest_name(&mut self) -> String {
        // Skip any guest name a custom pool might already have issued.
        loop {
            self.guests += 1;
            let name = format!("Guest{}", self.guests);
            if !self.records.values().any(|r| r.name == name) {
                return name;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;

    fn addr(last: u8) -> IpAddr {
        IpAddr::V4(Ipv4Addr::new(10, 0, 0, last))
    }

    #[test]
    fn shuffled_pool_has_every_name_once() {
        let mut pool = NamePool::shuffled(&mut StdRng::seed_from_u64(7));
        let mut seen = Vec::new();
        while let Some(name) = pool.allocate() {
            assert!(!seen.contains(&name));
            seen.push(name);
        }
        assert_eq!(seen.len(), NAMES.len());
    }

    #[test]
    fn same_address_keeps_its_name() {
        let mut registry = IdentityRegistry::new(NamePool::from_names(["Kelp", "Gull"]));

        let first = registry.identify(addr(1));
        assert_eq!(first.name, "Kelp");
        assert!(first.is_new);

        let again = registry.identify(addr(1));
        assert_eq!(again.name, "Kelp");
        assert!(!again.is_new);

        assert_eq!(registry.identify(addr(2)).name, "Gull");
    }

    #[test]
    fn exhausted_pool_falls_back_to_guest_names() {
        let mut registry = IdentityRegistry::new(NamePool::from_names(["Kelp"]));
        registry.identify(addr(1));

        assert_eq!(registry.identify(addr(2)).name, "Guest1");
        assert_eq!(registry.identify(addr(3)).name, "Guest2");
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn promotion_requires_the_password() {
        let mut registry = IdentityRegistry::new(NamePool::from_names(["Kelp"]));
        registry.identify(addr(1));

        assert!(!registry.promote(addr(1), "guess", "secret"));
        assert!(!registry.is_admin(addr(1)));

        assert!(registry.promote(addr(1), "secret", "secret"));
        assert!(registry.is_admin(addr(1)));

        // A later failure leaves the flag alone.
        assert!(!registry.promote(addr(1), "guess", "secret"));
        assert!(registry.is_admin(addr(1)));
        assert!(registry.identify(addr(1)).is_admin);
    }

    #[test]
    fn promotion_before_identify_keeps_the_flag() {
        let mut registry = IdentityRegistry::new(NamePool::from_names(["Kelp"]));
        assert!(registry.promote(addr(4), "secret", "secret"));

        let identity = registry.identify(addr(4));
        assert_eq!(identity.name, "Kelp");
        assert!(identity.is_admin);
        assert!(!identity.is_new);
    }
}
