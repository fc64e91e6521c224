use crate::bytestr::ByteStr;
use crate::types::{LocationId, SiteId};

/// A path scope within a site. A `None` path matches any path.
pub struct SiteLocation {
    site: SiteId,
    path: Option<ByteStr>,
}

impl SiteLocation {
    pub(crate) fn new(site: SiteId, path: Option<ByteStr>) -> Self {
        Self { site, path }
    }

    /// Back-reference to the owning site.
    pub fn site(&self) -> SiteId {
        self.site
    }

    pub fn path(&self) -> Option<&ByteStr> {
        self.path.as_ref()
    }
}

/// A site known to the engine: a named host scope with IP and hostname
/// predicates and an ordered list of locations.
///
/// An empty IP list matches any local address; an empty host list matches
/// any hostname. A host entry matches by ASCII case-insensitive suffix,
/// and the entry `*` is the wildcard — the only entry an empty hostname
/// matches.
pub struct Site {
    id: SiteId,
    name: String,
    ips: Vec<ByteStr>,
    hosts: Vec<ByteStr>,
    locations: Vec<SiteLocation>,
    default_location: Option<usize>,
}

impl Site {
    pub(crate) fn new(id: SiteId, name: &str) -> Self {
        Self {
            id,
            name: name.to_owned(),
            ips: Vec::new(),
            hosts: Vec::new(),
            locations: Vec::new(),
            default_location: None,
        }
    }

    pub fn id(&self) -> SiteId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Site names compare ASCII case-insensitively.
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    pub fn ips(&self) -> &[ByteStr] {
        &self.ips
    }

    pub fn hosts(&self) -> &[ByteStr] {
        &self.hosts
    }

    pub fn locations(&self) -> &[SiteLocation] {
        &self.locations
    }

    pub fn location(&self, id: LocationId) -> Option<&SiteLocation> {
        if id.site != self.id {
            return None;
        }
        self.locations.get(id.index)
    }

    /// The location used when no explicit location matches, if one was
    /// declared.
    pub fn default_location(&self) -> Option<LocationId> {
        self.default_location.map(|index| LocationId {
            site: self.id,
            index,
        })
    }

    pub(crate) fn add_ip(&mut self, ip: ByteStr) {
        self.ips.push(ip);
    }

    pub(crate) fn add_host(&mut self, host: ByteStr) {
        self.hosts.push(host);
    }

    pub(crate) fn add_location(&mut self, path: Option<ByteStr>) -> LocationId {
        let index = self.locations.len();
        self.locations.push(SiteLocation::new(self.id, path));
        LocationId {
            site: self.id,
            index,
        }
    }

    pub(crate) fn set_default_location(&mut self, id: LocationId) -> bool {
        if id.site != self.id || id.index >= self.locations.len() {
            return false;
        }
        self.default_location = Some(id.index);
        true
    }

    /// Whether `ip` satisfies the site's IP predicate.
    pub fn ip_matches(&self, ip: &[u8]) -> bool {
        self.ips.is_empty() || self.ips.iter().any(|entry| entry.as_bytes() == ip)
    }

    /// Whether `host` satisfies the site's hostname predicate.
    pub fn host_matches(&self, host: &ByteStr) -> bool {
        if self.hosts.is_empty() {
            return true;
        }
        self.hosts.iter().any(|entry| {
            if entry.as_bytes() == b"*" {
                return true;
            }
            if host.is_empty() {
                // an empty hostname only matches the wildcard
                return false;
            }
            host.ends_with_nocase(entry)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        let mut site = Site::new(SiteId(0), "main");
        site.add_host(ByteStr::from("example.com"));
        site
    }

    #[test]
    fn host_suffix_matches_case_insensitively() {
        let site = site();
        assert!(site.host_matches(&ByteStr::from("WWW.Example.Com")));
        assert!(site.host_matches(&ByteStr::from("example.com")));
        assert!(!site.host_matches(&ByteStr::from("example.org")));
    }

    #[test]
    fn empty_host_needs_a_wildcard() {
        let mut site = site();
        assert!(!site.host_matches(&ByteStr::empty()));
        site.add_host(ByteStr::from("*"));
        assert!(site.host_matches(&ByteStr::empty()));
    }

    #[test]
    fn empty_ip_list_matches_anything() {
        let mut site = site();
        assert!(site.ip_matches(b"10.0.0.1"));
        site.add_ip(ByteStr::from("10.0.0.2"));
        assert!(!site.ip_matches(b"10.0.0.1"));
        assert!(site.ip_matches(b"10.0.0.2"));
    }
}
