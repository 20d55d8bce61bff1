//! IP / CIDR and domain whitelists attached to API tokens.

use axum::http::HeaderMap;
use std::net::IpAddr;
use std::str::FromStr;

/// One entry of an IP whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IpRule {
    Any,
    Exact(IpAddr),
    Cidr { network: IpAddr, prefix: u8 },
}

impl FromStr for IpRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(IpRule::Any);
        }

        if let Some((addr, prefix)) = s.split_once('/') {
            let network = parse_ip(addr).ok_or_else(|| format!("Invalid network address '{}'", addr))?;
            let max = if network.is_ipv4() { 32 } else { 128 };
            let prefix: u8 = prefix
                .parse()
                .ok()
                .filter(|p| *p <= max)
                .ok_or_else(|| format!("Invalid prefix length in '{}'", s))?;
            return Ok(IpRule::Cidr { network, prefix });
        }

        parse_ip(s)
            .map(IpRule::Exact)
            .ok_or_else(|| format!("Invalid IP address '{}'", s))
    }
}

impl IpRule {
    pub fn matches(&self, ip: IpAddr) -> bool {
        let ip = canonical(ip);
        match self {
            IpRule::Any => true,
            IpRule::Exact(addr) => *addr == ip,
            IpRule::Cidr { network, prefix } => match (network, ip) {
                (IpAddr::V4(net), IpAddr::V4(ip)) => {
                    let mask = mask_u32(*prefix);
                    u32::from(*net) & mask == u32::from(ip) & mask
                }
                (IpAddr::V6(net), IpAddr::V6(ip)) => {
                    let mask = mask_u128(*prefix);
                    u128::from(*net) & mask == u128::from(ip) & mask
                }
                _ => false,
            },
        }
    }
}

fn mask_u32(prefix: u8) -> u32 {
    if prefix == 0 { 0 } else { u32::MAX << (32 - prefix as u32) }
}

fn mask_u128(prefix: u8) -> u128 {
    if prefix == 0 { 0 } else { u128::MAX << (128 - prefix as u32) }
}

fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim().trim_start_matches('[').trim_end_matches(']');
    s.parse::<IpAddr>().ok().map(canonical)
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => IpAddr::V6(v6),
        },
        v4 => v4,
    }
}

/// One entry of a domain whitelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRule {
    Any,
    Exact(String),
    /// `*.example.com`: any subdomain of the stored suffix, not the apex
    Subdomains(String),
}

impl FromStr for DomainRule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s == "*" {
            return Ok(DomainRule::Any);
        }

        let (wildcard, rest) = match s.strip_prefix("*.") {
            Some(rest) => (true, rest),
            None => (false, s),
        };

        let host = normalize_host(rest).ok_or_else(|| format!("Invalid domain pattern '{}'", s))?;
        Ok(if wildcard { DomainRule::Subdomains(host) } else { DomainRule::Exact(host) })
    }
}

impl DomainRule {
    pub fn matches(&self, domain: &str) -> bool {
        let domain = domain.trim_end_matches('.').to_ascii_lowercase();
        match self {
            DomainRule::Any => true,
            DomainRule::Exact(host) => *host == domain,
            DomainRule::Subdomains(suffix) => domain
                .strip_suffix(suffix.as_str())
                .map_or(false, |head| head.len() > 1 && head.ends_with('.')),
        }
    }
}

/// Lowercased host without scheme, port, path or trailing dot
fn normalize_host(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let host = if raw.contains("://") {
        url::Url::parse(raw).ok()?.host_str()?.to_string()
    } else {
        let without_path = raw.split('/').next().unwrap_or("");
        without_path.rsplit_once(':').map_or(without_path, |(h, _)| h).to_string()
    };

    let host = host.trim_end_matches('.').to_ascii_lowercase();
    let valid = !host.is_empty()
        && host.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    valid.then_some(host)
}

pub fn parse_ip_rules(patterns: &[String]) -> Result<Vec<IpRule>, String> {
    patterns.iter().map(|p| p.parse()).collect()
}

pub fn parse_domain_rules(patterns: &[String]) -> Result<Vec<DomainRule>, String> {
    patterns.iter().map(|p| p.parse()).collect()
}

/// Empty whitelist allows everything; otherwise the IP must be known and match
pub fn ip_allowed(rules: &[IpRule], ip: Option<IpAddr>) -> bool {
    if rules.is_empty() {
        return true;
    }
    match ip {
        Some(ip) => rules.iter().any(|r| r.matches(ip)),
        None => rules.contains(&IpRule::Any),
    }
}

pub fn domain_allowed(rules: &[DomainRule], domain: Option<&str>) -> bool {
    if rules.is_empty() {
        return true;
    }
    match domain {
        Some(domain) => rules.iter().any(|r| r.matches(domain)),
        None => rules.contains(&DomainRule::Any),
    }
}

/// Client address from proxy headers, falling back to the socket peer
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> Option<IpAddr> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    header("cf-connecting-ip")
        .and_then(parse_ip)
        .or_else(|| {
            header("x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .and_then(parse_ip)
        })
        .or_else(|| header("x-real-ip").and_then(parse_ip))
        .or(peer.map(canonical))
}

/// Calling site's host from `Origin`, else `Referer`
pub fn request_domain(headers: &HeaderMap) -> Option<String> {
    ["origin", "referer"].iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        if value.eq_ignore_ascii_case("null") {
            return None;
        }
        url::Url::parse(value)
            .ok()?
            .host_str()
            .map(|h| h.trim_end_matches('.').to_ascii_lowercase())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn exact_and_any_ip_rules() {
        let rule: IpRule = "203.0.113.7".parse().unwrap();
        assert!(rule.matches(ip("203.0.113.7")));
        assert!(!rule.matches(ip("203.0.113.8")));
        assert!("*".parse::<IpRule>().unwrap().matches(ip("::1")));
    }

    #[test]
    fn ipv4_cidr() {
        let rule: IpRule = "10.0.0.0/8".parse().unwrap();
        assert!(rule.matches(ip("10.200.3.4")));
        assert!(!rule.matches(ip("11.0.0.1")));

        let host: IpRule = "192.168.1.10/32".parse().unwrap();
        assert!(host.matches(ip("192.168.1.10")));
        assert!(!host.matches(ip("192.168.1.11")));

        let all: IpRule = "0.0.0.0/0".parse().unwrap();
        assert!(all.matches(ip("8.8.8.8")));
    }

    #[test]
    fn ipv6_cidr_and_mapped_addresses() {
        let rule: IpRule = "2001:db8::/32".parse().unwrap();
        assert!(rule.matches(ip("2001:db8:1::5")));
        assert!(!rule.matches(ip("2001:db9::1")));

        let v4: IpRule = "127.0.0.0/8".parse().unwrap();
        assert!(v4.matches(ip("::ffff:127.0.0.1")));
        assert!(!v4.matches(ip("::1")));
    }

    #[test]
    fn rejects_bad_ip_rules() {
        assert!("10.0.0.0/33".parse::<IpRule>().is_err());
        assert!("10.0.0/8".parse::<IpRule>().is_err());
        assert!("example.com".parse::<IpRule>().is_err());
    }

    #[test]
    fn domain_rules() {
        let exact: DomainRule = "Shop.Example.com".parse().unwrap();
        assert!(exact.matches("shop.example.com"));
        assert!(!exact.matches("example.com"));

        let wildcard: DomainRule = "*.example.com".parse().unwrap();
        assert!(wildcard.matches("a.example.com"));
        assert!(wildcard.matches("a.b.example.com"));
        assert!(!wildcard.matches("example.com"));
        assert!(!wildcard.matches("badexample.com"));

        let from_url: DomainRule = "https://example.org:8443/path".parse().unwrap();
        assert_eq!(from_url, DomainRule::Exact("example.org".into()));
        assert!("bad domain!".parse::<DomainRule>().is_err());
    }

    #[test]
    fn empty_whitelists_allow_everything() {
        assert!(ip_allowed(&[], None));
        assert!(domain_allowed(&[], None));

        let rules = parse_ip_rules(&["10.0.0.0/8".to_string()]).unwrap();
        assert!(!ip_allowed(&rules, None));
        assert!(ip_allowed(&rules, Some(ip("10.1.1.1"))));
    }

    #[test]
    fn extracts_client_ip_in_header_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.3"));
        assert_eq!(client_ip(&headers, None), Some(ip("198.51.100.3")));

        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.9, 10.0.0.1"));
        assert_eq!(client_ip(&headers, None), Some(ip("203.0.113.9")));

        headers.insert("cf-connecting-ip", HeaderValue::from_static("192.0.2.1"));
        assert_eq!(client_ip(&headers, Some(ip("127.0.0.1"))), Some(ip("192.0.2.1")));

        assert_eq!(client_ip(&HeaderMap::new(), Some(ip("127.0.0.1"))), Some(ip("127.0.0.1")));
    }

    #[test]
    fn extracts_request_domain() {
        let mut headers = HeaderMap::new();
        headers.insert("referer", HeaderValue::from_static("https://blog.example.com/post/1"));
        assert_eq!(request_domain(&headers).as_deref(), Some("blog.example.com"));

        headers.insert("origin", HeaderValue::from_static("https://Shop.Example.com:8443"));
        assert_eq!(request_domain(&headers).as_deref(), Some("shop.example.com"));

        let mut null_origin = HeaderMap::new();
        null_origin.insert("origin", HeaderValue::from_static("null"));
        assert_eq!(request_domain(&null_origin), None);
    }
}
