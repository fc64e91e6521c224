/// Integration tests for context selection: site/location predicate
/// matching, registration-order tie-breaking and the main-context
/// fallback.

use hornet::{
    ContextType, CtxId, Engine, EngineConfig, Header, RequestLine, ServerDescriptor,
    ServerInterface, ENGINE_ABINUM, ENGINE_VERNUM,
};

struct TestServer;

impl ServerInterface for TestServer {
    fn descriptor(&self) -> ServerDescriptor {
        ServerDescriptor {
            vernum: ENGINE_VERNUM,
            abinum: ENGINE_ABINUM,
            version: "test".to_string(),
            filename: file!().to_string(),
            name: "test-host".to_string(),
        }
    }
}

/// A declared site: name, IPs, hosts, location paths.
struct SiteSpec {
    name: &'static str,
    ips: &'static [&'static str],
    hosts: &'static [&'static str],
    paths: &'static [Option<&'static str>],
}

/// Build an engine with one context (and one selector) per site location,
/// in declaration order. Returns the location context ids, one list per
/// site.
fn engine_with_sites(specs: &[SiteSpec]) -> (Engine, Vec<Vec<CtxId>>) {
    let mut engine = Engine::new(EngineConfig::default(), Box::new(TestServer)).unwrap();
    let main = engine.main_ctx();
    let mut all_locations = Vec::new();
    for spec in specs {
        let site = engine.site_create(spec.name).unwrap();
        for ip in spec.ips {
            engine.site_add_ip(site, ip).unwrap();
        }
        for host in spec.hosts {
            engine.site_add_host(site, host).unwrap();
        }
        let site_ctx = engine
            .context_create(main, ContextType::Site, spec.name)
            .unwrap();
        engine.context_open(site_ctx).unwrap();
        engine.context_bind_site(site_ctx, site).unwrap();

        let mut site_locations = Vec::new();
        for path in spec.paths {
            let location = engine.site_add_location(site, *path).unwrap();
            let loc_ctx = engine
                .context_create(site_ctx, ContextType::Location, path.unwrap_or("*"))
                .unwrap();
            engine.context_open(loc_ctx).unwrap();
            engine.context_bind_location(loc_ctx, location).unwrap();
            engine.register_site_selector(loc_ctx).unwrap();
            engine.context_close(loc_ctx).unwrap();
            site_locations.push(loc_ctx);
        }
        engine.context_close(site_ctx).unwrap();
        all_locations.push(site_locations);
    }
    engine.configure_finished().unwrap();
    (engine, all_locations)
}

/// Run a transaction through the request header so the selector binds a
/// context, and return the bound id.
fn select(engine: &Engine, local_ip: &str, host: &str, path: &str) -> CtxId {
    let mut conn = engine.conn_create("203.0.113.9", 40000, local_ip, 80);
    engine.notify_conn_opened(&mut conn).unwrap();
    let tx_id = engine.tx_create(&mut conn).unwrap();
    let tx = conn.tx_mut(tx_id).unwrap();
    let uri = path.to_string();
    engine
        .notify_request_started(
            tx,
            Some(RequestLine::new("GET", uri, "HTTP/1.1")),
        )
        .unwrap();
    if !host.is_empty() {
        engine
            .notify_request_header_data(tx, &[Header::new("Host", host)])
            .unwrap();
    }
    engine.notify_request_header_finished(tx).unwrap();
    tx.ctx()
}

// ========== Host suffix matching ==========

#[test]
fn test_host_suffix_selects_the_site() {
    let (engine, locations) = engine_with_sites(&[SiteSpec {
        name: "x",
        ips: &[],
        hosts: &["x.test"],
        paths: &[Some("/")],
    }]);
    assert_eq!(select(&engine, "192.0.2.1", "x.test", "/a"), locations[0][0]);
    assert_eq!(
        select(&engine, "192.0.2.1", "www.x.test", "/a"),
        locations[0][0]
    );
}

#[test]
fn test_unmatched_host_falls_back_to_main() {
    let (engine, _) = engine_with_sites(&[SiteSpec {
        name: "x",
        ips: &[],
        hosts: &["x.test"],
        paths: &[Some("/")],
    }]);
    assert_eq!(
        select(&engine, "192.0.2.1", "other.example", "/a"),
        engine.main_ctx()
    );
}

#[test]
fn test_empty_host_matches_wildcard_only() {
    let (engine, locations) = engine_with_sites(&[
        SiteSpec {
            name: "named",
            ips: &[],
            hosts: &["x.test"],
            paths: &[Some("/")],
        },
        SiteSpec {
            name: "wild",
            ips: &[],
            hosts: &["*"],
            paths: &[Some("/")],
        },
    ]);
    // no Host header at all: only the wildcard site can match
    assert_eq!(select(&engine, "192.0.2.1", "", "/"), locations[1][0]);
}

// ========== Registration-order tie break (scenario S6) ==========

#[test]
fn test_more_specific_site_wins_when_registered_first() {
    let (engine, locations) = engine_with_sites(&[
        SiteSpec {
            name: "b",
            ips: &[],
            hosts: &["www.example.com"],
            paths: &[Some("/")],
        },
        SiteSpec {
            name: "a",
            ips: &[],
            hosts: &["example.com"],
            paths: &[Some("/")],
        },
    ]);
    assert_eq!(
        select(&engine, "192.0.2.1", "www.example.com", "/"),
        locations[0][0]
    );
}

#[test]
fn test_suffix_site_wins_when_registered_first() {
    let (engine, locations) = engine_with_sites(&[
        SiteSpec {
            name: "a",
            ips: &[],
            hosts: &["example.com"],
            paths: &[Some("/")],
        },
        SiteSpec {
            name: "b",
            ips: &[],
            hosts: &["www.example.com"],
            paths: &[Some("/")],
        },
    ]);
    // `example.com` is a suffix of `www.example.com`, so the earlier
    // registration matches first and wins
    assert_eq!(
        select(&engine, "192.0.2.1", "www.example.com", "/"),
        locations[0][0]
    );
}

#[test]
fn test_selection_is_deterministic() {
    let (engine, locations) = engine_with_sites(&[
        SiteSpec {
            name: "api",
            ips: &[],
            hosts: &["api.example.com"],
            paths: &[Some("/v1"), Some("/")],
        },
        SiteSpec {
            name: "web",
            ips: &[],
            hosts: &["example.com"],
            paths: &[Some("/")],
        },
    ]);
    for _ in 0..5 {
        assert_eq!(
            select(&engine, "192.0.2.1", "api.example.com", "/v1/users"),
            locations[0][0]
        );
        assert_eq!(
            select(&engine, "192.0.2.1", "api.example.com", "/static/app.js"),
            locations[0][1]
        );
        assert_eq!(
            select(&engine, "192.0.2.1", "example.com", "/index.html"),
            locations[1][0]
        );
    }
}

// ========== Path and IP predicates ==========

#[test]
fn test_path_prefix_gates_the_location() {
    let (engine, locations) = engine_with_sites(&[SiteSpec {
        name: "x",
        ips: &[],
        hosts: &["x.test"],
        paths: &[Some("/api"), None],
    }]);
    assert_eq!(
        select(&engine, "192.0.2.1", "x.test", "/api/users"),
        locations[0][0]
    );
    // the any-path location picks up everything else
    assert_eq!(
        select(&engine, "192.0.2.1", "x.test", "/images/a.png"),
        locations[0][1]
    );
}

#[test]
fn test_ip_list_restricts_the_site() {
    let (engine, locations) = engine_with_sites(&[SiteSpec {
        name: "x",
        ips: &["192.0.2.1"],
        hosts: &[],
        paths: &[Some("/")],
    }]);
    assert_eq!(select(&engine, "192.0.2.1", "any.host", "/"), locations[0][0]);
    assert_eq!(
        select(&engine, "192.0.2.99", "any.host", "/"),
        engine.main_ctx()
    );
}

// ========== Connections ==========

#[test]
fn test_connections_bind_to_main_not_sites() {
    let (engine, _) = engine_with_sites(&[SiteSpec {
        name: "x",
        ips: &[],
        hosts: &["*"],
        paths: &[Some("/")],
    }]);
    let mut conn = engine.conn_create("203.0.113.9", 40000, "192.0.2.1", 80);
    engine.notify_conn_opened(&mut conn).unwrap();
    // the site selector declines connections, so main is bound
    assert_eq!(conn.ctx(), engine.main_ctx());
}
