//! End-to-end ISP pipeline against mock mirrors
//!
//! Mirrors are wiremock servers, host names resolve through a static table
//! and probes go through a scripted strategy, so the whole gather, merge,
//! probe and render path runs without touching the real network.

use async_trait::async_trait;
use pingtest::{
    app::run_carrier_groups,
    client::{MirrorFetcher, PayloadSource},
    dns::{HostResolver, StaticResolver},
    error::{AppError, Result, RetryPolicy},
    executor::{ProbeEngine, ProbeStrategy},
    logging::{LogLevel, Logger, MemorySink},
    models::{CarrierUrls, Config, SourceEndpoints},
    output::{ReportLayout, ResultAggregator},
    sources::SourceGatherer,
    Target, UnreachablePolicy,
};
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const NODES: &str = r#"[
    {"province":"北京市","isp_code":"cu","isp":"联通","ip_version":"v4","ips":"10.1.0.1"},
    {"province":"上海市","isp_code":"ct","isp":"电信","ip_version":"v4","ips":"10.2.0.1,10.2.0.2"},
    {"province":"广东省","isp_code":"cm","isp":"移动","ip_version":"v4","ips":"10.3.0.1"},
    {"province":"江苏省","isp_code":"cm","isp":"移动","ip_version":"v6","ips":"2001:db8::1"}
]"#;

const NET_TELECOM: &str = "\
id,host,port,sponsor,ip,country_name,country_code,x
1,sh.example,8080,上海,10.2.9.9,China,CN,x
2,zj.example,8080,浙江省,10.2.1.1,China,CN,x
3,short,row
";

const CN_MOBILE: &str = "\
a,b,c,d,e,cm-sichuan.example:8080,CN,h,移动,j,四川
a,b,c,d,e,unknown.example:8080,CN,h,移动,j,西藏
";

const UNREACHABLE_IP: Ipv4Addr = Ipv4Addr::new(10, 3, 0, 1);

/// Reports a latency derived from the third octet; one address never answers
struct ScriptedProbe;

#[async_trait]
impl ProbeStrategy for ScriptedProbe {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn attempt(&self, target: &Target, _attempt: usize) -> Result<Duration> {
        let ip = target
            .address()
            .ok_or_else(|| AppError::validation("no address"))?;
        if ip == UNREACHABLE_IP {
            return Err(AppError::timeout("no reply"));
        }
        Ok(Duration::from_millis(10 + ip.octets()[2] as u64))
    }
}

fn endpoints() -> SourceEndpoints {
    let urls = |dir: &str| CarrierUrls {
        mobile: format!("data/{}/mobile.csv", dir),
        telecom: format!("data/{}/telecom.csv", dir),
        unicom: format!("data/{}/unicom.csv", dir),
    };
    SourceEndpoints {
        node_list: "data/nodes.json".to_string(),
        net_export: urls("net"),
        cn_export: urls("cn"),
    }
}

fn test_config(mirrors: Vec<String>) -> Config {
    Config {
        mirrors,
        liveness_path: "health".to_string(),
        endpoints: endpoints(),
        fetch_timeout_ms: 500,
        fetch_retries: 1,
        backoff_min_ms: 10,
        backoff_max_ms: 20,
        fetch_deadline_secs: 5,
        ..Config::default()
    }
}

async fn serve(server: &MockServer, request_path: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(request_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

fn gatherer(config: &Config, logger: &Logger) -> SourceGatherer {
    let fetcher: Arc<dyn PayloadSource> = Arc::new(
        MirrorFetcher::new(config, Arc::new(logger.clone()))
            .unwrap()
            .with_skip_pause(Duration::ZERO),
    );
    let resolver: Arc<dyn HostResolver> = Arc::new(
        StaticResolver::new().with_host("cm-sichuan.example", Ipv4Addr::new(10, 3, 5, 1)),
    );
    SourceGatherer::from_config(config, fetcher, resolver, logger)
        .with_deadlines(Duration::from_secs(10), Duration::from_secs(1))
}

fn engine(logger: &Logger) -> ProbeEngine {
    let strategies: Vec<Arc<dyn ProbeStrategy>> = vec![Arc::new(ScriptedProbe)];
    ProbeEngine::new(strategies, RetryPolicy::immediate(3, Duration::from_secs(1)), 100, logger)
}

#[tokio::test]
async fn test_isp_pipeline_end_to_end() {
    let mirror = MockServer::start().await;
    serve(&mirror, "/health", "success").await;
    serve(&mirror, "/data/nodes.json", NODES).await;
    serve(&mirror, "/data/net/telecom.csv", NET_TELECOM).await;
    serve(&mirror, "/data/cn/mobile.csv", CN_MOBILE).await;

    let sink = Arc::new(MemorySink::new());
    let logger = Logger::with_sink("test", LogLevel::Info, sink.clone());
    let config = test_config(vec![format!("{}/", mirror.uri())]);

    let gatherer = gatherer(&config, &logger);
    let groups = run_carrier_groups(&gatherer, &engine(&logger)).await;
    assert_eq!(groups.len(), 3);

    let labels = |group: &[Target]| {
        let mut labels: Vec<String> = group.iter().map(|t| t.label.clone()).collect();
        labels.sort();
        labels
    };
    assert_eq!(labels(&groups[0]), vec!["联通北京"]);
    assert_eq!(labels(&groups[1]), vec!["电信上海", "电信浙江省"]);
    assert_eq!(labels(&groups[2]), vec!["四川移动", "移动广东"]);

    // The dedicated node list beats the columnar export for 电信上海
    let shanghai = groups[1].iter().find(|t| t.label == "电信上海").unwrap();
    assert_eq!(shanghai.address(), Some(Ipv4Addr::new(10, 2, 0, 1)));
    assert_eq!(gatherer.cache().fetch_count(), 1);

    let report = ResultAggregator::new(UnreachablePolicy::Show).aggregate(groups, &ReportLayout::ISP);
    let lines: Vec<&str> = report.split('\n').collect();
    assert_eq!(lines.len(), 5);
    assert!(lines[0].starts_with("联通北京"));
    assert_eq!(lines[1], "");
    assert!(lines[2].starts_with("电信上海"));
    assert!(lines[2].contains("电信浙江省"));
    assert_eq!(lines[3], "");
    assert!(lines[4].starts_with("四川移动"));
    assert!(lines[4].ends_with(" N/A | "));

    assert!(sink.contains("skipped"));
}

#[tokio::test]
async fn test_drop_policy_omits_unreachable() {
    let mirror = MockServer::start().await;
    serve(&mirror, "/health", "success").await;
    serve(&mirror, "/data/nodes.json", NODES).await;

    let logger = Logger::disabled();
    let config = test_config(vec![format!("{}/", mirror.uri())]);
    let groups = run_carrier_groups(&gatherer(&config, &logger), &engine(&logger)).await;

    let report = ResultAggregator::new(UnreachablePolicy::Drop).aggregate(groups, &ReportLayout::ISP);
    assert!(!report.contains("移动广东"));
    assert!(!report.contains("N/A"));
    assert!(report.contains("联通北京"));
}

#[tokio::test]
async fn test_all_mirrors_failing_yields_empty_report() {
    let broken = MockServer::start().await;
    serve(&broken, "/health", "success").await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502).set_body_string("Bad Gateway"))
        .mount(&broken)
        .await;
    let dead = MockServer::start().await;
    serve(&dead, "/health", "down for maintenance").await;

    let sink = Arc::new(MemorySink::new());
    let logger = Logger::with_sink("test", LogLevel::Warn, sink.clone());
    let config = test_config(vec![format!("{}/", dead.uri()), format!("{}/", broken.uri())]);

    let groups = run_carrier_groups(&gatherer(&config, &logger), &engine(&logger)).await;
    assert!(groups.iter().all(|group| group.is_empty()));

    let report = ResultAggregator::new(UnreachablePolicy::Show).aggregate(groups, &ReportLayout::ISP);
    assert!(report.is_empty());
    assert!(sink.contains("all mirrors failed"));
}
