//! Raw payload parsing into canonical targets
//!
//! Three schema variants feed the ISP report:
//! - `NetExport`: speedtest.net CSV export, region in column 3 and host in column 4
//! - `CnExport`: speedtest.cn CSV export, `host:port` in column 5 and the
//!   name split across columns 10 and 8
//! - `NodeList`: the dedicated ICMP node list (JSON array)
//!
//! The pure functions here never fail on bad rows; they skip them and report
//! why. [`RecordParser`] adds hostname resolution and logging on top.
//!
//! Labels keep the row's own spelling; [`normalize_region`] only decides
//! which rows describe the same region.

use crate::{
    dns::HostResolver,
    error::Result,
    logging::Logger,
    models::{normalize_region, Target},
    types::{Carrier, SourcePriority},
};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::{collections::HashSet, net::Ipv4Addr, sync::Arc};

/// Column holding the header marker in either export
const HEADER_MARKER: &str = "country_code";

/// Hostnames resolved at once while parsing an export payload
const RESOLVE_CONCURRENCY: usize = 16;

/// Payload layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemaVariant {
    NetExport,
    CnExport,
    NodeList,
}

impl SchemaVariant {
    /// Merge priority of targets produced from this layout
    pub fn priority(&self) -> SourcePriority {
        match self {
            SchemaVariant::NodeList => SourcePriority::Dedicated,
            SchemaVariant::NetExport => SourcePriority::Regional,
            SchemaVariant::CnExport => SourcePriority::Generic,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaVariant::NetExport => "net-export",
            SchemaVariant::CnExport => "cn-export",
            SchemaVariant::NodeList => "node-list",
        }
    }
}

/// Parsed records plus a reason for every skipped row
#[derive(Debug, Clone, Default)]
pub struct ParseReport<T> {
    pub records: Vec<T>,
    pub skipped: Vec<String>,
}

impl<T> ParseReport<T> {
    fn new() -> Self {
        Self { records: Vec::new(), skipped: Vec::new() }
    }
}

/// Export row whose host may still need resolving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Display name as the row spells it
    pub name: String,
    /// IPv4 literal or hostname
    pub host: String,
}

/// One entry of the node-list JSON
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub province: String,
    pub isp_code: String,
    #[serde(default)]
    pub isp: String,
    pub ip_version: String,
    pub ips: String,
}

/// Read every row of a delimited payload, dropping the header row if present
fn read_rows(payload: &str, skipped: &mut Vec<String>) -> Vec<csv::StringRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(payload.as_bytes());

    let mut rows = Vec::new();
    for (index, row) in reader.records().enumerate() {
        match row {
            Ok(record) => {
                let is_header = index == 0
                    && (record.get(6) == Some(HEADER_MARKER) || record.get(1) == Some(HEADER_MARKER));
                if !is_header {
                    rows.push(record);
                }
            }
            Err(e) => skipped.push(format!("row {}: {}", index + 1, e)),
        }
    }
    rows
}

/// speedtest.net export: at least 8 columns, region at 3, host at 4
///
/// The host is usually an IPv4 literal but may be a domain name.
pub fn parse_net_export(payload: &str) -> ParseReport<HostRecord> {
    let mut report = ParseReport::new();
    let rows = read_rows(payload, &mut report.skipped);

    for row in rows {
        if row.len() < 8 {
            report.skipped.push(format!("net-export row has {} columns, need 8", row.len()));
            continue;
        }
        if normalize_region(&row[3]).is_empty() {
            report.skipped.push("net-export row has an empty region".to_string());
            continue;
        }
        if row[4].is_empty() {
            report.skipped.push(format!("net-export row for {} has no host", &row[3]));
            continue;
        }
        report.records.push(HostRecord { name: row[3].to_string(), host: row[4].to_string() });
    }
    report
}

/// speedtest.cn export: at least 11 columns, `host:port` at 5, name at 10 + 8
pub fn parse_cn_export(payload: &str) -> ParseReport<HostRecord> {
    let mut report = ParseReport::new();
    let rows = read_rows(payload, &mut report.skipped);

    for row in rows {
        if row.len() < 11 {
            report.skipped.push(format!("cn-export row has {} columns, need 11", row.len()));
            continue;
        }
        let host = match row[5].split_once(':') {
            Some((host, _port)) if !host.trim().is_empty() => host.trim().to_string(),
            _ => {
                report.skipped.push(format!("cn-export host '{}' lacks a port", &row[5]));
                continue;
            }
        };
        let name = format!("{}{}", &row[10], &row[8]);
        if normalize_region(&name).is_empty() {
            report.skipped.push("cn-export row has an empty name".to_string());
            continue;
        }
        report.records.push(HostRecord { name, host });
    }
    report
}

/// Decode the node-list JSON
pub fn parse_node_list(payload: &str) -> Result<Vec<NodeEntry>> {
    Ok(serde_json::from_str(payload)?)
}

/// IPv4 node-list entries for one carrier, first entry per region
///
/// Node-list labels use the cleaned province name.
pub fn node_targets(entries: &[NodeEntry], carrier: Carrier) -> ParseReport<Target> {
    let mut report = ParseReport::new();
    let mut seen = HashSet::new();

    for entry in entries {
        if entry.ip_version != "v4" || entry.isp_code != carrier.node_code() {
            continue;
        }
        let region = normalize_region(&entry.province);
        if region.is_empty() || seen.contains(&region) {
            continue;
        }
        let first_valid = entry
            .ips
            .split(',')
            .find_map(|ip| ip.trim().parse::<Ipv4Addr>().ok());
        match first_valid {
            Some(ip) => {
                seen.insert(region.clone());
                report.records.push(Target::carrier_node(carrier, &region, ip, SourcePriority::Dedicated));
            }
            None => report.skipped.push(format!("node-list entry for {} has no valid IPv4", entry.province)),
        }
    }
    report
}

/// Turns payloads into targets, resolving hostnames and logging skipped rows
pub struct RecordParser {
    resolver: Arc<dyn HostResolver>,
    logger: Logger,
}

impl RecordParser {
    pub fn new(resolver: Arc<dyn HostResolver>, logger: &Logger) -> Self {
        Self {
            resolver,
            logger: logger.child("parser"),
        }
    }

    /// Parse one payload; an empty or malformed payload yields no targets
    pub async fn parse(&self, payload: &str, variant: SchemaVariant, carrier: Carrier) -> Vec<Target> {
        if payload.trim().is_empty() {
            return Vec::new();
        }

        let report = match variant {
            SchemaVariant::NetExport => self.resolve_hosts(parse_net_export(payload), carrier, variant.priority()).await,
            SchemaVariant::CnExport => self.resolve_hosts(parse_cn_export(payload), carrier, variant.priority()).await,
            SchemaVariant::NodeList => match parse_node_list(payload) {
                Ok(entries) => node_targets(&entries, carrier),
                Err(e) => {
                    self.logger.warn("node list is not valid JSON").error_info(&e).log().await;
                    return Vec::new();
                }
            },
        };

        self.log_report(&report, variant, carrier).await;
        report.records
    }

    /// Resolve export hosts; IPv4 literals pass straight through and
    /// unresolvable rows are dropped
    pub async fn resolve_hosts(
        &self,
        hosts: ParseReport<HostRecord>,
        carrier: Carrier,
        priority: SourcePriority,
    ) -> ParseReport<Target> {
        let resolved: Vec<_> = stream::iter(hosts.records)
            .map(|record| async move {
                let result = self.resolver.resolve_v4(&record.host).await;
                (record, result)
            })
            .buffered(RESOLVE_CONCURRENCY)
            .collect()
            .await;

        let mut report = ParseReport { records: Vec::new(), skipped: hosts.skipped };
        for (record, result) in resolved {
            match result {
                Ok(ip) => report.records.push(Target::carrier_node(carrier, &record.name, ip, priority)),
                Err(e) => report.skipped.push(format!("cannot resolve {}: {}", record.host, e)),
            }
        }
        report
    }

    async fn log_report(&self, report: &ParseReport<Target>, variant: SchemaVariant, carrier: Carrier) {
        for reason in &report.skipped {
            self.logger.info("skipped row")
                .field("source", variant.as_str())
                .field("reason", reason)
                .log().await;
        }
        self.logger.info("parsed source")
            .field("source", variant.as_str())
            .field("carrier", carrier.short_name())
            .field("targets", report.records.len())
            .field("skipped", report.skipped.len())
            .log().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::StaticResolver;
    use crate::logging::{LogLevel, MemorySink};
    use crate::output::{render, ReportLayout};

    const NET_HEADER: &str = "id,host,port,sponsor,ip,country_name,country_code,extra";

    fn parser() -> (RecordParser, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        let logger = Logger::with_sink("test", LogLevel::Info, sink.clone());
        let resolver = StaticResolver::new().with_host("speed.gd.example.cn", Ipv4Addr::new(10, 8, 0, 1));
        (RecordParser::new(Arc::new(resolver), &logger), sink)
    }

    #[test]
    fn test_net_export_skips_malformed_row() {
        let payload = format!(
            "{}\n1,a,8080,广东省,1.1.1.1,China,CN,x\n2,b,8080,short\n3,c,8080,四川,2.2.2.2,China,CN,x\n",
            NET_HEADER
        );
        let report = parse_net_export(&payload);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.records[0], HostRecord { name: "广东省".into(), host: "1.1.1.1".into() });
        assert_eq!(report.records[1].host, "2.2.2.2");
    }

    #[test]
    fn test_net_export_empty_host_skipped() {
        let report = parse_net_export("1,a,8080,广东,,China,CN,x\n");
        assert!(report.records.is_empty());
        assert!(report.skipped[0].contains("no host"));
    }

    #[test]
    fn test_header_sniffed_in_column_one() {
        let payload = "x,country_code,a,b,c,d,e,f\n1,a,8080,江苏,3.3.3.3,China,CN,x\n";
        let report = parse_net_export(payload);
        assert_eq!(report.records.len(), 1);
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn test_cn_export_rows() {
        let payload = "\
0,1,2,3,4,5,country_code,7,8,9,10
a,b,c,d,e,1.2.3.4:8080,CN,h,电信,j,广东
a,b,c,d,e,speed.gd.example.cn:80,CN,h,电信,j,湖南省
a,b,c,d,e,5.6.7.8,CN,h,电信,j,浙江
a,b,c
";
        let report = parse_cn_export(payload);
        assert_eq!(report.records.len(), 2);
        assert_eq!(report.records[0], HostRecord { name: "广东电信".into(), host: "1.2.3.4".into() });
        assert_eq!(report.records[1].host, "speed.gd.example.cn");
        assert_eq!(report.records[1].name, "湖南省电信");
        assert_eq!(report.skipped.len(), 2);
    }

    #[test]
    fn test_node_targets_filters_and_dedups() {
        let payload = r#"[
            {"province":"广东省","isp_code":"ct","isp":"电信","ip_version":"v4","ips":"bad, 14.1.1.1,14.1.1.2"},
            {"province":"广东","isp_code":"ct","isp":"电信","ip_version":"v4","ips":"14.9.9.9"},
            {"province":"广东省","isp_code":"ct","isp":"电信","ip_version":"v6","ips":"240e::1"},
            {"province":"广东省","isp_code":"cm","isp":"移动","ip_version":"v4","ips":"120.1.1.1"},
            {"province":"西藏自治区","isp_code":"ct","isp":"电信","ip_version":"v4","ips":"nope"}
        ]"#;
        let entries = parse_node_list(payload).unwrap();
        let report = node_targets(&entries, Carrier::Telecom);

        assert_eq!(report.records.len(), 1);
        let target = &report.records[0];
        assert_eq!(target.label, "电信广东");
        assert_eq!(target.address(), Some(Ipv4Addr::new(14, 1, 1, 1)));
        assert_eq!(target.source_priority, SourcePriority::Dedicated);
        assert_eq!(report.skipped.len(), 1);
    }

    #[test]
    fn test_node_list_rejects_garbage() {
        assert!(parse_node_list("<html>").is_err());
    }

    #[tokio::test]
    async fn test_parser_resolves_cn_hosts() {
        let (parser, sink) = parser();
        let payload = "\
a,b,c,d,e,speed.gd.example.cn:80,CN,h,联通,j,广东
a,b,c,d,e,unknown.example.cn:80,CN,h,联通,j,湖北
";
        let targets = parser.parse(payload, SchemaVariant::CnExport, Carrier::Unicom).await;
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].label, "广东联通");
        assert_eq!(targets[0].region, "广东");
        assert_eq!(targets[0].address(), Some(Ipv4Addr::new(10, 8, 0, 1)));
        assert_eq!(targets[0].source_priority, SourcePriority::Generic);
        assert!(sink.contains("cannot resolve unknown.example.cn"));
    }

    #[tokio::test]
    async fn test_parser_resolves_net_export_hostnames() {
        let (parser, sink) = parser();
        let payload = format!(
            "{}\n1,a,8080,广东省,speed.gd.example.cn,China,CN,x\n2,b,8080,湖北,missing.example.cn,China,CN,x\n3,c,8080,四川,2.2.2.2,China,CN,x\n",
            NET_HEADER
        );
        let targets = parser.parse(&payload, SchemaVariant::NetExport, Carrier::Telecom).await;
        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].address(), Some(Ipv4Addr::new(10, 8, 0, 1)));
        assert_eq!(targets[0].source_priority, SourcePriority::Regional);
        assert_eq!(targets[1].address(), Some(Ipv4Addr::new(2, 2, 2, 2)));
        assert!(sink.contains("cannot resolve missing.example.cn"));
    }

    #[tokio::test]
    async fn test_parsed_label_rendered_verbatim() {
        let (parser, _) = parser();
        let targets = parser
            .parse("1,a,8080,广东省,1.1.1.1,China,CN,x\n", SchemaVariant::NetExport, Carrier::Mobile)
            .await;
        assert_eq!(targets[0].label, "移动广东省");
        assert_eq!(targets[0].region, "广东");

        let report = render(&targets, &ReportLayout::ISP);
        assert!(report.starts_with("移动广东省"));
        assert!(report.contains(" N/A | "));
    }

    #[tokio::test]
    async fn test_empty_payload_yields_nothing() {
        let (parser, sink) = parser();
        for variant in [SchemaVariant::NetExport, SchemaVariant::CnExport, SchemaVariant::NodeList] {
            assert!(parser.parse("", variant, Carrier::Mobile).await.is_empty());
        }
        assert!(sink.lines().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_node_list_logged() {
        let (parser, sink) = parser();
        let targets = parser.parse("{not json", SchemaVariant::NodeList, Carrier::Mobile).await;
        assert!(targets.is_empty());
        assert!(sink.contains("node list is not valid JSON"));
    }

    #[test]
    fn test_variant_priorities() {
        assert_eq!(SchemaVariant::NodeList.priority(), SourcePriority::Dedicated);
        assert_eq!(SchemaVariant::NetExport.priority(), SourcePriority::Regional);
        assert_eq!(SchemaVariant::CnExport.priority(), SourcePriority::Generic);
    }
}
