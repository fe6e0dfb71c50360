//! Main application orchestration and execution

use crate::{
    cli::Cli,
    client::{MirrorFetcher, PayloadSource},
    config::{display_config_summary, load_config},
    dns::{HostResolver, SystemResolver},
    error::Result,
    executor::{Capabilities, ProbeEngine},
    logging::Logger,
    models::{catalog, Config, Target},
    output::{layout_for, ConsoleStyle, ResultAggregator},
    sources::SourceGatherer,
    stats::ReportSummary,
    types::{Carrier, ReportMode},
};
use std::sync::Arc;

/// Carrier groups in report order
pub const CARRIER_ORDER: [Carrier; 3] = [Carrier::Unicom, Carrier::Telecom, Carrier::Mobile];

/// Gather and probe one carrier group
async fn carrier_group(gatherer: &SourceGatherer, engine: &ProbeEngine, carrier: Carrier) -> Vec<Target> {
    let targets = gatherer.gather(carrier).await;
    engine.probe_all(targets).await
}

/// Run all three carrier pipelines concurrently and wait for every one
///
/// Groups come back in [`CARRIER_ORDER`], each probed but not yet sorted.
pub async fn run_carrier_groups(gatherer: &SourceGatherer, engine: &ProbeEngine) -> Vec<Vec<Target>> {
    let [first, second, third] = CARRIER_ORDER;
    let (a, b, c) = tokio::join!(
        carrier_group(gatherer, engine, first),
        carrier_group(gatherer, engine, second),
        carrier_group(gatherer, engine, third),
    );
    vec![a, b, c]
}

/// Main application struct that coordinates all components
pub struct App {
    config: Config,
    logger: Logger,
    style: ConsoleStyle,
}

impl App {
    /// Create a new application instance from CLI arguments
    pub fn new(cli: Cli) -> Result<Self> {
        let config = load_config(cli)?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        let logger = Logger::with_config("pingtest", &config);
        let style = ConsoleStyle::new(config.enable_color);
        Self { config, logger, style }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the application
    pub async fn run(&self) -> Result<()> {
        let session = self.logger.start_session().await;
        self.logger.add_context_field("mode", self.config.mode.as_str()).await;

        println!("{}", self.style.banner(crate::PKG_NAME, crate::VERSION, crate::PROJECT_URL));
        if self.config.debug {
            println!("Build: {} ({})", crate::BUILD_TIME, crate::GIT_COMMIT.unwrap_or("unknown commit"));
            println!("\nConfiguration Summary:\n{}\n", display_config_summary(&self.config));
        }
        self.logger.debug("session started").field("session", &session).log().await;

        match self.config.mode {
            ReportMode::Isp => {
                println!("Testing domestic carrier latency...");
                println!("{}", self.isp_report().await?);
            }
            ReportMode::Relay => {
                println!("Testing Telegram data centers...");
                println!("{}", self.relay_report().await?);
            }
            ReportMode::Web => {
                println!("Testing popular websites...");
                println!("{}", self.web_report().await?);
            }
            ReportMode::Global => self.run_global().await?,
        }

        Ok(())
    }

    /// Every report in order, each under its own section header
    async fn run_global(&self) -> Result<()> {
        println!("Running all tests...");

        println!("{}", self.style.section_header(1, 3, "Domestic carrier latency"));
        println!("{}", self.isp_report().await?);

        println!("{}", self.style.section_header(2, 3, "Telegram data centers"));
        println!("{}", self.relay_report().await?);

        println!("{}", self.style.section_header(3, 3, "Popular websites"));
        println!("{}", self.web_report().await?);

        println!("{}", self.style.completion());
        Ok(())
    }

    /// Detected once per report; each report builds its own engine
    async fn icmp_engine(&self) -> Result<ProbeEngine> {
        let capabilities = Capabilities::detect().await;
        self.logger
            .info("probe capabilities")
            .field("icmp_socket", capabilities.icmp_socket)
            .field("ping_command", capabilities.ping_command)
            .log()
            .await;
        ProbeEngine::icmp(&self.config, &capabilities, &self.logger).await
    }

    /// Domestic carrier report: gather, probe and render three carrier groups
    pub async fn isp_report(&self) -> Result<String> {
        let fetcher: Arc<dyn PayloadSource> = Arc::new(MirrorFetcher::new(&self.config, Arc::new(self.logger.clone()))?);
        let resolver: Arc<dyn HostResolver> = Arc::new(SystemResolver::new(self.config.resolve_timeout()));
        let gatherer = SourceGatherer::from_config(&self.config, fetcher, resolver, &self.logger);
        let engine = self.icmp_engine().await?;

        let groups = run_carrier_groups(&gatherer, &engine).await;
        Ok(self.finish("isp", groups, ReportMode::Isp, &engine).await)
    }

    /// Relay report over the fixed Telegram data center list
    pub async fn relay_report(&self) -> Result<String> {
        let engine = self.icmp_engine().await?;
        let measured = engine.probe_all(catalog::relay_targets()).await;
        Ok(self.finish("relay", vec![measured], ReportMode::Relay, &engine).await)
    }

    /// Website report over the fixed catalog
    pub async fn web_report(&self) -> Result<String> {
        let engine = ProbeEngine::web(&self.config, &self.logger)?;
        let measured = engine.probe_all(catalog::website_targets()).await;
        Ok(self.finish("web", vec![measured], ReportMode::Web, &engine).await)
    }

    /// Log a summary and render the ordered groups
    async fn finish(&self, report: &str, groups: Vec<Vec<Target>>, mode: ReportMode, engine: &ProbeEngine) -> String {
        let all: Vec<Target> = groups.iter().flatten().cloned().collect();
        let summary = ReportSummary::from_targets(&all);
        let stats = engine.stats();
        self.logger
            .info("report finished")
            .field("report", report)
            .field("summary", &summary)
            .field("peak_concurrency", stats.peak_concurrency)
            .field("panicked", stats.panicked)
            .log()
            .await;
        if self.config.verbose {
            eprintln!("{}", self.style.summary_line(&summary));
        }

        ResultAggregator::new(self.config.unreachable).aggregate(groups, &layout_for(mode))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_carrier_order() {
        assert_eq!(CARRIER_ORDER.map(|c| c.prefix()), ["联通", "电信", "移动"]);
    }

    #[test]
    fn test_app_keeps_config() {
        let mut config = Config::default();
        config.mode = ReportMode::Relay;
        let app = App::with_config(config);
        assert_eq!(app.config().mode, ReportMode::Relay);
    }
}
