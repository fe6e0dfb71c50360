//! Built-in target catalogs for the relay and website reports

use super::Target;
use std::net::Ipv4Addr;

/// Telegram data center
#[derive(Debug, Clone, Copy)]
pub struct RelayNode {
    pub id: u8,
    pub name: &'static str,
    pub location: &'static str,
    pub address: Ipv4Addr,
}

impl RelayNode {
    /// Report label, e.g. `TG-DC1 MIA USA`
    pub fn label(&self) -> String {
        format!("{} {}", self.name, self.location)
    }
}

pub const TELEGRAM_DCS: [RelayNode; 5] = [
    RelayNode { id: 1, name: "TG-DC1", location: "MIA USA", address: Ipv4Addr::new(149, 154, 175, 50) },
    RelayNode { id: 2, name: "TG-DC2", location: "AMS NL", address: Ipv4Addr::new(149, 154, 167, 50) },
    RelayNode { id: 3, name: "TG-DC3", location: "MIA USA", address: Ipv4Addr::new(149, 154, 175, 100) },
    RelayNode { id: 4, name: "TG-DC4", location: "AMS NL", address: Ipv4Addr::new(149, 154, 167, 91) },
    RelayNode { id: 5, name: "TG-DC5", location: "Singapore", address: Ipv4Addr::new(91, 108, 56, 100) },
];

/// Website probed by the connectivity report
#[derive(Debug, Clone, Copy)]
pub struct Website {
    pub name: &'static str,
    pub url: &'static str,
    pub category: &'static str,
}

const fn site(name: &'static str, url: &'static str, category: &'static str) -> Website {
    Website { name, url, category }
}

pub const POPULAR_WEBSITES: &[Website] = &[
    site("Google", "https://www.google.com", "search"),
    site("Bing", "https://www.bing.com", "search"),
    site("Facebook", "https://www.facebook.com", "social"),
    site("Twitter/X", "https://www.twitter.com", "social"),
    site("Instagram", "https://www.instagram.com", "social"),
    site("Reddit", "https://www.reddit.com", "social"),
    site("TikTok", "https://www.tiktok.com", "social"),
    site("YouTube", "https://www.youtube.com", "video"),
    site("Netflix", "https://www.netflix.com", "video"),
    site("DisneyPlus", "https://www.disneyplus.com", "video"),
    site("PrimeVideo", "https://www.primevideo.com", "video"),
    site("Spotify", "https://www.spotify.com", "video"),
    site("Twitch", "https://www.twitch.tv", "video"),
    site("OpenAI", "https://chat.openai.com", "ai"),
    site("Claude", "https://claude.ai", "ai"),
    site("Gemini", "https://gemini.google.com", "ai"),
    site("Sora", "https://sora.com", "ai"),
    site("MetaAI", "https://www.meta.ai", "ai"),
    site("GitHub", "https://www.github.com", "dev"),
    site("GitLab", "https://gitlab.com", "dev"),
    site("StackOverflow", "https://stackoverflow.com", "dev"),
    site("Docker Hub", "https://hub.docker.com", "dev"),
    site("AWS", "https://aws.amazon.com", "cloud"),
    site("Azure", "https://portal.azure.com", "cloud"),
    site("Google Cloud", "https://console.cloud.google.com", "cloud"),
    site("DigitalOcean", "https://www.digitalocean.com", "cloud"),
    site("Amazon", "https://www.amazon.com", "shopping"),
    site("eBay", "https://www.ebay.com", "shopping"),
    site("AliExpress", "https://www.aliexpress.com", "shopping"),
    site("Wikipedia", "https://www.wikipedia.org", "tool"),
    site("Steam", "https://store.steampowered.com", "gaming"),
    site("Apple", "https://www.apple.com", "tech"),
    site("Microsoft", "https://www.microsoft.com", "tech"),
    site("Bilibili", "https://www.bilibili.com", "video"),
    site("iQIYI", "https://www.iq.com", "video"),
    site("ViuTV", "https://www.viu.com", "video"),
    site("TVB Anywhere", "https://www.tvbanywhere.com", "video"),
    site("CNN", "https://www.cnn.com", "news"),
    site("BBC", "https://www.bbc.com", "news"),
    site("NYTimes", "https://www.nytimes.com", "news"),
];

/// Fresh, unprobed relay targets
pub fn relay_targets() -> Vec<Target> {
    TELEGRAM_DCS
        .iter()
        .map(|dc| Target::relay(&dc.label(), dc.address))
        .collect()
}

/// Fresh, unprobed website targets
pub fn website_targets() -> Vec<Target> {
    POPULAR_WEBSITES
        .iter()
        .map(|w| Target::website(w.name, w.url, w.category))
        .collect()
}
