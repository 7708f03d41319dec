pub const HEALTH: &str = "/api/health";

pub const TRACK_OPEN: &str = "/track-open/:id";
pub const TRACK_CLICK: &str = "/track-click/:id";
pub const UNSUBSCRIBE: &str = "/unsubscribe";

pub const SUBSCRIBERS: &str = "/api/subscribers";
pub const SUBSCRIBER: &str = "/api/subscribers/:id";

pub const BOUNCES: &str = "/api/bounces";
pub const BOUNCE: &str = "/api/bounces/:id";
pub const BOUNCE_STATS: &str = "/api/bounces/stats";

pub const CAMPAIGNS: &str = "/api/campaigns";
pub const CAMPAIGN_STATS: &str = "/api/campaigns/stats";
pub const CAMPAIGN_RUN: &str = "/api/campaigns/run";

pub const TRACKING_EVENTS: &str = "/api/tracking/events";
pub const TRACKING_TIMELINE: &str = "/api/tracking/timeline";
pub const TRACKING_BY_DAY: &str = "/api/tracking/by-day";

pub const DASHBOARD: &str = "/api/dashboard";
pub const STREAM: &str = "/api/stream";
