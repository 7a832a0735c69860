use std::collections::BTreeMap;

use serde::Serialize;

/// Analytics identifiers the browser needs to boot its trackers.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsIds {
    pub google_id: Option<String>,
    pub posthog_key: Option<String>,
}

/// Runtime settings served to the browser by `GET /api/config`.
///
/// Never carries the backend base URL.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfig {
    pub site_url: String,
    pub features: BTreeMap<String, bool>,
    pub analytics: AnalyticsIds,
}
