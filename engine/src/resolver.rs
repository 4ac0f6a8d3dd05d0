//! Page id to page configuration lookup.

use xuad_types::{PageConfig, Strategy};

/// Find the configuration that applies to `page`.
///
/// The first entry whose `page_name` equals `page` exactly wins; otherwise the
/// strategy's fallback applies. There is no prefix or case-insensitive matching.
#[must_use]
pub fn resolve_page_config<'a>(strategy: &'a Strategy, page: &str) -> Option<&'a PageConfig> {
    if let Some(config) = strategy
        .page_configs
        .iter()
        .find(|config| config.page_name.as_deref() == Some(page))
    {
        tracing::debug!(page, remark = ?config.page_remark, "Matched page config");
        return Some(config);
    }

    let fallback = strategy.fallback_config.as_ref();
    if fallback.is_some() {
        tracing::debug!(page, "Using fallback page config");
    }
    fallback
}
