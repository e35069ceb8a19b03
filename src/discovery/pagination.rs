//! List pagination
//!
//! Walks a list resource with `?s=<offset>&l=<page size>` until the server
//! returns an empty page. Counter inconsistencies are reported as warnings;
//! only transport failures and runaway lists are errors.

use std::collections::BTreeSet;

use crate::error::RequestError;
use crate::resource::{Resource, ResourceKind};
use crate::server::ResourceFetcher;
use crate::tracker::WarningSink;

/// Page size and runaway guard
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSettings {
    pub page_size: u32,
    /// Error out after this many requests without reaching an empty page
    pub max_pages: u32,
}

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            max_pages: 100,
        }
    }
}

/// Href of the page starting at `offset`
pub fn page_href(href: &str, offset: u64, page_size: u32) -> String {
    let separator = if href.contains('?') { '&' } else { '?' };
    format!("{href}{separator}s={offset}&l={page_size}")
}

/// Fetch every item of the list at `href`, in server order
pub async fn paginate_list_items(
    fetcher: &dyn ResourceFetcher,
    list_kind: ResourceKind,
    href: &str,
    settings: PaginationSettings,
    warnings: &mut dyn WarningSink,
) -> Result<Vec<Resource>, RequestError> {
    let mut items = Vec::new();
    let mut reported_totals = BTreeSet::new();
    let mut offset: u64 = 0;
    let mut pages_requested: u32 = 0;

    loop {
        if pages_requested >= settings.max_pages {
            return Err(RequestError::TooManyPages {
                href: href.to_string(),
                max_pages: settings.max_pages,
            });
        }

        let current = page_href(href, offset, settings.page_size);
        let page = fetcher.fetch(list_kind, &current).await?;
        pages_requested += 1;

        let list = page.list.unwrap_or_default();
        if let Some(results) = list.results {
            if results as usize != list.items.len() {
                warnings.log_resource_warning(
                    list_kind,
                    &format!(
                        "{current} reported results={results} but contained {} items",
                        list.items.len()
                    ),
                );
            }
        }
        match list.all {
            Some(all) => {
                reported_totals.insert(all);
            }
            None => warnings.log_resource_warning(list_kind, &format!("{current} is missing the 'all' attribute")),
        }

        if list.items.is_empty() {
            break;
        }
        items.extend(list.items);
        offset += u64::from(settings.page_size);
    }

    tracing::debug!("{} {}: {} items over {} pages", list_kind, href, items.len(), pages_requested);

    if reported_totals.len() > 1 {
        warnings.log_resource_warning(
            list_kind,
            &format!("{href} reported a varying 'all' across pages: {reported_totals:?}"),
        );
    } else if let Some(all) = reported_totals.first() {
        if *all as usize != items.len() {
            warnings.log_resource_warning(
                list_kind,
                &format!("{href} reported all={all} but {} items were returned", items.len()),
            );
        }
    }

    Ok(items)
}
