//! Supervisor ("act as") discovery.

use checknarc_portal_models::Delegate;
use scraper::{Html, Selector};

use crate::client::PortalRequest;
use crate::{Scraper, endpoints};

/// Drop-down listing the supervisors a delegate account may search for.
pub const SUPERVISOR_SELECT: &str = "select#rx_search_request_supervisor_id";

/// Reads the supervisor options from the search form page.
///
/// The first option is the "none" placeholder and is skipped. A page
/// without the drop-down yields an empty list.
#[must_use]
pub fn parse_delegates(html: &str) -> Vec<Delegate> {
    let document = Html::parse_document(html);
    let select = Selector::parse(SUPERVISOR_SELECT).unwrap_or_else(|_| unreachable!());
    let option = Selector::parse("option").unwrap_or_else(|_| unreachable!());

    let Some(element) = document.select(&select).next() else {
        return Vec::new();
    };

    element
        .select(&option)
        .skip(1)
        .filter_map(|opt| {
            let id = opt.value().attr("value")?.trim();
            if id.is_empty() {
                return None;
            }
            let name = opt.text().collect::<String>().trim().to_owned();
            Some(Delegate {
                name,
                id: id.to_owned(),
            })
        })
        .collect()
}

impl Scraper {
    /// Lists the supervisors this account can search on behalf of.
    ///
    /// Never fails: a network error or a form without the drop-down means
    /// delegation is not available and an empty list is returned.
    pub async fn discover_delegates(&mut self) -> Vec<Delegate> {
        let request = PortalRequest::get(self.client.url(endpoints::SEARCH_FORM));
        let html = match self.client.text(&request, self.config.attempts).await {
            Ok(html) => html,
            Err(e) => {
                log::warn!("Could not load search form, continuing without delegation: {e}");
                return Vec::new();
            }
        };

        self.absorb_token(&html);
        let delegates = parse_delegates(&html);
        log::info!("Found {} delegate(s)", delegates.len());
        delegates
    }
}
