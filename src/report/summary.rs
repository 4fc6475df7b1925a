//! HTML summary rendering for dispatched reports.

use crate::store::Lead;

/// Render the backlog as a self-contained HTML table.
pub fn render_html(leads: &[Lead]) -> String {
    if leads.is_empty() {
        return "<p>No new leads.</p>".to_string();
    }

    let mut html = String::from(
        "<table border=\"1\" cellpadding=\"4\" cellspacing=\"0\" \
         style=\"border-collapse:collapse;font-family:sans-serif;font-size:13px;\">\
         <thead><tr>\
         <th>User</th><th>Profile</th><th>Post</th><th>Posted</th>\
         <th>Link</th><th>Scraped</th><th>Query</th>\
         </tr></thead><tbody>",
    );

    for lead in leads {
        html.push_str("<tr>");
        push_cell(&mut html, &lead.user_name);
        push_link_cell(&mut html, lead.profile_url.as_deref());
        push_cell(&mut html, &lead.post_content);
        // Estimated timestamps are visibly marked so recency is not
        // mistaken for a parsed date.
        let posted = if lead.posted_at_estimated {
            format!("~{} (estimated)", lead.posted_at.format("%Y-%m-%d %H:%M"))
        } else {
            lead.posted_at.format("%Y-%m-%d %H:%M").to_string()
        };
        push_cell(&mut html, &posted);
        push_link_cell(&mut html, Some(&lead.post_url));
        push_cell(&mut html, &lead.scraped_at.format("%Y-%m-%d %H:%M").to_string());
        push_cell(&mut html, &lead.search_query_ref);
        html.push_str("</tr>");
    }

    html.push_str("</tbody></table>");
    html
}

fn push_cell(html: &mut String, value: &str) {
    html.push_str("<td>");
    html.push_str(&escape(value));
    html.push_str("</td>");
}

fn push_link_cell(html: &mut String, url: Option<&str>) {
    match url {
        Some(u) => {
            let escaped = escape(u);
            html.push_str(&format!("<td><a href=\"{escaped}\">{escaped}</a></td>"));
        }
        None => html.push_str("<td></td>"),
    }
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
