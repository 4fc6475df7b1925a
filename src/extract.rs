//! Structured-field extraction from raw post fragments.
//!
//! One fragment in, one lead out — or a typed rejection. Each field is
//! independently fallible: the three optional fields degrade the record
//! and are tagged, while a fragment whose post URL cannot be resolved is
//! rejected outright because the dedup key cannot be synthesized.

use crate::config::{FieldSelector, SelectorSchema};
use crate::error::FragmentError;
use crate::normalize::{resolve_url, DateNormalizer};
use crate::store::NewLead;
use chrono::{DateTime, Utc};
use scraper::{ElementRef, Html, Selector};

/// A degradable lead field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadField {
    UserName,
    ProfileUrl,
    PostedDate,
    PostContent,
}

/// A successfully extracted record plus its field-level failure tags.
///
/// The orchestrator decides keep-degraded vs. reject from the tags; the
/// extractor itself never drops a record that has a dedup key.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub lead: NewLead,
    pub missing: Vec<LeadField>,
}

impl Extracted {
    pub fn is_degraded(&self) -> bool {
        !self.missing.is_empty()
    }
}

/// Field-schema extractor bound to one search deployment.
#[derive(Debug)]
pub struct Extractor {
    schema: SelectorSchema,
    base_url: String,
    query_ref: String,
    dates: DateNormalizer,
    user_name: Option<Selector>,
    profile_url: Option<Selector>,
    posted_date: Option<Selector>,
    post_content: Option<Selector>,
    post_url: Option<Selector>,
}

impl Extractor {
    /// Compile the schema's selectors. A selector that does not parse is
    /// a configuration defect surfaced immediately, not per fragment.
    pub fn new(
        schema: SelectorSchema,
        base_url: String,
        query_ref: String,
        date_formats: &[String],
    ) -> Result<Self, FragmentError> {
        Ok(Self {
            user_name: compile("user_name", &schema.user_name)?,
            profile_url: compile("profile_url", &schema.profile_url)?,
            posted_date: compile("posted_date", &schema.posted_date)?,
            post_content: compile("post_content", &schema.post_content)?,
            post_url: compile("post_url", &schema.post_url)?,
            dates: DateNormalizer::new(date_formats),
            schema,
            base_url,
            query_ref,
        })
    }

    /// Extract one fragment into a lead, evaluated against `now`.
    pub fn extract(&self, fragment: &str, now: DateTime<Utc>) -> Result<Extracted, FragmentError> {
        let doc = Html::parse_fragment(fragment);
        let root = fragment_root(&doc).ok_or_else(|| FragmentError::MissingPostUrl {
            selector: self.schema.post_url.selector.clone(),
        })?;

        // Dedup key first: without it nothing else matters.
        let post_url = self
            .read(root, &self.schema.post_url, self.post_url.as_ref())
            .map(|raw| match &self.schema.post_url.template {
                Some(template) => template.replace("{}", &raw),
                None => raw,
            })
            .and_then(|candidate| resolve_url(&candidate, &self.base_url))
            .ok_or_else(|| FragmentError::MissingPostUrl {
                selector: self.schema.post_url.selector.clone(),
            })?;

        let mut missing = Vec::new();

        let user_name = self
            .read(root, &self.schema.user_name, self.user_name.as_ref())
            .unwrap_or_else(|| {
                missing.push(LeadField::UserName);
                String::new()
            });

        let profile_url = self
            .read(root, &self.schema.profile_url, self.profile_url.as_ref())
            .and_then(|raw| resolve_url(&raw, &self.base_url));
        if profile_url.is_none() {
            missing.push(LeadField::ProfileUrl);
        }

        let post_content = self
            .read(root, &self.schema.post_content, self.post_content.as_ref())
            .unwrap_or_else(|| {
                missing.push(LeadField::PostContent);
                String::new()
            });

        let raw_date = self.read(root, &self.schema.posted_date, self.posted_date.as_ref());
        if raw_date.is_none() {
            missing.push(LeadField::PostedDate);
        }
        let date = self.dates.normalize(raw_date.as_deref().unwrap_or(""), now);

        Ok(Extracted {
            lead: NewLead {
                profile_url,
                user_name,
                post_content,
                posted_at: date.timestamp,
                posted_at_estimated: date.estimated,
                post_url,
                search_query_ref: self.query_ref.clone(),
            },
            missing,
        })
    }

    /// Read one field from the fragment: text content, or a named
    /// attribute for URL-ish fields. Empty results count as missing.
    fn read(
        &self,
        root: ElementRef<'_>,
        field: &FieldSelector,
        compiled: Option<&Selector>,
    ) -> Option<String> {
        let el = match compiled {
            Some(selector) => root.select(selector).next()?,
            // Empty selector: the fragment's container element itself.
            None => root,
        };
        match &field.attr {
            Some(attr) => el
                .value()
                .attr(attr)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
            None => {
                let text = element_text(&el);
                (!text.is_empty()).then_some(text)
            }
        }
    }
}

fn compile(field: &'static str, spec: &FieldSelector) -> Result<Option<Selector>, FragmentError> {
    if spec.selector.trim().is_empty() {
        return Ok(None);
    }
    Selector::parse(&spec.selector)
        .map(Some)
        .map_err(|_| FragmentError::BadSelector {
            field,
            selector: spec.selector.clone(),
        })
}

/// First element child of the parsed fragment — the post container whose
/// outer HTML the retriever collected.
fn fragment_root(doc: &Html) -> Option<ElementRef<'_>> {
    doc.root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .next()
}

fn element_text(el: &ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
