//! Listing row → `VacancyRecord`.
//!
//! A row on the source page has a heading block (`h4` code, `h5` title, `h6`
//! salary), a descriptive `div.span5` of paragraphs, a `div.span3` of labelled
//! counts and dates, and a `div.span1` holding the detail link.

use chrono::NaiveDate;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use vacantes_core::{days_remaining, normalize_date, DateError, VacancyRecord};

pub const ROW_SELECTOR: &str = "table tbody tr .row";

const LABEL_VACANCIES: &str = "Vacantes";
const LABEL_APPLICATIONS: &str = "Postulaciones";
const LABEL_PUBLISHED: &str = "Publicado";
const LABEL_CLOSING: &str = "Fecha de cierre";
const CONTRACT_PREFIX: &str = "Tipo de contrato:";

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("invalid selector {selector:?}: {message}")]
    Selector { selector: String, message: String },
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("listing {code}: bad {field}: {source}")]
    Date {
        code: String,
        field: &'static str,
        #[source]
        source: DateError,
    },
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|e| ExtractError::Selector {
        selector: selector.to_string(),
        message: e.to_string(),
    })
}

#[derive(Debug, Clone)]
pub struct ListingSelectors {
    pub row: Selector,
    pub code: Selector,
    pub title: Selector,
    pub salary: Selector,
    pub description: Selector,
    pub location: Selector,
    pub metadata: Selector,
    pub detail_link: Selector,
}

impl ListingSelectors {
    pub fn new() -> Result<Self, ExtractError> {
        Ok(Self {
            row: parse_selector(ROW_SELECTOR)?,
            code: parse_selector("h4")?,
            title: parse_selector("h5")?,
            salary: parse_selector("h6")?,
            description: parse_selector("div.span5 p")?,
            location: parse_selector("div.span5 p.titulo-color")?,
            metadata: parse_selector("div.span3 p")?,
            detail_link: parse_selector("div.span1 a.btn-primary")?,
        })
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

fn first_text(root: ElementRef<'_>, selector: &Selector) -> String {
    root.select(selector)
        .next()
        .map(element_text)
        .unwrap_or_default()
}

fn joined_text(root: ElementRef<'_>, selector: &Selector) -> String {
    let joined = root
        .select(selector)
        .map(element_text)
        .collect::<Vec<_>>()
        .join(" ");
    collapse_whitespace(&joined)
}

#[derive(Debug, Default, PartialEq, Eq)]
struct DescriptionFields {
    experience: String,
    contract: String,
    remote_work: String,
}

/// Each paragraph feeds at most one field, checked in experience, contract,
/// remote-work order; later paragraphs overwrite earlier ones for the same field.
fn classify_description<I>(paragraphs: I) -> DescriptionFields
where
    I: IntoIterator<Item = String>,
{
    let mut fields = DescriptionFields::default();
    for text in paragraphs {
        let lower = text.to_lowercase();
        if lower.contains("experiencia") {
            fields.experience = text;
        } else if lower.contains("contrato") {
            fields.contract = text.replacen(CONTRACT_PREFIX, "", 1).trim().to_string();
        } else if lower.contains("teletrabajo") {
            fields.remote_work = text;
        }
    }
    fields
}

/// Strip the script-call tail the source appends after `;` and resolve against `origin`.
///
/// Only http(s) links on the same origin are kept; anything else is dropped.
pub fn resolve_detail_url(origin: &Url, href: &str) -> Option<String> {
    let path = href.split(';').next().unwrap_or_default().trim();
    if path.is_empty() {
        return None;
    }
    let joined = origin.join(path).ok()?;
    let same_site =
        matches!(joined.scheme(), "http" | "https") && joined.origin() == origin.origin();
    if !same_site {
        warn!(href, resolved = %joined, "detail link points off the source site; dropped");
        return None;
    }
    Some(joined.into())
}

#[derive(Debug, Clone)]
pub struct ListingExtractor {
    selectors: ListingSelectors,
    origin: Url,
    count_pattern: Regex,
    date_pattern: Regex,
}

impl ListingExtractor {
    pub fn new(origin: Url) -> Result<Self, ExtractError> {
        Ok(Self {
            selectors: ListingSelectors::new()?,
            origin,
            count_pattern: Regex::new(r"\d+")?,
            date_pattern: Regex::new(r"\d{2}/\d{2}/\d{4}")?,
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn row_selector(&self) -> &Selector {
        &self.selectors.row
    }

    /// First pattern hit among the metadata paragraphs containing `label`.
    fn labelled_value(&self, row: ElementRef<'_>, label: &str, pattern: &Regex) -> Option<String> {
        row.select(&self.selectors.metadata)
            .map(element_text)
            .filter(|text| text.contains(label))
            .find_map(|text| pattern.find(&text).map(|m| m.as_str().to_string()))
    }

    fn labelled_count(&self, row: ElementRef<'_>, label: &str) -> u32 {
        let Some(digits) = self.labelled_value(row, label, &self.count_pattern) else {
            return 0;
        };
        digits.parse().unwrap_or_else(|err| {
            debug!(label, digits = %digits, error = %err, "count does not fit; using 0");
            0
        })
    }

    /// Extract one listing row.
    ///
    /// `Ok(None)` means the row carries no code and is not a real listing.
    /// A date that has the `DD/MM/YYYY` shape but names no calendar day is an error
    /// for this row only; an absent date is `None`.
    pub fn extract(
        &self,
        row: ElementRef<'_>,
        today: NaiveDate,
    ) -> Result<Option<VacancyRecord>, ExtractError> {
        let code = first_text(row, &self.selectors.code);
        if code.is_empty() {
            return Ok(None);
        }

        let description = classify_description(row.select(&self.selectors.description).map(element_text));

        let parse_date = |field: &'static str, label: &str| {
            self.labelled_value(row, label, &self.date_pattern)
                .map(|raw| normalize_date(&raw))
                .transpose()
                .map_err(|source| ExtractError::Date {
                    code: code.clone(),
                    field,
                    source,
                })
        };
        let published_date = parse_date("fecha_publicacion", LABEL_PUBLISHED)?;
        let closing_date = parse_date("fecha_cierre", LABEL_CLOSING)?;

        let url = row
            .select(&self.selectors.detail_link)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| resolve_detail_url(&self.origin, href));

        Ok(Some(VacancyRecord {
            title: first_text(row, &self.selectors.title),
            salary: joined_text(row, &self.selectors.salary),
            experience_text: description.experience,
            contract_type: description.contract,
            remote_work_text: description.remote_work,
            location: joined_text(row, &self.selectors.location),
            vacancy_count: self.labelled_count(row, LABEL_VACANCIES),
            application_count: self.labelled_count(row, LABEL_APPLICATIONS),
            published_date,
            closing_date,
            days_remaining: closing_date.map(|closing| days_remaining(closing, today)),
            url,
            code,
        }))
    }

    /// Extract a standalone fragment holding exactly one listing row.
    pub fn extract_fragment(
        &self,
        html: &str,
        today: NaiveDate,
    ) -> Result<Option<VacancyRecord>, ExtractError> {
        let fragment = Html::parse_fragment(html);
        self.extract(fragment.root_element(), today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ListingExtractor {
        ListingExtractor::new(Url::parse("https://ape.sena.edu.co/").unwrap()).unwrap()
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 21).unwrap()
    }

    const FULL_ROW: &str = r#"
        <div class="row">
          <div class="span12"><h4>12345</h4><h5>Operario</h5><h6> $ 1.423.500 </h6></div>
          <div class="span5">
            <p class="titulo-color">Barrancabermeja, Santander</p>
            <p>Experiencia: 6 meses</p>
            <p>Tipo de contrato: Término fijo</p>
            <p>Teletrabajo: No</p>
          </div>
          <div class="span3">
            <p>Vacantes: 3</p>
            <p>Postulaciones: 10</p>
            <p>Publicado 01/01/2025</p>
            <p>Fecha de cierre 31/01/2025</p>
          </div>
          <div class="span1"><a class="btn btn-primary" href="/detalle;jsessionid=ABC">Ver</a></div>
        </div>"#;

    #[test]
    fn extracts_documented_example_row() {
        let record = extractor().extract_fragment(FULL_ROW, today()).unwrap().unwrap();

        assert_eq!(record.code, "12345");
        assert_eq!(record.title, "Operario");
        assert_eq!(record.salary, "$ 1.423.500");
        assert_eq!(record.experience_text, "Experiencia: 6 meses");
        assert_eq!(record.contract_type, "Término fijo");
        assert_eq!(record.remote_work_text, "Teletrabajo: No");
        assert_eq!(record.location, "Barrancabermeja, Santander");
        assert_eq!(record.vacancy_count, 3);
        assert_eq!(record.application_count, 10);
        assert_eq!(
            record.published_date.unwrap().to_rfc3339(),
            "2025-01-01T00:00:00-05:00"
        );
        assert_eq!(
            record.closing_date.unwrap().to_rfc3339(),
            "2025-01-31T00:00:00-05:00"
        );
        assert_eq!(record.days_remaining, Some(10));
        assert_eq!(record.url.as_deref(), Some("https://ape.sena.edu.co/detalle"));
    }

    #[test]
    fn row_without_code_is_not_a_listing() {
        let html = r#"<div class="row"><div class="span12"><h5>Banner</h5></div></div>"#;
        assert!(extractor().extract_fragment(html, today()).unwrap().is_none());

        let blank = r#"<div class="row"><h4>   </h4></div>"#;
        assert!(extractor().extract_fragment(blank, today()).unwrap().is_none());
    }

    #[test]
    fn missing_closing_date_and_link_become_none() {
        let html = r#"
            <div class="row">
              <h4>777</h4><h5>Auxiliar</h5>
              <div class="span3"><p>Vacantes: dos</p><p>Publicado 02/01/2025</p></div>
            </div>"#;
        let record = extractor().extract_fragment(html, today()).unwrap().unwrap();
        assert_eq!(record.closing_date, None);
        assert_eq!(record.days_remaining, None);
        assert_eq!(record.url, None);
        assert_eq!(record.vacancy_count, 0);
        assert_eq!(record.application_count, 0);
        assert!(record.published_date.is_some());
    }

    #[test]
    fn impossible_closing_date_is_a_row_error() {
        let html = r#"
            <div class="row"><h4>888</h4>
              <div class="span3"><p>Fecha de cierre 31/02/2025</p></div>
            </div>"#;
        let err = extractor().extract_fragment(html, today()).unwrap_err();
        assert!(matches!(
            err,
            ExtractError::Date { field: "fecha_cierre", ref code, .. } if code == "888"
        ));
    }

    #[test]
    fn labels_outside_metadata_block_are_ignored() {
        let html = r#"
            <div class="row"><h4>1</h4>
              <div class="span5"><p>Vacantes: 9</p></div>
              <div class="span3"><p>Vacantes: 2</p></div>
            </div>"#;
        let record = extractor().extract_fragment(html, today()).unwrap().unwrap();
        assert_eq!(record.vacancy_count, 2);
    }

    #[test]
    fn first_matching_metadata_paragraph_with_a_value_wins() {
        let html = r#"
            <div class="row"><h4>1</h4>
              <div class="span3">
                <p>Postulaciones</p>
                <p>Postulaciones: 7</p>
                <p>Postulaciones: 8</p>
              </div>
            </div>"#;
        let record = extractor().extract_fragment(html, today()).unwrap().unwrap();
        assert_eq!(record.application_count, 7);
    }

    #[test]
    fn description_paragraph_sets_one_field_and_last_match_wins() {
        let fields = classify_description(
            [
                "Experiencia en contrato similar",
                "Tipo de contrato: Indefinido",
                "Contrato a término fijo",
                "TELETRABAJO: parcial",
                "Sin clasificar",
            ]
            .map(String::from),
        );
        assert_eq!(
            fields,
            DescriptionFields {
                experience: "Experiencia en contrato similar".into(),
                contract: "Contrato a término fijo".into(),
                remote_work: "TELETRABAJO: parcial".into(),
            }
        );
    }

    #[test]
    fn detail_url_is_cut_at_semicolon_and_resolved() {
        let origin = Url::parse("https://ape.sena.edu.co/").unwrap();
        assert_eq!(
            resolve_detail_url(&origin, "/spe-web/ver?id=1;javascript:abrir()").as_deref(),
            Some("https://ape.sena.edu.co/spe-web/ver?id=1")
        );
        assert_eq!(resolve_detail_url(&origin, ";jsessionid=1"), None);
        assert_eq!(resolve_detail_url(&origin, "  "), None);
    }

    #[test]
    fn detail_links_leaving_the_source_site_are_dropped() {
        let origin = Url::parse("https://ape.sena.edu.co/").unwrap();
        assert_eq!(resolve_detail_url(&origin, "javascript:alert(1);void(0)"), None);
        assert_eq!(resolve_detail_url(&origin, "https://evil.example/x;y"), None);
        assert_eq!(resolve_detail_url(&origin, "//evil.example/x"), None);
        assert_eq!(resolve_detail_url(&origin, "http://ape.sena.edu.co/x"), None);
        assert_eq!(resolve_detail_url(&origin, "data:text/html,hola"), None);
        assert_eq!(
            resolve_detail_url(&origin, "https://ape.sena.edu.co/spe-web/ver?id=2").as_deref(),
            Some("https://ape.sena.edu.co/spe-web/ver?id=2")
        );
    }

    #[test]
    fn script_link_in_a_row_leaves_url_empty() {
        let html = r#"
            <div class="row"><h4>31</h4>
              <div class="span1"><a class="btn-primary" href="javascript:abrir(31)">Ver</a></div>
            </div>"#;
        let record = extractor().extract_fragment(html, today()).unwrap().unwrap();
        assert_eq!(record.url, None);
    }

    #[test]
    fn count_too_large_for_u32_falls_back_to_zero() {
        let html = r#"
            <div class="row"><h4>1</h4>
              <div class="span3"><p>Vacantes: 99999999999</p><p>Postulaciones: 4</p></div>
            </div>"#;
        let record = extractor().extract_fragment(html, today()).unwrap().unwrap();
        assert_eq!(record.vacancy_count, 0);
        assert_eq!(record.application_count, 4);
    }
}
