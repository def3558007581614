//! Best-effort alerts for newly discovered vacancies.

use std::fmt;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use vacantes_core::{format_civil_date, VacancyRecord};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("notification rejected with status {status}: {description}")]
    Rejected { status: u16, description: String },
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, record: &VacancyRecord) -> Result<(), NotifyError>;
}

/// Used when no channel is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn notify(&self, _record: &VacancyRecord) -> Result<(), NotifyError> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub api_base: String,
}

impl fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"<redacted>")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TelegramReply {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    config: TelegramConfig,
}

impl TelegramNotifier {
    pub fn new(client: reqwest::Client, config: TelegramConfig) -> Self {
        Self { client, config }
    }

    fn send_message_url(&self) -> String {
        format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        )
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, record: &VacancyRecord) -> Result<(), NotifyError> {
        let text = format_vacancy_message(record);
        let response = self
            .client
            .get(self.send_message_url())
            .query(&[
                ("chat_id", self.config.chat_id.as_str()),
                ("parse_mode", "HTML"),
                ("text", text.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        let reply = serde_json::from_str::<TelegramReply>(&body).ok();
        match reply {
            Some(TelegramReply { ok: true, .. }) if status.is_success() => Ok(()),
            Some(TelegramReply { description, .. }) => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: description.unwrap_or_default(),
            }),
            None => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: body.chars().take(200).collect(),
            }),
        }
    }
}

fn esc(text: &str) -> String {
    html_escape::encode_text(text).into_owned()
}

/// Telegram HTML-mode message announcing one vacancy.
pub fn format_vacancy_message(record: &VacancyRecord) -> String {
    let mut lines = vec![
        "<b>Nueva vacante</b>".to_string(),
        format!("<b>{}</b>", esc(&record.title)),
        format!("Código: {}", esc(&record.code)),
    ];
    for (label, value) in [
        ("Salario", &record.salary),
        ("Ubicación", &record.location),
        ("Contrato", &record.contract_type),
    ] {
        if !value.is_empty() {
            lines.push(format!("{label}: {}", esc(value)));
        }
    }
    lines.push(format!("Vacantes: {}", record.vacancy_count));

    let closing = match (record.closing_date, record.days_remaining) {
        (Some(date), Some(days)) => format!(
            "Cierre: {} ({days} días restantes)",
            format_civil_date(date)
        ),
        (Some(date), None) => format!("Cierre: {}", format_civil_date(date)),
        (None, _) => "Cierre: sin fecha".to_string(),
    };
    lines.push(closing);

    if let Some(url) = &record.url {
        lines.push(format!(
            "<a href=\"{}\">Ver vacante</a>",
            html_escape::encode_double_quoted_attribute(url)
        ));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use vacantes_core::normalize_date;

    fn record() -> VacancyRecord {
        VacancyRecord {
            code: "12345".into(),
            title: "Operario <turno noche> & apoyo".into(),
            salary: "$ 1.423.500".into(),
            experience_text: "Experiencia: 6 meses".into(),
            contract_type: "Término fijo".into(),
            remote_work_text: String::new(),
            location: String::new(),
            vacancy_count: 3,
            application_count: 10,
            published_date: None,
            closing_date: Some(normalize_date("31/01/2025").unwrap()),
            days_remaining: Some(10),
            url: Some("https://ape.sena.edu.co/detalle?id=1&x=\"2\"".into()),
        }
    }

    #[test]
    fn message_escapes_fields_and_skips_empty_ones() {
        let text = format_vacancy_message(&record());
        assert!(text.starts_with("<b>Nueva vacante</b>\n"));
        assert!(text.contains("<b>Operario &lt;turno noche&gt; &amp; apoyo</b>"));
        assert!(text.contains("Código: 12345"));
        assert!(text.contains("Salario: $ 1.423.500"));
        assert!(!text.contains("Ubicación"));
        assert!(text.contains("Cierre: 31/01/2025 (10 días restantes)"));
        assert!(text.contains("href=\"https://ape.sena.edu.co/detalle?id=1&amp;x=&quot;2&quot;\""));
    }

    #[test]
    fn message_without_closing_date_or_link() {
        let mut r = record();
        r.closing_date = None;
        r.days_remaining = None;
        r.url = None;
        let text = format_vacancy_message(&r);
        assert!(text.contains("Cierre: sin fecha"));
        assert!(!text.contains("<a href"));
    }

    #[test]
    fn config_debug_hides_token() {
        let config = TelegramConfig {
            bot_token: "123:secret".into(),
            chat_id: "-100".into(),
            api_base: "https://api.telegram.org".into(),
        };
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("-100"));
    }

    #[test]
    fn send_url_tolerates_trailing_slash() {
        let notifier = TelegramNotifier::new(
            reqwest::Client::new(),
            TelegramConfig {
                bot_token: "T".into(),
                chat_id: "C".into(),
                api_base: "https://api.telegram.org/".into(),
            },
        );
        assert_eq!(notifier.send_message_url(), "https://api.telegram.org/botT/sendMessage");
    }
}
