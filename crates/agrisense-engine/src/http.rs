use anyhow::{bail, Context, Result};
use reqwest::blocking::Response as HttpResponse;

/// Reads the body, failing on any non-success status.
pub(crate) fn response_text_or_error(provider: &str, response: HttpResponse) -> Result<String> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    Ok(body)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub fn redact_secrets(text: &str, secrets: &[&str]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if secret.len() >= 4 {
            out = out.replace(secret, "[redacted]");
        }
    }
    out
}
