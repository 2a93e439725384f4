//! Input validation for API requests.
//!
//! Functions return `Err(message)` for a single field; handlers collect them
//! with `ValidationErrorBuilder` from the `error` module.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{is_known_city, is_known_tag, MAX_TAGS};

lazy_static! {
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();

    /// Optional leading +, digits with single spaces or dashes between groups
    static ref PHONE_REGEX: Regex = Regex::new(
        r"^\+?[0-9]{2,4}([ -]?[0-9]{2,4}){2,4}$"
    ).unwrap();

    static ref INSTAGRAM_REGEX: Regex = Regex::new(
        r"^@?[A-Za-z0-9._]{1,30}$"
    ).unwrap();

    /// https URL, capturing the host
    static ref HTTPS_URL_REGEX: Regex = Regex::new(
        r"^https://([A-Za-z0-9.-]+)(:\d+)?(/[^\s]*)?$"
    ).unwrap();

    static ref UPLOAD_PATH_REGEX: Regex = Regex::new(
        r"^/uploads/[A-Za-z0-9-]+\.[a-z0-9]{2,5}$"
    ).unwrap();

    static ref EVENT_NAME_REGEX: Regex = Regex::new(
        r"^[a-z][a-z0-9_.]{0,63}$"
    ).unwrap();
}

pub fn validate_name(name: &str) -> Result<(), String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name is required".to_string());
    }
    if trimmed.chars().count() > 80 {
        return Err("Name is too long (max 80 characters)".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }
    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }
    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }
    Ok(())
}

/// At least 8 characters with one letter and one digit
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters".to_string());
    }
    if password.len() > 128 {
        return Err("Password is too long (max 128 characters)".to_string());
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit".to_string());
    }
    Ok(())
}

pub fn validate_phone(phone: &Option<String>) -> Result<(), String> {
    if let Some(p) = phone {
        if p.is_empty() {
            return Ok(()); // Empty string treated as no phone
        }
        if !PHONE_REGEX.is_match(p) {
            return Err("Invalid phone number".to_string());
        }
    }
    Ok(())
}

pub fn validate_city(city: &str) -> Result<(), String> {
    if city.is_empty() {
        return Err("City is required".to_string());
    }
    if !is_known_city(city) {
        return Err(format!("Unknown city: {}", city));
    }
    Ok(())
}

pub fn validate_optional_city(city: &Option<String>) -> Result<(), String> {
    match city {
        Some(c) if !c.is_empty() => validate_city(c),
        _ => Ok(()),
    }
}

/// Tags are expected to be normalized already (see `normalize_tags`)
pub fn validate_tags(tags: &[String]) -> Result<(), String> {
    if tags.len() > MAX_TAGS {
        return Err(format!("Too many tags (max {})", MAX_TAGS));
    }
    if let Some(unknown) = tags.iter().find(|t| !is_known_tag(t)) {
        return Err(format!("Unknown tag: {}", unknown));
    }
    Ok(())
}

pub fn validate_tag(tag: &str) -> Result<(), String> {
    if !is_known_tag(tag) {
        return Err(format!("Unknown tag: {}", tag));
    }
    Ok(())
}

/// Images must be our own uploads or https URLs on an allowed remote host
pub fn validate_image_url(url: &str, remote_hosts: &[String]) -> Result<(), String> {
    if url.is_empty() {
        return Err("Image URL is required".to_string());
    }
    if url.len() > 2048 {
        return Err("Image URL is too long (max 2048 characters)".to_string());
    }

    if url.starts_with("/uploads/") {
        if UPLOAD_PATH_REGEX.is_match(url) {
            return Ok(());
        }
        return Err("Invalid upload path".to_string());
    }

    let host = HTTPS_URL_REGEX
        .captures(url)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_lowercase())
        .ok_or_else(|| "Image URL must be an upload path or an https URL".to_string())?;

    let allowed = remote_hosts.iter().any(|pattern| host_matches(&host, pattern));
    if !allowed {
        return Err(format!("Images from {} are not allowed", host));
    }
    Ok(())
}

/// `*.example.com` matches any subdomain; other patterns match exactly
fn host_matches(host: &str, pattern: &str) -> bool {
    let pattern = pattern.to_lowercase();
    match pattern.strip_prefix("*.") {
        Some(suffix) => host.len() > suffix.len() && host.ends_with(&format!(".{}", suffix)),
        None => host == pattern,
    }
}

pub fn validate_price(price_pln: i64) -> Result<(), String> {
    if price_pln <= 0 {
        return Err("Price must be greater than 0".to_string());
    }
    if price_pln > 100_000 {
        return Err("Price is too high (max 100000 PLN)".to_string());
    }
    Ok(())
}

pub fn validate_optional_price(price_pln: &Option<i64>) -> Result<(), String> {
    match price_pln {
        Some(p) => validate_price(*p),
        None => Ok(()),
    }
}

pub fn validate_instagram(handle: &Option<String>) -> Result<(), String> {
    if let Some(h) = handle {
        if h.is_empty() {
            return Ok(());
        }
        if !INSTAGRAM_REGEX.is_match(h) {
            return Err("Invalid Instagram handle".to_string());
        }
    }
    Ok(())
}

/// Free-text fields (notes, captions, bios, offer messages)
pub fn validate_text(text: &Option<String>, field: &str, max_chars: usize) -> Result<(), String> {
    if let Some(t) = text {
        if t.chars().count() > max_chars {
            return Err(format!("{} is too long (max {} characters)", field, max_chars));
        }
    }
    Ok(())
}

pub fn validate_event_name(name: &str) -> Result<(), String> {
    if !EVENT_NAME_REGEX.is_match(name) {
        return Err(
            "Event name must be lowercase letters, digits, '_' or '.', starting with a letter"
                .to_string(),
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ala@example.com").is_ok());
        assert!(validate_email("ala.kot+nails@studio.example.pl").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("ala").is_err());
        assert!(validate_email("ala@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("lakier123").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("onlyletters").is_err());
        assert!(validate_password("12345678").is_err());
    }

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone(&Some("+48 600 700 800".to_string())).is_ok());
        assert!(validate_phone(&Some("600-700-800".to_string())).is_ok());
        assert!(validate_phone(&Some("".to_string())).is_ok());
        assert!(validate_phone(&None).is_ok());

        assert!(validate_phone(&Some("call me".to_string())).is_err());
        assert!(validate_phone(&Some("12".to_string())).is_err());
    }

    #[test]
    fn test_validate_city_and_tags() {
        assert!(validate_city("wroclaw").is_ok());
        assert!(validate_city("").is_err());
        assert!(validate_city("paris").is_err());
        assert!(validate_optional_city(&None).is_ok());
        assert!(validate_optional_city(&Some("paris".to_string())).is_err());

        assert!(validate_tags(&["french".to_string(), "gel".to_string()]).is_ok());
        assert!(validate_tags(&[]).is_ok());
        assert!(validate_tags(&["sparkles".to_string()]).is_err());

        let too_many: Vec<String> = crate::db::TAGS.iter().take(9).map(|t| t.to_string()).collect();
        assert!(validate_tags(&too_many).is_err());
    }

    #[test]
    fn test_validate_image_url() {
        let hosts = vec!["utfs.io".to_string(), "*.cdninstagram.com".to_string()];

        assert!(validate_image_url("/uploads/550e8400-e29b-41d4-a716-446655440000.png", &hosts).is_ok());
        assert!(validate_image_url("https://utfs.io/f/abc.jpg", &hosts).is_ok());
        assert!(validate_image_url("https://scontent.cdninstagram.com/v/t51/x.jpg", &hosts).is_ok());

        assert!(validate_image_url("", &hosts).is_err());
        assert!(validate_image_url("/uploads/../secret.txt", &hosts).is_err());
        assert!(validate_image_url("http://utfs.io/f/abc.jpg", &hosts).is_err());
        assert!(validate_image_url("https://evil.example.com/a.jpg", &hosts).is_err());
        assert!(validate_image_url("https://cdninstagram.com/a.jpg", &hosts).is_err());
        assert!(validate_image_url("javascript:alert(1)", &hosts).is_err());
    }

    #[test]
    fn test_validate_price() {
        assert!(validate_price(1).is_ok());
        assert!(validate_price(250).is_ok());
        assert!(validate_price(0).is_err());
        assert!(validate_price(-10).is_err());
        assert!(validate_price(100_001).is_err());
        assert!(validate_optional_price(&None).is_ok());
    }

    #[test]
    fn test_validate_instagram() {
        assert!(validate_instagram(&Some("@nails.by.ala".to_string())).is_ok());
        assert!(validate_instagram(&Some("nails_by_ala".to_string())).is_ok());
        assert!(validate_instagram(&Some("nails by ala".to_string())).is_err());
        assert!(validate_instagram(&None).is_ok());
    }

    #[test]
    fn test_validate_text() {
        assert!(validate_text(&Some("ładne".to_string()), "Note", 5).is_ok());
        assert!(validate_text(&Some("za długie".to_string()), "Note", 5).is_err());
        assert!(validate_text(&None, "Note", 5).is_ok());
    }

    #[test]
    fn test_validate_event_name() {
        assert!(validate_event_name("page_view").is_ok());
        assert!(validate_event_name("offer.accepted").is_ok());
        assert!(validate_event_name("PageView").is_err());
        assert!(validate_event_name("1st").is_err());
        assert!(validate_event_name("").is_err());
    }
}
