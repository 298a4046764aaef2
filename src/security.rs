//! Input hygiene and personal-data masking
//!
//! Every function here is pure and total. Malformed input produces a safe
//! sentinel or a structured rejection, never an error.
use rand::RngCore;
use rand::rngs::OsRng;
use regex::Regex;
use serde::Serialize;
use std::borrow::Cow;
use std::net::IpAddr;
use std::sync::LazyLock;
use subtle::ConstantTimeEq;

pub const MASK: &str = "****";
pub const MASKED_EMAIL: &str = "***@***";
pub const ANONYMOUS_IP: &str = "anonymous";

const MAX_EMAIL_LENGTH: usize = 254;
const MIN_PASSWORD_LENGTH: usize = 8;
const CSRF_TOKEN_BYTES: usize = 32;

// shorter inputs would show at least as much as they hide
const MIN_IBAN_MASK_LENGTH: usize = 16;
const MIN_PHONE_MASK_DIGITS: usize = 10;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));

/// Escapes the five HTML-significant characters.
pub fn sanitize_string(input: &str) -> Cow<'_, str> {
    if !input.contains(['<', '>', '&', '"', '\'']) {
        return Cow::Borrowed(input);
    }

    let mut escaped = String::with_capacity(input.len() + 16);
    for c in input.chars() {
        match c {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            other => escaped.push(other),
        }
    }
    Cow::Owned(escaped)
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_EMAIL_LENGTH && EMAIL_PATTERN.is_match(email)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PasswordValidation {
    pub valid: bool,
    pub errors: Vec<&'static str>,
}

/// Checks every password rule and reports all violations at once.
pub fn validate_password(password: &str) -> PasswordValidation {
    let rules: [(bool, &'static str); 5] = [
        (
            password.chars().count() >= MIN_PASSWORD_LENGTH,
            "Das Passwort muss mindestens 8 Zeichen lang sein",
        ),
        (
            password.chars().any(char::is_uppercase),
            "Das Passwort muss mindestens einen Großbuchstaben enthalten",
        ),
        (
            password.chars().any(char::is_lowercase),
            "Das Passwort muss mindestens einen Kleinbuchstaben enthalten",
        ),
        (
            password.chars().any(|c| c.is_ascii_digit()),
            "Das Passwort muss mindestens eine Zahl enthalten",
        ),
        (
            password
                .chars()
                .any(|c| !c.is_alphanumeric() && !c.is_whitespace()),
            "Das Passwort muss mindestens ein Sonderzeichen enthalten",
        ),
    ];

    let errors: Vec<&'static str> = rules
        .into_iter()
        .filter_map(|(passed, message)| (!passed).then_some(message))
        .collect();

    PasswordValidation {
        valid: errors.is_empty(),
        errors,
    }
}

/// ISO 13616 structure plus the mod-97 check digits.
pub fn is_valid_iban(iban: &str) -> bool {
    let compact: String = iban
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !(15..=34).contains(&compact.len()) || !compact.chars().all(|c| c.is_ascii_alphanumeric()) {
        return false;
    }
    let (head, tail) = compact.split_at(4);
    if !head[..2].chars().all(|c| c.is_ascii_alphabetic())
        || !head[2..].chars().all(|c| c.is_ascii_digit())
    {
        return false;
    }

    let mut remainder: u32 = 0;
    for c in tail.chars().chain(head.chars()) {
        let value = match c.to_digit(36) {
            Some(v) => v,
            None => return false,
        };
        remainder = if value >= 10 {
            (remainder * 100 + value) % 97
        } else {
            (remainder * 10 + value) % 97
        };
    }
    remainder == 1
}

/// Drops the host part of an address before it is stored or logged.
///
/// IPv4 keeps three octets, IPv6 keeps the /48 prefix. Anything unparseable
/// becomes `"anonymous"`.
pub fn anonymize_ip(ip: &str) -> String {
    match ip.trim().parse::<IpAddr>() {
        Ok(IpAddr::V4(v4)) => {
            let [a, b, c, _] = v4.octets();
            format!("{a}.{b}.{c}.0")
        }
        Ok(IpAddr::V6(v6)) => {
            let segments = v6.segments();
            format!("{:x}:{:x}:{:x}::", segments[0], segments[1], segments[2])
        }
        Err(_) => ANONYMOUS_IP.to_owned(),
    }
}

/// `DE89370400440532013000` becomes `DE89 **** **** 3000`.
pub fn mask_iban(iban: &str) -> String {
    let compact: Vec<char> = iban.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() < MIN_IBAN_MASK_LENGTH {
        return MASK.to_owned();
    }
    let prefix: String = compact[..4].iter().collect();
    let suffix: String = compact[compact.len() - 4..].iter().collect();
    format!("{prefix} {MASK} {MASK} {suffix}")
}

/// Keeps the first character of the local part and the whole domain.
pub fn mask_email(email: &str) -> String {
    let Some((local, domain)) = email.trim().rsplit_once('@') else {
        return MASKED_EMAIL.to_owned();
    };
    let Some(first) = local.chars().next() else {
        return MASKED_EMAIL.to_owned();
    };
    if domain.is_empty() {
        return MASKED_EMAIL.to_owned();
    }
    format!("{first}***@{domain}")
}

/// Keeps the first three and last two digits, formatting is dropped.
pub fn mask_phone(phone: &str) -> String {
    let digits: String = phone.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < MIN_PHONE_MASK_DIGITS {
        return MASK.to_owned();
    }
    format!("{}{MASK}{}", &digits[..3], &digits[digits.len() - 2..])
}

/// 64 hex characters drawn from the operating system's CSPRNG.
pub fn generate_csrf_token() -> String {
    let mut bytes = [0u8; CSRF_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Length mismatch fails fast; equal-length inputs are compared in constant time.
pub fn validate_csrf_token(token: &str, expected: &str) -> bool {
    if token.len() != expected.len() {
        return false;
    }
    token.as_bytes().ct_eq(expected.as_bytes()).into()
}
