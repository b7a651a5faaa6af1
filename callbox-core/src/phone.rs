//! Phone number normalization to E.164.
//!
//! Numbers without a leading `+` are assumed to be North American. Input that
//! cannot be normalized is passed through unchanged and reported as
//! [`Normalized::Passthrough`] so callers can treat it as unreliable.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Normalized {
    Canonical(String),
    Passthrough(String),
}

impl Normalized {
    pub fn as_str(&self) -> &str {
        match self {
            Normalized::Canonical(s) | Normalized::Passthrough(s) => s,
        }
    }

    pub fn into_string(self) -> String {
        match self {
            Normalized::Canonical(s) | Normalized::Passthrough(s) => s,
        }
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Normalized::Canonical(_))
    }
}

pub fn normalize(raw: &str) -> String {
    normalize_phone(raw).into_string()
}

pub fn normalize_phone(raw: &str) -> Normalized {
    let digits = digits_of(raw);
    if digits.is_empty() {
        return Normalized::Passthrough(raw.to_string());
    }

    if let Some(rest) = raw.strip_prefix('+') {
        let digits = digits_of(rest);
        return match north_american(&digits) {
            Some(n) => Normalized::Canonical(n),
            // Already international; leave the caller's formatting alone.
            None => Normalized::Canonical(raw.to_string()),
        };
    }

    if let Some(n) = north_american(&digits) {
        return Normalized::Canonical(n);
    }
    if digits.len() > 11 {
        return Normalized::Canonical(format!("+{}", digits));
    }

    Normalized::Passthrough(raw.to_string())
}

fn digits_of(s: &str) -> String {
    s.chars().filter(|c| c.is_ascii_digit()).collect()
}

fn north_american(digits: &str) -> Option<String> {
    match digits.len() {
        10 => Some(format!("+1{}", digits)),
        11 if digits.starts_with('1') => Some(format!("+{}", digits)),
        _ => None,
    }
}

/// Formats `+1NXXNXXXXXX` as `(NXX) NXX-XXXX`; other numbers are returned as-is.
pub fn display(phone: &str) -> String {
    match phone.strip_prefix("+1") {
        Some(rest) if rest.len() == 10 && rest.chars().all(|c| c.is_ascii_digit()) => {
            format!("({}) {}-{}", &rest[..3], &rest[3..6], &rest[6..])
        }
        _ => phone.to_string(),
    }
}
