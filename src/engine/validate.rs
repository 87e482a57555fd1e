// src/engine/validate.rs — Pure input validators

use std::sync::LazyLock;

use regex::Regex;

/// Shortest full name ("Фамилия Имя Отчество") the bot accepts.
const MIN_FULL_NAME_CHARS: usize = 10;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Leading "8" or "+7", optional space/dash/paren separators, 10 digits after
    // the prefix: 89231234567, +7 923 123-45-67, 8(923)1234567.
    Regex::new(r"^(?:\+7|8)[ \-]?\(?(\d{3})\)?[ \-]?(\d{3})[ \-]?(\d{2})[ \-]?(\d{2})$")
        .expect("phone pattern compiles")
});

static PLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Russian vehicle plate: letter, three digits, two letters, 2-3 digit region.
    // Only the twelve Cyrillic letters that appear on plates are allowed.
    Regex::new(r"(?i)^[АВЕКМНОРСТУХ]\d{3}[АВЕКМНОРСТУХ]{2}\d{2,3}$")
        .expect("plate pattern compiles")
});

/// A full name is anything long enough; no character-set or word-count check.
pub fn validate_full_name(text: &str) -> bool {
    text.chars().count() >= MIN_FULL_NAME_CHARS
}

pub fn validate_phone(text: &str) -> bool {
    PHONE_RE.is_match(text)
}

pub fn validate_plate(text: &str) -> bool {
    PLATE_RE.is_match(text)
}

/// Accepted plates are stored uppercased.
pub fn normalize_plate(text: &str) -> String {
    text.to_uppercase()
}
