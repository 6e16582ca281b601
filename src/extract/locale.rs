//! Locale policy for text heuristics
//!
//! Month names, role words, name stop words and phone formats differ per
//! market. The extractor only talks to [`LocalePolicy`]; [`SwedishLocale`]
//! is the implementation used for Swedish listed companies.

use chrono::NaiveDate;
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::LazyLock;

/// Market-specific rules used by the date and contact heuristics
pub trait LocalePolicy: fmt::Debug + Send + Sync {
    /// Finds the first long-form date (`12 mars 2024`) in free text
    fn find_long_date(&self, text: &str) -> Option<NaiveDate>;

    /// Finds the first role or title (`VD`, `CFO`, ...) in free text
    fn find_role(&self, text: &str) -> Option<String>;

    /// Returns true for words that can never be part of a person name
    fn is_stop_word(&self, word: &str) -> bool;

    /// Raw phone number candidates in free text, in order
    fn phone_candidates<'t>(&self, text: &'t str) -> Vec<&'t str>;

    /// Normalizes a raw phone number; `None` when it is not a valid number
    fn normalize_phone(&self, raw: &str) -> Option<String>;

    /// All valid, normalized phone numbers in free text, in order
    fn find_phones(&self, text: &str) -> Vec<String> {
        self.phone_candidates(text)
            .into_iter()
            .filter_map(|raw| self.normalize_phone(raw))
            .collect()
    }
}

const SWEDISH_MONTHS: &[(&str, u32)] = &[
    ("januari", 1),
    ("februari", 2),
    ("mars", 3),
    ("april", 4),
    ("maj", 5),
    ("juni", 6),
    ("juli", 7),
    ("augusti", 8),
    ("september", 9),
    ("oktober", 10),
    ("november", 11),
    ("december", 12),
    ("jan", 1),
    ("feb", 2),
    ("mar", 3),
    ("apr", 4),
    ("jun", 6),
    ("jul", 7),
    ("aug", 8),
    ("sept", 9),
    ("sep", 9),
    ("okt", 10),
    ("nov", 11),
    ("dec", 12),
];

const SWEDISH_STOP_WORDS: &[&str] = &[
    "kontakt",
    "kontakta",
    "kontaktperson",
    "kontaktpersoner",
    "presskontakt",
    "telefon",
    "tel",
    "mobil",
    "mobiltelefon",
    "växel",
    "e-post",
    "epost",
    "mejl",
    "mail",
    "email",
    "för",
    "vid",
    "frågor",
    "ytterligare",
    "mer",
    "information",
    "om",
    "oss",
    "hem",
    "nyheter",
    "rapporter",
    "investerare",
    "investor",
    "investors",
    "relations",
    "press",
    "media",
    "styrelse",
    "ledning",
    "koncernledning",
    "chef",
    "direktör",
    "ordförande",
    "verkställande",
    "head",
    "of",
    "group",
    "koncern",
    "ab",
    "publ",
    "aktiebolag",
    "box",
    "adress",
    "besöksadress",
    "sverige",
    "sweden",
    "stockholm",
    "göteborg",
    "malmö",
];

static LONG_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let months: Vec<&str> = SWEDISH_MONTHS.iter().map(|(name, _)| *name).collect();
    RegexBuilder::new(&format!(
        r"\b(\d{{1,2}})\s+({})\.?\s+(\d{{4}})\b",
        months.join("|")
    ))
    .case_insensitive(true)
    .build()
    .unwrap()
});

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    RegexBuilder::new(
        r"\b(verkställande direktör|vice verkställande direktör|vice vd|vd|koncernchef|ceo|cfo|coo|cto|chief executive officer|chief financial officer|finanschef|finansdirektör|ekonomichef|ekonomidirektör|ir-chef|ir-ansvarig|head of investor relations|investor relations manager|investor relations officer|kommunikationschef|kommunikationsdirektör|head of communications|communications director|presschef|presskontakt|informationschef|styrelsens ordförande|styrelseordförande|ordförande|chairman)\b",
    )
    .case_insensitive(true)
    .build()
    .unwrap()
});

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:\+46|\b0046|\b0)[ \u{a0}]?(?:\(0\)[ \u{a0}]?)?\d{1,3}(?:[ \u{a0}\-/]?\d{1,4}){1,5}",
    )
    .unwrap()
});

/// Swedish formats: `12 mars 2024`, `VD`/`CFO`, `070-123 45 67`, `08-123 45 67`
#[derive(Debug, Clone, Copy, Default)]
pub struct SwedishLocale;

impl SwedishLocale {
    fn month_number(name: &str) -> Option<u32> {
        let name = name.to_lowercase();
        SWEDISH_MONTHS
            .iter()
            .find(|(month, _)| *month == name)
            .map(|(_, number)| *number)
    }
}

impl LocalePolicy for SwedishLocale {
    fn find_long_date(&self, text: &str) -> Option<NaiveDate> {
        LONG_DATE_RE.captures_iter(text).find_map(|caps| {
            let day = caps[1].parse().ok()?;
            let month = Self::month_number(&caps[2])?;
            let year = caps[3].parse().ok()?;
            NaiveDate::from_ymd_opt(year, month, day)
        })
    }

    fn find_role(&self, text: &str) -> Option<String> {
        ROLE_RE.find(text).map(|m| m.as_str().to_string())
    }

    fn is_stop_word(&self, word: &str) -> bool {
        let word = word.to_lowercase();
        SWEDISH_STOP_WORDS.contains(&word.as_str())
            || SWEDISH_MONTHS.iter().any(|(month, _)| *month == word)
            || ROLE_RE.is_match(&word)
    }

    fn phone_candidates<'t>(&self, text: &'t str) -> Vec<&'t str> {
        PHONE_RE.find_iter(text).map(|m| m.as_str().trim()).collect()
    }

    /// Normalizes Swedish numbers
    ///
    /// `+46`/`0046` become a leading `0` (a `(0)` trunk marker is dropped).
    /// The result must have 8 to 10 digits and is grouped as:
    ///
    /// | Kind | Digits | Format |
    /// |------|--------|--------|
    /// | Mobile (`07`) | 10 | `07x-xxx xx xx` |
    /// | Stockholm (`08`) | 9 | `08-xxx xx xx` |
    /// | Stockholm (`08`) | 8 | `08-xx xx xx` |
    /// | Stockholm (`08`) | 10 | `08-xxx xxx xx` |
    /// | Other area codes | 10 | `0xx-xxx xx xx` |
    /// | Other area codes | 9 | `0xx-xx xx xx` |
    /// | Other area codes | 8 | `0xx-xxx xx` |
    fn normalize_phone(&self, raw: &str) -> Option<String> {
        let raw = raw.trim();
        let mut digits: String = raw.chars().filter(char::is_ascii_digit).collect();

        let international = if raw.starts_with('+') {
            Some(digits.strip_prefix("46")?.to_string())
        } else {
            digits.strip_prefix("0046").map(str::to_string)
        };
        if let Some(national) = international {
            digits = if national.starts_with('0') {
                national
            } else {
                format!("0{}", national)
            };
        }

        if !digits.starts_with('0') || digits.starts_with("00") || !(8..=10).contains(&digits.len())
        {
            return None;
        }
        let d = digits.as_str();
        let formatted = match (d.len(), &d[..2]) {
            (10, "07") => format!("{}-{} {} {}", &d[..3], &d[3..6], &d[6..8], &d[8..]),
            (8, "08") => format!("{}-{} {} {}", &d[..2], &d[2..4], &d[4..6], &d[6..]),
            (9, "08") => format!("{}-{} {} {}", &d[..2], &d[2..5], &d[5..7], &d[7..]),
            (10, "08") => format!("{}-{} {} {}", &d[..2], &d[2..5], &d[5..8], &d[8..]),
            (10, _) => format!("{}-{} {} {}", &d[..3], &d[3..6], &d[6..8], &d[8..]),
            (9, _) => format!("{}-{} {} {}", &d[..3], &d[3..5], &d[5..7], &d[7..]),
            (8, _) => format!("{}-{} {}", &d[..3], &d[3..6], &d[6..]),
            _ => return None,
        };
        Some(formatted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_date() {
        let locale = SwedishLocale;
        assert_eq!(
            locale.find_long_date("Publicerad 12 mars 2024 kl 08:00"),
            NaiveDate::from_ymd_opt(2024, 3, 12)
        );
        assert_eq!(
            locale.find_long_date("Stockholm den 3 Okt. 2023"),
            NaiveDate::from_ymd_opt(2023, 10, 3)
        );
        assert_eq!(locale.find_long_date("31 februari 2024"), None);
        assert_eq!(locale.find_long_date("inget datum här"), None);
    }

    #[test]
    fn test_find_role() {
        let locale = SwedishLocale;
        assert_eq!(
            locale.find_role("Anna Svensson, CFO").as_deref(),
            Some("CFO")
        );
        assert_eq!(
            locale.find_role("Verkställande direktör och koncernchef").as_deref(),
            Some("Verkställande direktör")
        );
        assert_eq!(
            locale.find_role("Head of Investor Relations").as_deref(),
            Some("Head of Investor Relations")
        );
        assert_eq!(locale.find_role("Välkommen till vår webbplats"), None);
    }

    #[test]
    fn test_stop_words() {
        let locale = SwedishLocale;
        assert!(locale.is_stop_word("Kontakt"));
        assert!(locale.is_stop_word("Mars"));
        assert!(locale.is_stop_word("VD"));
        assert!(!locale.is_stop_word("Anna"));
    }

    #[test]
    fn test_normalize_mobile() {
        let locale = SwedishLocale;
        assert_eq!(
            locale.normalize_phone("0701234567").as_deref(),
            Some("070-123 45 67")
        );
        assert_eq!(
            locale.normalize_phone("+46 70 123 45 67").as_deref(),
            Some("070-123 45 67")
        );
        assert_eq!(
            locale.normalize_phone("0046-70-1234567").as_deref(),
            Some("070-123 45 67")
        );
    }

    #[test]
    fn test_normalize_stockholm() {
        let locale = SwedishLocale;
        assert_eq!(
            locale.normalize_phone("08-123 45 67").as_deref(),
            Some("08-123 45 67")
        );
        assert_eq!(
            locale.normalize_phone("+46 (0)8 12 34 56").as_deref(),
            Some("08-12 34 56")
        );
    }

    #[test]
    fn test_normalize_other_area_codes() {
        let locale = SwedishLocale;
        assert_eq!(
            locale.normalize_phone("031-123 45 67").as_deref(),
            Some("031-123 45 67")
        );
        assert_eq!(
            locale.normalize_phone("031 12 34 56").as_deref(),
            Some("031-12 34 56")
        );
    }

    #[test]
    fn test_normalize_rejects_bad_digit_counts() {
        let locale = SwedishLocale;
        assert_eq!(locale.normalize_phone("0123"), None);
        assert_eq!(locale.normalize_phone("070 123 45 67 89"), None);
        assert_eq!(locale.normalize_phone("+44 20 7946 0958"), None);
        assert_eq!(locale.normalize_phone("0044 20 7946 0958"), None);
    }

    #[test]
    fn test_find_phones_in_text() {
        let locale = SwedishLocale;
        let phones = locale.find_phones("Tel: 08-123 45 67, mobil: +46 70 765 43 21. Datum 2024-03-01");
        assert_eq!(phones, vec!["08-123 45 67", "070-765 43 21"]);
    }
}
