//! Contact extraction
//!
//! Three strategies each produce partial contacts keyed by email:
//!
//! 1. Anchors: `mailto:` links and Cloudflare-protected addresses, with name,
//!    role and phone read from the surrounding markup
//! 2. Lines: emails in the visible text, with a name line above and a role
//!    on or next to the email line
//! 3. Phones: the nearest valid phone number around each email line
//!
//! Results are merged by lowercased email. For each field the first
//! non-empty value wins, so earlier strategies take precedence.

use crate::extract::html::{collapse_whitespace, PageView};
use crate::extract::locale::LocalePolicy;
use regex::Regex;
use scraper::{ElementRef, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

/// A person reachable by email, with whatever could be found around it
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Contact {
    fn with_email(email: &str) -> Self {
        Self {
            email: email.to_lowercase(),
            ..Default::default()
        }
    }
}

/// Contacts merged by lowercased email, in first-seen order
#[derive(Debug, Default)]
pub struct ContactBook {
    contacts: Vec<Contact>,
    index: HashMap<String, usize>,
}

impl ContactBook {
    pub fn merge(&mut self, contact: Contact) {
        let key = contact.email.to_lowercase();
        match self.index.get(&key) {
            Some(&position) => {
                let existing = &mut self.contacts[position];
                fill(&mut existing.name, contact.name);
                fill(&mut existing.role, contact.role);
                fill(&mut existing.phone, contact.phone);
            }
            None => {
                self.index.insert(key.clone(), self.contacts.len());
                self.contacts.push(Contact {
                    email: key,
                    name: non_empty(contact.name),
                    role: non_empty(contact.role),
                    phone: non_empty(contact.phone),
                });
            }
        }
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn into_contacts(self) -> Vec<Contact> {
        self.contacts
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = non_empty(value);
    }
}

/// A contact heuristic over a parsed page
pub type ContactStrategy = fn(&PageView, &dyn LocalePolicy) -> Vec<Contact>;

/// Contact strategies, in precedence order
pub const CONTACT_STRATEGIES: &[(&str, ContactStrategy)] = &[
    ("anchors", anchor_contacts),
    ("lines", line_contacts),
    ("phones", nearby_phone_contacts),
];

/// Lines above an email line searched for a name
const NAME_LOOKBEHIND: usize = 3;
/// Lines around an email line searched for a phone
const PHONE_RADIUS: usize = 2;
/// Siblings on each side of an anchor's parent used as context
const CONTEXT_SIBLINGS: usize = 3;

const CLOUDFLARE_PROTECTION_PATH: &str = "/cdn-cgi/l/email-protection#";

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b[a-z0-9][a-z0-9._%+\-]*@[a-z0-9][a-z0-9.\-]*\.[a-z]{2,}\b").unwrap()
});

static EXACT_EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9][a-z0-9._%+\-]*@[a-z0-9][a-z0-9.\-]*\.[a-z]{2,}$").unwrap()
});

static NAME_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\p{Lu}\p{Ll}+(?:-\p{Lu}\p{Ll}+)?$").unwrap());

/// Punctuation that may wrap a name token
const TOKEN_PUNCTUATION: &[char] = &[',', ';', ':', '|', '(', ')', '/', '.', '–', '-', '"', '\''];

/// Runs every strategy and merges the results
pub fn extract_contacts(page: &PageView, locale: &dyn LocalePolicy) -> Vec<Contact> {
    let mut book = ContactBook::default();
    for (name, strategy) in CONTACT_STRATEGIES {
        let found = strategy(page, locale);
        tracing::trace!("Contact strategy {} found {} entries", name, found.len());
        for contact in found {
            book.merge(contact);
        }
    }
    book.into_contacts()
}

/// Decodes a Cloudflare-obfuscated address
///
/// The hex string's first byte is the XOR key for the remaining bytes.
pub fn decode_cfemail(encoded: &str) -> Option<String> {
    let bytes = hex::decode(encoded.trim()).ok()?;
    let (key, rest) = bytes.split_first()?;
    let decoded: Vec<u8> = rest.iter().map(|b| b ^ key).collect();
    let email = String::from_utf8(decoded).ok()?;
    is_email(&email).then_some(email)
}

fn is_email(candidate: &str) -> bool {
    EXACT_EMAIL_RE.is_match(candidate)
}

/// Emails in free text, in order
pub fn find_emails(text: &str) -> Vec<String> {
    EMAIL_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .collect()
}

fn mailto_address(href: &str) -> Option<String> {
    let (scheme, rest) = href.trim().split_once(':')?;
    if !scheme.eq_ignore_ascii_case("mailto") {
        return None;
    }
    let address = rest.split('?').next()?.split(',').next()?.trim();
    let address = address.replace("%40", "@");
    is_email(&address).then_some(address)
}

fn cloudflare_href_address(href: &str) -> Option<String> {
    let (_, encoded) = href.split_once(CLOUDFLARE_PROTECTION_PATH)?;
    decode_cfemail(encoded)
}

/// Returns a person name when `text` holds a run of 2-4 name tokens
///
/// Name tokens are capitalized words (optionally hyphenated) that are not
/// locale stop words. Punctuation after a token ends the run.
pub fn find_name(text: &str, locale: &dyn LocalePolicy) -> Option<String> {
    let mut run: Vec<&str> = Vec::new();

    let finish = |run: &mut Vec<&str>| -> Option<String> {
        let name = (2..=4).contains(&run.len()).then(|| run.join(" "));
        run.clear();
        name
    };

    for token in text.split_whitespace() {
        let core = token.trim_matches(TOKEN_PUNCTUATION);
        let closes_run = token.ends_with(TOKEN_PUNCTUATION);
        if is_name_token(core, locale) {
            run.push(core);
            if closes_run {
                if let Some(name) = finish(&mut run) {
                    return Some(name);
                }
            }
        } else if let Some(name) = finish(&mut run) {
            return Some(name);
        }
    }
    finish(&mut run)
}

/// A line that consists of nothing but a name
fn whole_line_name(line: &str, locale: &dyn LocalePolicy) -> Option<String> {
    let tokens: Vec<&str> = line
        .split_whitespace()
        .map(|t| t.trim_matches(TOKEN_PUNCTUATION))
        .filter(|t| !t.is_empty())
        .collect();
    let all_names = (2..=4).contains(&tokens.len())
        && tokens.iter().all(|t| is_name_token(t, locale));
    all_names.then(|| tokens.join(" "))
}

fn is_name_token(token: &str, locale: &dyn LocalePolicy) -> bool {
    NAME_TOKEN_RE.is_match(token) && !locale.is_stop_word(token)
}

fn sibling_text(element: Option<ElementRef<'_>>, text: Option<&str>) -> Option<String> {
    let text = match element {
        Some(element) => element.text().collect::<Vec<_>>().join(" "),
        None => text?.to_string(),
    };
    let text = collapse_whitespace(&text);
    (!text.is_empty()).then_some(text)
}

/// Text of an anchor's parent, then nearby siblings of that parent
fn anchor_context(anchor: ElementRef<'_>) -> Vec<String> {
    let Some(parent) = anchor.parent().and_then(ElementRef::wrap) else {
        return Vec::new();
    };
    let mut context: Vec<String> = sibling_text(Some(parent), None).into_iter().collect();
    context.extend(
        parent
            .prev_siblings()
            .filter_map(|node| sibling_text(ElementRef::wrap(node), node.value().as_text().map(|t| &**t)))
            .take(CONTEXT_SIBLINGS),
    );
    context.extend(
        parent
            .next_siblings()
            .filter_map(|node| sibling_text(ElementRef::wrap(node), node.value().as_text().map(|t| &**t)))
            .take(CONTEXT_SIBLINGS),
    );
    context
}

/// The enclosing `<a>` of an element, or the element itself
fn enclosing_anchor(element: ElementRef<'_>) -> ElementRef<'_> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().name() == "a")
        .unwrap_or(element)
}

fn contact_from_context(email: String, context: &[String], locale: &dyn LocalePolicy) -> Contact {
    Contact {
        name: context.iter().find_map(|text| find_name(text, locale)),
        role: context.iter().find_map(|text| locale.find_role(text)),
        phone: context
            .iter()
            .find_map(|text| locale.find_phones(text).into_iter().next()),
        ..Contact::with_email(&email)
    }
}

/// Strategy 1: `mailto:` and Cloudflare-protected addresses
fn anchor_contacts(page: &PageView, locale: &dyn LocalePolicy) -> Vec<Contact> {
    let mut contacts = Vec::new();

    if let Ok(selector) = Selector::parse("a[href]") {
        for anchor in page.document().select(&selector) {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(email) = mailto_address(href).or_else(|| cloudflare_href_address(href)) else {
                continue;
            };
            contacts.push(contact_from_context(email, &anchor_context(anchor), locale));
        }
    }

    if let Ok(selector) = Selector::parse("[data-cfemail]") {
        for element in page.document().select(&selector) {
            let Some(email) = element.value().attr("data-cfemail").and_then(decode_cfemail) else {
                continue;
            };
            let anchor = enclosing_anchor(element);
            contacts.push(contact_from_context(email, &anchor_context(anchor), locale));
        }
    }

    contacts
}

/// Strategy 2: name above, role on or next to each email line
fn line_contacts(page: &PageView, locale: &dyn LocalePolicy) -> Vec<Contact> {
    let lines = page.lines();
    let mut contacts = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        for email in find_emails(line) {
            let name = (1..=NAME_LOOKBEHIND)
                .filter_map(|offset| i.checked_sub(offset))
                .find_map(|j| whole_line_name(&lines[j], locale));

            let role = locale
                .find_role(line)
                .or_else(|| lines.get(i + 1).and_then(|l| locale.find_role(l)))
                .or_else(|| {
                    i.checked_sub(1)
                        .and_then(|j| locale.find_role(&lines[j]))
                });

            contacts.push(Contact {
                name,
                role,
                ..Contact::with_email(&email)
            });
        }
    }
    contacts
}

/// Strategy 3: nearest valid phone within two lines of each email line
fn nearby_phone_contacts(page: &PageView, locale: &dyn LocalePolicy) -> Vec<Contact> {
    let lines = page.lines();
    let mut contacts = Vec::new();

    for (i, line) in lines.iter().enumerate() {
        let emails = find_emails(line);
        if emails.is_empty() {
            continue;
        }

        let mut nearby = vec![i];
        for distance in 1..=PHONE_RADIUS {
            nearby.push(i + distance);
            if let Some(j) = i.checked_sub(distance) {
                nearby.push(j);
            }
        }
        let phone = nearby
            .into_iter()
            .filter_map(|j| lines.get(j))
            .find_map(|l| locale.find_phones(l).into_iter().next());

        for email in emails {
            contacts.push(Contact {
                phone: phone.clone(),
                ..Contact::with_email(&email)
            });
        }
    }
    contacts
}
