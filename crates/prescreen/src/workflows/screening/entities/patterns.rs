//! Bilingual (English/Norwegian) vocabulary and pattern tables.
//!
//! Tables are plain data; the extractor compiles them once on first use.

use std::sync::LazyLock;

use regex::{Regex, RegexBuilder};

pub(super) const DATE_PATTERNS: &[&str] = &[
    r"\b(\d{1,2}[./\-]\d{1,2}[./\-]\d{4})\b",
    r"\b(\d{4}[.\-/]\d{1,2}[.\-/]\d{1,2})\b",
    r"\b(\d{1,2}\s+(?:jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|jun(?:e)?|jul(?:y)?|aug(?:ust)?|sep(?:tember)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?)\s+\d{4})\b",
    r"\b(\d{1,2}\s+(?:januar|februar|mars|april|mai|juni|juli|august|september|oktober|november|desember)\s+\d{4})\b",
];

pub(super) const ID_NUMBER_PATTERNS: &[&str] = &[
    // letter prefix, e.g. AB1234567
    r"\b([A-Z]{1,3}\d{6,9})\b",
    r"\b(\d{9})\b",
    // national identity number, DD MM YY NNNNN
    r"\b(\d{2}\s?\d{2}\s?\d{2}\s?\d{5})\b",
];

pub(super) const NATIONALITIES: &[&str] = &[
    "norwegian", "norsk", "swedish", "svensk", "danish", "dansk",
    "finnish", "finsk", "icelandic", "islandsk",
    "german", "tysk", "french", "fransk", "british", "britisk",
    "american", "amerikansk", "polish", "polsk", "lithuanian", "litauisk",
    "somali", "somalisk", "eritrean", "eritreisk", "syrian", "syrisk",
    "iraqi", "irakisk", "afghan", "afghansk", "iranian", "iransk",
    "pakistani", "pakistansk", "indian", "indisk", "philippine", "filippinsk",
    "thai", "thailandsk", "russian", "russisk", "ukrainian", "ukrainsk",
    "turkish", "tyrkisk", "ethiopian", "etiopisk", "colombian", "colombiansk",
    "stateless", "statsløs",
];

pub(super) const CITIZENSHIP_KEYWORDS: &[&str] = &[
    "citizenship", "nationality", "naturalization", "permanent residence",
    "residence permit", "work permit", "visa", "refugee", "asylum",
    "police clearance", "criminal record", "background check",
    "integration", "language test", "social studies",
    "fee", "application", "applicant", "passport", "identity",
    "birth certificate", "marriage certificate", "divorce",
    "statsborgerskap", "nasjonalitet", "innvilgelse", "søknad",
    "oppholdstillatelse", "permanent opphold", "arbeidstillatelse",
    "visum", "flyktning", "asyl", "politiattest", "vandelsattest",
    "integrering", "norskprøve", "samfunnskunnskap",
    "gebyr", "søker", "pass", "identitet",
    "fødselsattest", "vigselsattest", "skilsmisse",
    "utlendingsdirektoratet", "udi", "politi",
    "bosettingstillatelse", "midlertidig", "fornyelse",
];

pub(super) const LANGUAGE_INDICATORS: &[&str] = &[
    "norskprøve", "norwegian test", "language certificate",
    "muntlig", "skriftlig", "oral", "written",
    "a1", "a2", "b1", "b2", "c1", "c2",
    "bestått", "passed", "godkjent", "approved",
    "samfunnskunnskap", "social studies", "civic integration",
    "norskkurs", "norwegian course", "language course",
    "kompetanse norge", "folkeuniversitetet",
];

/// Entries starting with `\b` are regular expressions; the rest are literal phrases.
pub(super) const RESIDENCY_INDICATORS: &[&str] = &[
    "years of residence", "years in norway", "år i norge", "botid",
    "permanent residence", "permanent opphold", "settled status",
    "continuous residence", "sammenhengende opphold",
    "registered address", "folkeregistrert",
    "d-number", "d-nummer", "national id", "fødselsnummer",
    r"\b\d+\s+(?:years?|år)\b",
];

pub(super) const ADDRESS_PATTERNS: &[&str] = &[
    // postal code and place, e.g. 0150 Oslo
    r"\b(\d{4})\s+([A-ZÆØÅ][a-zæøå]+(?:[ \t]+[A-ZÆØÅ][a-zæøå]+)*)\b",
    // street and number, e.g. Storgata 12
    r"\b([A-ZÆØÅ][a-zæøå]+(?:gata|gaten|veien|vegen|gate|vei|veg))\s+\d+",
];

pub(super) const NAME_PATTERNS: &[&str] = &[
    r"(?:full\s+)?name\s*:\s*(.+)",
    r"(?:fullt\s+)?navn\s*:\s*(.+)",
    r"(?:surname|etternavn)\s*:\s*(.+)",
    r"(?:given\s+name|fornavn)\s*:\s*(.+)",
];

pub(super) const NUMERIC_VALUE_PATTERN: &str =
    r"\b(\d{1,2})\s+(?:years?|år|months?|måneder?)\b";

/// Organisations recognised by NER that count as citizenship keywords.
pub(super) const ORGANISATION_KEYWORDS: &[&str] = &[
    "utlendingsdirektoratet", "udi", "politi", "politiet", "skatteetaten",
    "kompetanse norge", "folkeuniversitetet", "folkeregisteret",
];

const EXPIRY_LABEL: &str = r"(?:expiry\s+date|date\s+of\s+expiry|expiration\s+date|expires(?:\s+on)?|valid\s+until|valid\s+to|utløpsdato|utløper|gyldig\s+til|gyldig\s+t\.?\s?o\.?\s?m\.?)";

const MONTH_NAME: &str = r"(?:jan(?:uary|uar)?|feb(?:ruary|ruar)?|mar(?:ch|s)?|apr(?:il)?|ma[iy]|jun[ei]?|jul[iy]?|aug(?:ust)?|sep(?:t|tember)?|o[ck]t(?:ober)?|nov(?:ember)?|de[cs](?:ember)?)";

/// An expiry label, optionally a second expiry label after a slash, a colon, then the date.
/// Only expiry labels may sit in either slot, so a birth or issue label never leads to a match.
static EXPIRY_LABELLED: LazyLock<Regex> = LazyLock::new(|| {
    let value = format!(
        r"(\d{{1,2}}[./\-]\d{{1,2}}[./\-]\d{{2,4}}|\d{{4}}[./\-]\d{{1,2}}[./\-]\d{{1,2}}|\d{{1,2}}_\d{{1,2}}_\d{{2,4}}|\d{{4}}_\d{{1,2}}_\d{{1,2}}|\d{{1,2}}\.?[ \t]+[a-zæøå]{{3,9}}[ \t]*/[ \t]*[a-zæøå]{{3,9}}\.?[ \t]+\d{{2,4}}|\d{{1,2}}\.?[ \t]+{MONTH_NAME}\.?[ \t]+\d{{4}})\b"
    );
    let pattern = format!(r"{EXPIRY_LABEL}(?:[ \t]*/[ \t]*{EXPIRY_LABEL})?[ \t]*:?[ \t]*{value}");
    build(&pattern, true)
});

/// TD3 machine-readable zone, second line: the expiry field follows the sex marker.
static MRZ_EXPIRY: LazyLock<Regex> = LazyLock::new(|| {
    build(
        r"(?m)^[A-Z0-9<]{9}[0-9][A-Z<]{3}[0-9]{6}[0-9][MF<]([0-9]{6})[0-9]",
        false,
    )
});

pub(super) static DATE_REGEXES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| build_all(DATE_PATTERNS, true));
pub(super) static ID_NUMBER_REGEXES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| build_all(ID_NUMBER_PATTERNS, false));
pub(super) static ADDRESS_REGEXES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| build_all(ADDRESS_PATTERNS, false));
pub(super) static NAME_REGEXES: LazyLock<Vec<Regex>> =
    LazyLock::new(|| build_all(NAME_PATTERNS, true));
pub(super) static NUMERIC_VALUE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| build(NUMERIC_VALUE_PATTERN, true));

/// Residency table entry, compiled.
pub(super) enum Indicator {
    Literal(&'static str),
    Pattern(Regex),
}

pub(super) static RESIDENCY_MATCHERS: LazyLock<Vec<Indicator>> = LazyLock::new(|| {
    RESIDENCY_INDICATORS
        .iter()
        .map(|entry| {
            if entry.starts_with(r"\b") {
                Indicator::Pattern(build(entry, true))
            } else {
                Indicator::Literal(entry)
            }
        })
        .collect()
});

/// Labelled expiry dates first, then MRZ expiry fields.
pub(super) fn expiry_dates(text: &str) -> Vec<String> {
    EXPIRY_LABELLED
        .captures_iter(text)
        .chain(MRZ_EXPIRY.captures_iter(text))
        .filter_map(|captures| captures.get(1))
        .map(|value| value.as_str().to_string())
        .collect()
}

fn build(pattern: &str, case_insensitive: bool) -> Regex {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .unwrap_or_else(|err| panic!("invalid entity pattern {pattern:?}: {err}"))
}

fn build_all(patterns: &[&str], case_insensitive: bool) -> Vec<Regex> {
    patterns
        .iter()
        .map(|pattern| build(pattern, case_insensitive))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_pattern_compiles() {
        assert_eq!(DATE_REGEXES.len(), DATE_PATTERNS.len());
        assert_eq!(ID_NUMBER_REGEXES.len(), ID_NUMBER_PATTERNS.len());
        assert_eq!(ADDRESS_REGEXES.len(), ADDRESS_PATTERNS.len());
        assert_eq!(NAME_REGEXES.len(), NAME_PATTERNS.len());
        assert_eq!(RESIDENCY_MATCHERS.len(), RESIDENCY_INDICATORS.len());
        assert!(NUMERIC_VALUE_REGEX.is_match("7 years"));
        assert!(expiry_dates("").is_empty());
    }

    #[test]
    fn only_anchored_residency_entries_are_patterns() {
        let patterns = RESIDENCY_MATCHERS
            .iter()
            .filter(|indicator| matches!(indicator, Indicator::Pattern(_)))
            .count();
        assert_eq!(patterns, 1);
    }

    #[test]
    fn expiry_label_accepts_bilingual_month_tokens() {
        let found = expiry_dates("Date of expiry/Utløpsdato: 10 MAI/MAY 2030");
        assert_eq!(found, vec!["10 MAI/MAY 2030".to_string()]);
    }

    #[test]
    fn mrz_line_yields_compact_expiry() {
        let mrz = "P<NORHANSEN<<OLA<<<<<<<<<<<<<<<<<<<<<<<<<<<<\nAB12345674NOR8503157M3005108<<<<<<<<<<<<<<06\n";
        assert_eq!(expiry_dates(mrz), vec!["300510".to_string()]);
    }
}
