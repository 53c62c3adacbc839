use chrono::{Datelike, Local, NaiveDate};

/// Two-digit years that would land further than this in the future roll back a century.
const FUTURE_WINDOW_YEARS: i32 = 20;

/// Parse a loosely formatted date relative to today's local date.
pub fn parse_date_flexible(raw: &str) -> Option<NaiveDate> {
    parse_date_flexible_at(raw, Local::now().date_naive())
}

/// Parse a loosely formatted date. Accepted shapes:
///
/// - `DD.MM.YYYY`, `DD/MM/YY`, `DD-MM-YYYY`, `DD_MM_YYYY` (any of `. / - _`)
/// - `YYYY-MM-DD` and the same separator family
/// - `10 May 2030`, `10. mai 2030`, `10 MAI/MAY 30`
/// - compact `YYMMDD` as printed in machine-readable zones
pub fn parse_date_flexible_at(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let cleaned = raw.trim().trim_end_matches('.');
    if cleaned.is_empty() {
        return None;
    }

    if cleaned.len() == 6 && cleaned.bytes().all(|byte| byte.is_ascii_digit()) {
        let year = cleaned[0..2].parse().ok()?;
        let month = cleaned[2..4].parse().ok()?;
        let day = cleaned[4..6].parse().ok()?;
        return NaiveDate::from_ymd_opt(window_year(year, month, day, today)?, month, day);
    }

    let tokens: Vec<&str> = cleaned
        .split(|ch: char| matches!(ch, '.' | '/' | '-' | '_') || ch.is_whitespace())
        .filter(|token| !token.is_empty())
        .collect();

    // "10 MAI/MAY 2030": two month names for one date
    let tokens: Vec<&str> = match tokens.as_slice() {
        [day, first, second, year]
            if month_number(first).is_some() && month_number(second).is_some() =>
        {
            vec![*day, *first, *year]
        }
        _ => tokens,
    };

    let [first, second, third] = tokens.as_slice() else {
        return None;
    };

    let (year_token, month_token, day_token) = if is_four_digit_year(first) {
        (*first, *second, *third)
    } else {
        (*third, *second, *first)
    };

    let day: u32 = day_token.parse().ok()?;
    let month = month_number(month_token).or_else(|| month_token.parse().ok())?;
    let year = match year_token.len() {
        4 => year_token.parse().ok()?,
        2 => window_year(year_token.parse().ok()?, month, day, today)?,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

fn is_four_digit_year(token: &str) -> bool {
    token.len() == 4 && token.bytes().all(|byte| byte.is_ascii_digit())
}

fn window_year(two_digit: i32, month: u32, day: u32, today: NaiveDate) -> Option<i32> {
    let century = today.year() - today.year().rem_euclid(100);
    let year = century + two_digit;
    let candidate = NaiveDate::from_ymd_opt(year, month, day)?;
    let horizon = today
        .with_year(today.year() + FUTURE_WINDOW_YEARS)
        .or_else(|| NaiveDate::from_ymd_opt(today.year() + FUTURE_WINDOW_YEARS, 2, 28))?;
    if candidate > horizon {
        Some(year - 100)
    } else {
        Some(year)
    }
}

fn month_number(token: &str) -> Option<u32> {
    let lowered = token.to_lowercase();
    let month = match lowered.as_str() {
        "jan" | "january" | "januar" => 1,
        "feb" | "february" | "februar" => 2,
        "mar" | "march" | "mars" => 3,
        "apr" | "april" => 4,
        "may" | "mai" => 5,
        "jun" | "june" | "juni" => 6,
        "jul" | "july" | "juli" => 7,
        "aug" | "august" => 8,
        "sep" | "sept" | "september" => 9,
        "oct" | "okt" | "october" | "oktober" => 10,
        "nov" | "november" => 11,
        "dec" | "des" | "december" | "desember" => 12,
        _ => return None,
    };
    Some(month)
}
