// Utility helpers for parsing and basic statistics.
//
// This module centralizes all the "dirty" spreadsheet cell handling so the
// rest of the code can assume clean, typed values.
use chrono::{Datelike, NaiveDate, Weekday};
use num_format::{Locale, ToFormattedString};

/// Spanish three-letter month abbreviations, January first.
pub const MONTH_NAMES: [&str; 12] = [
    "Ene", "Feb", "Mar", "Abr", "May", "Jun", "Jul", "Ago", "Sep", "Oct", "Nov", "Dic",
];

pub const WEEKDAY_NAMES: [&str; 7] = ["Lun", "Mar", "Mie", "Jue", "Vie", "Sab", "Dom"];

/// Outcome of coercing a spreadsheet cell to a number.
///
/// A cell that could not be read still contributes `0.0` downstream, but the
/// caller can tell it apart from a genuine zero reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced {
    Parsed(f64),
    Defaulted,
}

impl Coerced {
    pub fn value(self) -> f64 {
        match self {
            Coerced::Parsed(v) => v,
            Coerced::Defaulted => 0.0,
        }
    }

    pub fn is_defaulted(self) -> bool {
        matches!(self, Coerced::Defaulted)
    }
}

fn is_null_token(s: &str) -> bool {
    s.is_empty()
        || s == "-"
        || s.eq_ignore_ascii_case("nan")
        || s.eq_ignore_ascii_case("none")
        || s.eq_ignore_ascii_case("null")
}

/// `\d{1,3},\d{3}` or more than one comma group.
fn is_comma_thousands(s: &str) -> bool {
    let body = s.strip_prefix('-').unwrap_or(s);
    if body.matches(',').count() > 1 {
        return true;
    }
    match body.split_once(',') {
        Some((int, frac)) => {
            (1..=3).contains(&int.len())
                && int.chars().all(|c| c.is_ascii_digit())
                && frac.len() == 3
                && frac.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Convert a cell that may use either comma- or dot-decimal conventions into
/// a finite number.
///
/// - Blank and sentinel tokens (`nan`, `none`, `null`, `-`) default.
/// - Currency symbols and whitespace are stripped.
/// - With both separators present the right-most one is the decimal point.
/// - A lone comma is a thousands separator only for `1,234`-shaped values.
/// - Never fails: anything unreadable is `Coerced::Defaulted`.
pub fn coerce_number(token: &str) -> Coerced {
    let token = token.trim();
    if is_null_token(token) {
        return Coerced::Defaulted;
    }

    let cleaned: String = token
        .chars()
        .filter(|c| !c.is_whitespace() && !matches!(c, '$' | '€' | '£'))
        .collect();

    let normalized = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) if comma > dot => cleaned.replace('.', "").replace(',', "."),
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if is_comma_thousands(&cleaned) => cleaned.replace(',', ""),
        (Some(_), None) => cleaned.replacen(',', ".", 1),
        (None, _) => cleaned,
    };

    let mut numeric = String::with_capacity(normalized.len());
    let mut seen_dot = false;
    for (i, c) in normalized.chars().enumerate() {
        match c {
            '0'..='9' => numeric.push(c),
            '.' if !seen_dot => {
                seen_dot = true;
                numeric.push(c);
            }
            '-' if i == 0 => numeric.push(c),
            _ => {}
        }
    }

    match numeric.parse::<f64>() {
        Ok(v) if v.is_finite() => Coerced::Parsed(v),
        _ => Coerced::Defaulted,
    }
}

/// Coerce an already-numeric value; NaN and infinities default.
pub fn coerce_f64(v: f64) -> Coerced {
    if v.is_finite() {
        Coerced::Parsed(v)
    } else {
        Coerced::Defaulted
    }
}

/// Energy and consumption cells: like `coerce_number`, but negative readings
/// are not meaningful and default as well.
pub fn coerce_kwh(token: &str) -> Coerced {
    match coerce_number(token) {
        Coerced::Parsed(v) if v >= 0.0 => Coerced::Parsed(v.abs()),
        _ => Coerced::Defaulted,
    }
}

/// Replace Spanish/Latin accented letters with their plain ASCII base.
pub fn strip_accents(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            'á' | 'à' | 'ä' | 'â' | 'ã' => 'a',
            'Á' | 'À' | 'Ä' | 'Â' | 'Ã' => 'A',
            'é' | 'è' | 'ë' | 'ê' => 'e',
            'É' | 'È' | 'Ë' | 'Ê' => 'E',
            'í' | 'ì' | 'ï' | 'î' => 'i',
            'Í' | 'Ì' | 'Ï' | 'Î' => 'I',
            'ó' | 'ò' | 'ö' | 'ô' | 'õ' => 'o',
            'Ó' | 'Ò' | 'Ö' | 'Ô' | 'Õ' => 'O',
            'ú' | 'ù' | 'ü' | 'û' => 'u',
            'Ú' | 'Ù' | 'Ü' | 'Û' => 'U',
            'ñ' => 'n',
            'Ñ' => 'N',
            'ç' => 'c',
            'Ç' => 'C',
            other => other,
        })
        .collect()
}

/// Month token to 1..=12, or 0 when it is not a month.
///
/// Accepts `"6"`, `"6.0"`, `"Ene"`, `"enero"`, `"Sept."`.
pub fn parse_month(token: impl AsRef<str>) -> u32 {
    let token = token.as_ref().trim();
    if token.is_empty() {
        return 0;
    }
    if let Ok(n) = token.parse::<f64>() {
        let m = n.trunc();
        return if n.is_finite() && (1.0..=12.0).contains(&m) {
            m as u32
        } else {
            0
        };
    }
    let key: String = strip_accents(token).to_lowercase().chars().take(3).collect();
    match key.as_str() {
        "ene" => 1,
        "feb" => 2,
        "mar" => 3,
        "abr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "ago" => 8,
        "sep" | "set" => 9,
        "oct" => 10,
        "nov" => 11,
        "dic" => 12,
        _ => 0,
    }
}

/// Leading integer of an hour token (`"6"`, `"6.0"`, `"06:30"`), if it is a
/// valid hour of the day.
pub fn parse_hour(token: &str) -> Option<u32> {
    let token = token.trim();
    let digits_len = token.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits_len == 0 {
        return None;
    }
    let (digits, rest) = token.split_at(digits_len);
    let tail_ok = rest.is_empty()
        || rest.starts_with(':')
        || rest
            .strip_prefix('.')
            .map(|frac| !frac.is_empty() && frac.chars().all(|c| c.is_ascii_digit()))
            .unwrap_or(false);
    if !tail_ok {
        return None;
    }
    digits.parse::<u32>().ok().filter(|h| *h < 24)
}

pub fn parse_i32_safe(s: Option<&str>) -> Option<i32> {
    let v = coerce_number(s?).value().trunc();
    if v.is_finite() && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
        Some(v as i32)
    } else {
        None
    }
}

/// Parse a spreadsheet date, day-first. A trailing time component is ignored.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    let date_part = s.split(|c| c == ' ' || c == 'T').next().unwrap_or(s);
    const FORMATS: [&str; 7] = [
        "%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%Y-%m-%d", "%Y/%m/%d", "%d/%m/%y", "%d-%m-%y",
    ];
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_part, fmt).ok())
}

pub fn average(v: &[f64]) -> f64 {
    // Standard arithmetic mean; returns 0 for an empty slice to avoid NaNs.
    if v.is_empty() {
        return 0.0;
    }
    let sum: f64 = v.iter().copied().sum();
    sum / v.len() as f64
}

/// Sample standard deviation (n - 1); 0 when fewer than two values.
pub fn std_dev(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let mean = average(v);
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (v.len() - 1) as f64;
    var.sqrt()
}

/// `.` thousands and `,` decimals.
const DISPLAY_LOCALE: Locale = Locale::de;

/// Digit string too long for `u128`, grouped in threes.
fn group_digits(digits: &str) -> String {
    let sep = DISPLAY_LOCALE.separator();
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * sep.len());
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push_str(sep);
        }
        out.push(c);
    }
    out
}

/// Format with `.` thousands and `,` decimals, e.g. `1.234.567,89`.
pub fn format_number(n: f64, decimals: usize) -> String {
    let n = coerce_f64(n).value();
    let neg = n.is_sign_negative() && n != 0.0;
    let s = format!("{:.*}", decimals, n.abs());
    let (int_part, frac_part) = match s.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (s.as_str(), None),
    };
    let mut res = match int_part.parse::<u128>() {
        Ok(v) => v.to_formatted_string(&DISPLAY_LOCALE),
        Err(_) => group_digits(int_part),
    };
    if let Some(frac) = frac_part {
        res.push_str(DISPLAY_LOCALE.decimal());
        res.push_str(frac);
    }
    if neg {
        format!("-{}", res)
    } else {
        res
    }
}

pub fn format_currency(n: f64) -> String {
    format!("${}", format_number(n, 0))
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&DISPLAY_LOCALE)
}

/// `"Dic"`, or the number itself outside 1..=12.
pub fn month_name(month: u32) -> String {
    match month.checked_sub(1).and_then(|i| MONTH_NAMES.get(i as usize)) {
        Some(name) => name.to_string(),
        None => month.to_string(),
    }
}

/// `"Dic 2025"`
pub fn month_label(year: i32, month: u32) -> String {
    format!("{} {}", month_name(month), year)
}

/// `"22 Oct 2025"`
pub fn date_label(d: NaiveDate) -> String {
    format!("{} {} {}", d.day(), MONTH_NAMES[d.month0() as usize], d.year())
}

/// `"06:00"`
pub fn hour_label(h: u32) -> String {
    format!("{:02}:00", h)
}

pub fn weekday_label(w: Weekday) -> &'static str {
    WEEKDAY_NAMES[w.num_days_from_monday() as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn coerce_handles_both_locale_conventions() {
        assert_eq!(coerce_number("5,444"), Coerced::Parsed(5444.0));
        assert_eq!(coerce_number("5,6"), Coerced::Parsed(5.6));
        assert_eq!(coerce_number("1,234.56"), Coerced::Parsed(1234.56));
        assert_eq!(coerce_number("1.234,56"), Coerced::Parsed(1234.56));
        assert_eq!(coerce_number("1,234,567"), Coerced::Parsed(1234567.0));
        assert_eq!(coerce_number("12.5"), Coerced::Parsed(12.5));
    }

    #[test]
    fn coerce_defaults_on_blank_and_garbage() {
        for token in ["", "  ", "nan", "None", "NULL", "-", "abc", "$", "inf"] {
            assert_eq!(coerce_number(token), Coerced::Defaulted, "token {:?}", token);
        }
        assert_eq!(coerce_number("abc").value(), 0.0);
    }

    #[test]
    fn coerce_strips_currency_and_spaces() {
        assert_eq!(coerce_number("$ 1,200"), Coerced::Parsed(1200.0));
        assert_eq!(coerce_number("€1.234,5"), Coerced::Parsed(1234.5));
        assert_eq!(coerce_number(" 42 kWh "), Coerced::Parsed(42.0));
        assert_eq!(coerce_number("-3,5"), Coerced::Parsed(-3.5));
    }

    #[test]
    fn coerce_distinguishes_real_zero_from_default() {
        assert_eq!(coerce_number("0"), Coerced::Parsed(0.0));
        assert!(!coerce_number("0,0").is_defaulted());
        assert!(coerce_number("n/a").is_defaulted());
    }

    #[test]
    fn coerce_is_idempotent_on_clean_floats() {
        for x in [0.0, 1.0, 5.6, 1234.56, 98765.4321, 1e-7, 3.5e12] {
            assert_eq!(coerce_number(&x.to_string()), Coerced::Parsed(x));
            assert_eq!(coerce_f64(x), Coerced::Parsed(x));
        }
        assert_eq!(coerce_f64(f64::NAN), Coerced::Defaulted);
        assert_eq!(coerce_f64(f64::INFINITY), Coerced::Defaulted);
    }

    #[test]
    fn coerce_kwh_rejects_negative_readings() {
        assert_eq!(coerce_kwh("-12"), Coerced::Defaulted);
        assert_eq!(coerce_kwh("12,5"), Coerced::Parsed(12.5));
    }

    #[test]
    fn month_tokens() {
        assert_eq!(parse_month("Ene"), 1);
        assert_eq!(parse_month("1"), 1);
        assert_eq!(parse_month(1.to_string()), 1);
        assert_eq!(parse_month("6.0"), 6);
        assert_eq!(parse_month("diciembre"), 12);
        assert_eq!(parse_month("Setiembre"), 9);
        assert_eq!(parse_month("13"), 0);
        assert_eq!(parse_month("0"), 0);
        assert_eq!(parse_month("foo"), 0);
        assert_eq!(parse_month(""), 0);
    }

    #[test]
    fn hour_tokens() {
        assert_eq!(parse_hour("6"), Some(6));
        assert_eq!(parse_hour("6:00"), Some(6));
        assert_eq!(parse_hour("06:30"), Some(6));
        assert_eq!(parse_hour("13.0"), Some(13));
        assert_eq!(parse_hour("24"), None);
        assert_eq!(parse_hour("6am"), None);
        assert_eq!(parse_hour("hora"), None);
        assert_eq!(parse_hour(""), None);
    }

    #[test]
    fn dates_are_day_first() {
        let d = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
        assert_eq!(parse_date_safe(Some("03/10/2025")), Some(d));
        assert_eq!(parse_date_safe(Some("2025-10-03")), Some(d));
        assert_eq!(parse_date_safe(Some("03/10/2025 00:00:00")), Some(d));
        assert_eq!(parse_date_safe(Some("garbage")), None);
        assert_eq!(parse_date_safe(None), None);
    }

    #[test]
    fn accents_are_stripped() {
        assert_eq!(strip_accents("Año Energía Café"), "Ano Energia Cafe");
        assert_eq!(strip_accents("HISTÓRICO"), "HISTORICO");
    }

    #[test]
    fn statistics() {
        assert!(approx_eq(average(&[1.0, 2.0, 3.0]), 2.0));
        assert_eq!(average(&[]), 0.0);
        assert!(approx_eq(std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]), 2.138089935299395));
        assert_eq!(std_dev(&[5.0]), 0.0);
    }

    #[test]
    fn display_formatting() {
        assert_eq!(format_number(1234567.891, 2), "1.234.567,89");
        assert_eq!(format_number(12.0, 0), "12");
        assert_eq!(format_number(-45.5, 1), "-45,5");
        assert_eq!(format_currency(157150.0), "$157.150");
        assert_eq!(format_int(1234567usize), "1.234.567");
        assert_eq!(format_int(-1500i64), "-1.500");
        assert_eq!(month_label(2025, 12), "Dic 2025");
        assert_eq!(month_name(1), "Ene");
        assert_eq!(month_name(13), "13");
        assert_eq!(date_label(NaiveDate::from_ymd_opt(2025, 10, 22).unwrap()), "22 Oct 2025");
        assert_eq!(hour_label(6), "06:00");
        assert_eq!(weekday_label(Weekday::Sun), "Dom");
    }

    #[test]
    fn huge_values_keep_their_digits() {
        assert_eq!(format_number(1e20, 0), "100.000.000.000.000.000.000");
        assert_eq!(format_currency(2e19), "$20.000.000.000.000.000.000");
        let s = format_number(1e40, 0);
        assert!(s.starts_with("10."));
        assert_eq!(s.len(), 41 + 13);
        assert_eq!(group_digits("1234567"), "1.234.567");
        assert_eq!(group_digits("123"), "123");
    }
}
