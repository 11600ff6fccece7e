use chrono::{Datelike, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatPart {
    Literal(String),
    Token(Token),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Year,
    ShortYear,
    Month,
    MonthPadded,
    MonthShortName,
    MonthName,
    Day,
    DayPadded,
    DayOrdinal,
    DayOfYear,
    DayOfYearPadded,
    WeekdayNumber,
    WeekdayMinName,
    WeekdayShortName,
    WeekdayName,
    Hour,
    HourPadded,
    Hour12,
    Hour12Padded,
    Minute,
    MinutePadded,
    Second,
    SecondPadded,
    MeridiemUpper,
    MeridiemLower,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DateFormatError {
    #[error("date format is empty")]
    Empty,
    #[error("unclosed '[' in date format")]
    UnclosedEscape,
    #[error("unsupported date format token {0:?} (wrap literal text in [brackets])")]
    UnsupportedToken(String),
}

// Longest first, so `MMMM` wins over `MM` + `MM`.
const TOKEN_TABLE: &[(&str, Token)] = &[
    ("YYYY", Token::Year),
    ("MMMM", Token::MonthName),
    ("DDDD", Token::DayOfYearPadded),
    ("dddd", Token::WeekdayName),
    ("MMM", Token::MonthShortName),
    ("DDD", Token::DayOfYear),
    ("ddd", Token::WeekdayShortName),
    ("YY", Token::ShortYear),
    ("MM", Token::MonthPadded),
    ("Do", Token::DayOrdinal),
    ("DD", Token::DayPadded),
    ("dd", Token::WeekdayMinName),
    ("HH", Token::HourPadded),
    ("hh", Token::Hour12Padded),
    ("mm", Token::MinutePadded),
    ("ss", Token::SecondPadded),
    ("M", Token::Month),
    ("D", Token::Day),
    ("d", Token::WeekdayNumber),
    ("H", Token::Hour),
    ("h", Token::Hour12),
    ("m", Token::Minute),
    ("s", Token::Second),
    ("A", Token::MeridiemUpper),
    ("a", Token::MeridiemLower),
];

// Week, quarter, era, epoch and zone tokens. Matching them as literal text
// would silently accept names that moment reads differently.
const UNSUPPORTED_TOKEN_LETTERS: &[char] = &[
    'Q', 'W', 'w', 'g', 'G', 'E', 'e', 'X', 'x', 'k', 'S', 'Z',
];

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

const WEEKDAY_NAMES: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

pub fn parse_date_format(input: &str) -> Result<Vec<FormatPart>, DateFormatError> {
    if input.is_empty() {
        return Err(DateFormatError::Empty);
    }

    let mut parts = Vec::new();
    let mut literal = String::new();
    let mut rest = input;

    while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            let close = rest.find(']').ok_or(DateFormatError::UnclosedEscape)?;
            literal.push_str(&rest[1..close]);
            rest = &rest[close + 1..];
            continue;
        }

        if let Some((pattern, token)) = TOKEN_TABLE
            .iter()
            .find(|(pattern, _)| rest.starts_with(pattern))
        {
            if !literal.is_empty() {
                parts.push(FormatPart::Literal(std::mem::take(&mut literal)));
            }
            parts.push(FormatPart::Token(*token));
            rest = &rest[pattern.len()..];
            continue;
        }

        if UNSUPPORTED_TOKEN_LETTERS.contains(&ch) {
            let run = rest.len() - rest.trim_start_matches(ch).len();
            return Err(DateFormatError::UnsupportedToken(rest[..run].to_string()));
        }

        literal.push(ch);
        rest = &rest[ch.len_utf8()..];
    }

    if !literal.is_empty() {
        parts.push(FormatPart::Literal(literal));
    }

    Ok(parts)
}

/// Strict check: the whole `stem` must match the whole `format` and name a
/// real calendar date. An empty format never matches.
pub fn is_valid_date(stem: &str, format: &str) -> bool {
    parse_strict(stem, format, Local::now().year()).is_some()
}

/// Parses `stem` against `format`, returning the date it names.
///
/// `default_year` fills in the year when the format has no year token.
pub fn parse_strict(stem: &str, format: &str, default_year: i32) -> Option<NaiveDateTime> {
    let parts = parse_date_format(format).ok()?;
    let fields = match_parts(stem, &parts)?;
    fields.resolve(default_year)
}

pub fn format_date(date: NaiveDateTime, format: &str) -> Result<String, DateFormatError> {
    let parts = parse_date_format(format)?;
    let mut output = String::new();
    for part in &parts {
        match part {
            FormatPart::Literal(s) => output.push_str(s),
            FormatPart::Token(token) => output.push_str(&render_token(*token, date)),
        }
    }
    Ok(output)
}

fn render_token(token: Token, date: NaiveDateTime) -> String {
    let weekday = date.weekday().num_days_from_sunday() as usize;
    let month = date.month0() as usize;
    match token {
        Token::Year => format!("{:04}", date.year()),
        Token::ShortYear => format!("{:02}", date.year().rem_euclid(100)),
        Token::Month => date.month().to_string(),
        Token::MonthPadded => format!("{:02}", date.month()),
        Token::MonthShortName => MONTH_NAMES[month][..3].to_string(),
        Token::MonthName => MONTH_NAMES[month].to_string(),
        Token::Day => date.day().to_string(),
        Token::DayPadded => format!("{:02}", date.day()),
        Token::DayOrdinal => format!("{}{}", date.day(), ordinal_suffix(date.day())),
        Token::DayOfYear => date.ordinal().to_string(),
        Token::DayOfYearPadded => format!("{:03}", date.ordinal()),
        Token::WeekdayNumber => weekday.to_string(),
        Token::WeekdayMinName => WEEKDAY_NAMES[weekday][..2].to_string(),
        Token::WeekdayShortName => WEEKDAY_NAMES[weekday][..3].to_string(),
        Token::WeekdayName => WEEKDAY_NAMES[weekday].to_string(),
        Token::Hour => date.hour().to_string(),
        Token::HourPadded => format!("{:02}", date.hour()),
        Token::Hour12 => date.hour12().1.to_string(),
        Token::Hour12Padded => format!("{:02}", date.hour12().1),
        Token::Minute => date.minute().to_string(),
        Token::MinutePadded => format!("{:02}", date.minute()),
        Token::Second => date.second().to_string(),
        Token::SecondPadded => format!("{:02}", date.second()),
        Token::MeridiemUpper => meridiem(date.hour()).to_string(),
        Token::MeridiemLower => meridiem(date.hour()).to_ascii_lowercase(),
    }
}

fn meridiem(hour: u32) -> &'static str {
    if hour < 12 {
        "AM"
    } else {
        "PM"
    }
}

fn ordinal_suffix(n: u32) -> &'static str {
    if (11..=13).contains(&(n % 100)) {
        return "th";
    }
    match n % 10 {
        1 => "st",
        2 => "nd",
        3 => "rd",
        _ => "th",
    }
}

#[derive(Debug, Default)]
struct ParsedFields {
    year: Option<i32>,
    month: Option<u32>,
    day: Option<u32>,
    day_of_year: Option<u32>,
    weekday: Option<Weekday>,
    hour: Option<u32>,
    hour12: Option<u32>,
    pm: Option<bool>,
    minute: Option<u32>,
    second: Option<u32>,
}

impl ParsedFields {
    fn resolve(&self, default_year: i32) -> Option<NaiveDateTime> {
        let year = self.year.unwrap_or(default_year);
        let date = match self.day_of_year {
            Some(ordinal) => NaiveDate::from_yo_opt(year, ordinal)?,
            None => {
                NaiveDate::from_ymd_opt(year, self.month.unwrap_or(1), self.day.unwrap_or(1))?
            }
        };

        if let Some(weekday) = self.weekday {
            if date.weekday() != weekday {
                return None;
            }
        }

        let hour = match (self.hour, self.hour12) {
            (Some(hour), _) => hour,
            (None, Some(hour12)) => {
                if !(1..=12).contains(&hour12) {
                    return None;
                }
                match (hour12, self.pm.unwrap_or(false)) {
                    (12, false) => 0,
                    (12, true) => 12,
                    (h, true) => h + 12,
                    (h, false) => h,
                }
            }
            (None, None) => 0,
        };
        let time = NaiveTime::from_hms_opt(
            hour,
            self.minute.unwrap_or(0),
            self.second.unwrap_or(0),
        )?;

        Some(date.and_time(time))
    }
}

fn match_parts(input: &str, parts: &[FormatPart]) -> Option<ParsedFields> {
    let mut fields = ParsedFields::default();
    let mut rest = input;

    for part in parts {
        rest = match part {
            FormatPart::Literal(literal) => rest.strip_prefix(literal.as_str())?,
            FormatPart::Token(token) => match_token(*token, rest, &mut fields)?,
        };
    }

    if rest.is_empty() {
        Some(fields)
    } else {
        None
    }
}

fn match_token<'a>(token: Token, rest: &'a str, fields: &mut ParsedFields) -> Option<&'a str> {
    match token {
        Token::Year => {
            let (value, rest) = take_digits(rest, 4, 4)?;
            fields.year = Some(value as i32);
            Some(rest)
        }
        Token::ShortYear => {
            let (value, rest) = take_digits(rest, 2, 2)?;
            let value = value as i32;
            fields.year = Some(if value > 68 { 1900 + value } else { 2000 + value });
            Some(rest)
        }
        Token::Month | Token::MonthPadded => {
            let min = if token == Token::Month { 1 } else { 2 };
            let (value, rest) = take_digits(rest, min, 2)?;
            fields.month = Some(value);
            Some(rest)
        }
        Token::MonthShortName | Token::MonthName => {
            let (index, rest) = take_name(rest, &MONTH_NAMES, short_len(token))?;
            fields.month = Some(index as u32 + 1);
            Some(rest)
        }
        Token::Day | Token::DayPadded => {
            let min = if token == Token::Day { 1 } else { 2 };
            let (value, rest) = take_digits(rest, min, 2)?;
            fields.day = Some(value);
            Some(rest)
        }
        Token::DayOrdinal => {
            let (value, rest) = take_digits(rest, 1, 2)?;
            let rest = strip_prefix_ignore_case(rest, ordinal_suffix(value))?;
            fields.day = Some(value);
            Some(rest)
        }
        Token::DayOfYear | Token::DayOfYearPadded => {
            let min = if token == Token::DayOfYear { 1 } else { 3 };
            let (value, rest) = take_digits(rest, min, 3)?;
            fields.day_of_year = Some(value);
            Some(rest)
        }
        Token::WeekdayNumber => {
            let (value, rest) = take_digits(rest, 1, 1)?;
            fields.weekday = Some(weekday_from_sunday(value as usize)?);
            Some(rest)
        }
        Token::WeekdayMinName | Token::WeekdayShortName | Token::WeekdayName => {
            let (index, rest) = take_name(rest, &WEEKDAY_NAMES, short_len(token))?;
            fields.weekday = Some(weekday_from_sunday(index)?);
            Some(rest)
        }
        Token::Hour | Token::HourPadded => {
            let min = if token == Token::Hour { 1 } else { 2 };
            let (value, rest) = take_digits(rest, min, 2)?;
            fields.hour = Some(value);
            Some(rest)
        }
        Token::Hour12 | Token::Hour12Padded => {
            let min = if token == Token::Hour12 { 1 } else { 2 };
            let (value, rest) = take_digits(rest, min, 2)?;
            fields.hour12 = Some(value);
            Some(rest)
        }
        Token::Minute | Token::MinutePadded => {
            let min = if token == Token::Minute { 1 } else { 2 };
            let (value, rest) = take_digits(rest, min, 2)?;
            fields.minute = Some(value);
            Some(rest)
        }
        Token::Second | Token::SecondPadded => {
            let min = if token == Token::Second { 1 } else { 2 };
            let (value, rest) = take_digits(rest, min, 2)?;
            fields.second = Some(value);
            Some(rest)
        }
        Token::MeridiemUpper | Token::MeridiemLower => {
            if let Some(rest) = strip_prefix_ignore_case(rest, "AM") {
                fields.pm = Some(false);
                Some(rest)
            } else {
                let rest = strip_prefix_ignore_case(rest, "PM")?;
                fields.pm = Some(true);
                Some(rest)
            }
        }
    }
}

/// Name tokens compare against a prefix of the full name; `None` means the full name.
fn short_len(token: Token) -> Option<usize> {
    match token {
        Token::MonthShortName | Token::WeekdayShortName => Some(3),
        Token::WeekdayMinName => Some(2),
        _ => None,
    }
}

fn take_digits(input: &str, min: usize, max: usize) -> Option<(u32, &str)> {
    let count = input
        .bytes()
        .take(max)
        .take_while(u8::is_ascii_digit)
        .count();
    if count < min {
        return None;
    }
    let value = input[..count].parse().ok()?;
    Some((value, &input[count..]))
}

fn take_name<'a>(input: &'a str, names: &[&str], len: Option<usize>) -> Option<(usize, &'a str)> {
    names.iter().enumerate().find_map(|(index, name)| {
        let expected = match len {
            Some(len) => &name[..len],
            None => *name,
        };
        strip_prefix_ignore_case(input, expected).map(|rest| (index, rest))
    })
}

fn strip_prefix_ignore_case<'a>(input: &'a str, prefix: &str) -> Option<&'a str> {
    let head = input.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        Some(&input[prefix.len()..])
    } else {
        None
    }
}

fn weekday_from_sunday(index: usize) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}
