use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use crate::{
    aflerr,
    core_types::{to_afl, AflError, AflResult},
};

const MONTH_NAMES: [&str; 12] = [
    "janeiro", "fevereiro", "março", "abril", "maio", "junho", "julho", "agosto", "setembro",
    "outubro", "novembro", "dezembro",
];

fn days_in_month(year: usize, month: usize) -> usize {
    match month {
        2 if (year % 4 == 0 && year % 100 != 0) || year % 400 == 0 => 29,
        2 => 28,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    }
}

/// Calendar day as the backend sends it, `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    date: usize,
}
impl Date {
    pub fn new(year: usize, month: usize, day: usize) -> AflResult<Self> {
        if month == 0 || month > 12 {
            Err(aflerr!("we only have months from 1-12 but not {month}"))
        } else if year == 0 {
            Err(aflerr!("there was no year 0"))
        } else if day == 0 || day > days_in_month(year, month) {
            Err(aflerr!("{year:04}-{month:02} has no day {day}"))
        } else {
            Ok(Date {
                date: year * 10000 + month * 100 + day,
            })
        }
    }

    pub fn year(&self) -> usize {
        self.date / 10000
    }

    pub fn month(&self) -> usize {
        (self.date / 100) % 100
    }

    pub fn day(&self) -> usize {
        self.date % 100
    }

    pub fn month_key(&self) -> MonthKey {
        MonthKey {
            year: self.year(),
            month: self.month(),
        }
    }

    /// `dd/mm/yyyy`
    pub fn to_br_string(&self) -> String {
        format!("{:02}/{:02}/{:04}", self.day(), self.month(), self.year())
    }
}
impl FromStr for Date {
    type Err = AflError;
    fn from_str(d: &str) -> AflResult<Self> {
        // timestamps like 2024-05-10T00:00:00 are cut to the day
        let d = d.get(..10).unwrap_or(d);
        if d.len() == 10 && d.is_ascii() && &d[4..5] == "-" && &d[7..8] == "-" {
            let year = d[..4].parse::<usize>().map_err(to_afl)?;
            let month = d[5..7].parse::<usize>().map_err(to_afl)?;
            let day = d[8..].parse::<usize>().map_err(to_afl)?;
            Self::new(year, month, day)
        } else {
            Err(aflerr!("date needs the format YYYY-MM-DD, got {d}"))
        }
    }
}
impl Display for Date {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = format!("{:04}-{:02}-{:02}", self.year(), self.month(), self.day());
        f.write_str(&s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonthKey {
    pub year: usize,
    pub month: usize,
}
impl MonthKey {
    /// e.g. `maio de 2024`
    pub fn long_name(&self) -> String {
        let name = MONTH_NAMES.get(self.month.wrapping_sub(1)).unwrap_or(&"---");
        format!("{name} de {}", self.year)
    }
    pub fn abbr(&self) -> String {
        MONTH_NAMES
            .get(self.month.wrapping_sub(1))
            .map(|m| m.chars().take(3).collect::<String>().to_uppercase())
            .unwrap_or_else(|| "---".to_string())
    }
}
impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&format!("{:04}-{:02}", self.year, self.month))
    }
}

/// Groups items by the month of their date; items with unparsable dates are dropped.
pub fn group_by_month<'a, T>(
    items: &'a [T],
    date_of: impl Fn(&T) -> &str,
) -> BTreeMap<MonthKey, Vec<&'a T>> {
    let mut groups: BTreeMap<MonthKey, Vec<&'a T>> = BTreeMap::new();
    for item in items {
        match Date::from_str(date_of(item)) {
            Ok(d) => groups.entry(d.month_key()).or_default().push(item),
            Err(e) => tracing::debug!("skipping item without valid date: {e}"),
        }
    }
    groups
}

#[test]
fn test_fromymd() {
    fn test(year: usize, month: usize, day: usize, reference: usize) {
        assert_eq!(Date::new(year, month, day).unwrap(), Date { date: reference });
    }
    test(2000, 1, 1, 20000101);
    test(1999, 12, 31, 19991231);
    test(2024, 2, 29, 20240229);
    test(2023, 5, 15, 20230515);

    assert!(Date::new(0, 7, 1).is_err());
    assert!(Date::new(2022, 13, 1).is_err());
    assert!(Date::new(2023, 2, 29).is_err());
    assert!(Date::new(2023, 4, 31).is_err());
    assert!(Date::new(2017, 0, 1).is_err());
    assert!(Date::new(2017, 1, 0).is_err());
}

#[test]
fn test_year_month_day() {
    fn test(d: &str, reference: usize, year: usize, month: usize, day: usize) {
        let d = Date::from_str(d).unwrap();
        assert_eq!(d, Date { date: reference });
        assert_eq!(d.year(), year);
        assert_eq!(d.month(), month);
        assert_eq!(d.day(), day);
    }
    test("1987-12-01", 19871201, 1987, 12, 1);
    test("2024-05-10T00:00:00", 20240510, 2024, 5, 10);
    assert!(Date::from_str("d").is_err());
    assert!(Date::from_str("2024/05/10").is_err());
    assert!(Date::from_str("2024-5-10").is_err());
    assert!(Date::from_str("2024-00-10").is_err());
}

#[test]
fn test_tostring() {
    let d = Date::from_str("1988-12-03").unwrap();
    assert_eq!(&d.to_string(), "1988-12-03");
    assert_eq!(&d.to_br_string(), "03/12/1988");
    assert_eq!(&d.month_key().to_string(), "1988-12");
    assert_eq!(&d.month_key().long_name(), "dezembro de 1988");
    assert_eq!(&d.month_key().abbr(), "DEZ");
}

#[test]
fn test_group_by_month() {
    let dates = ["2024-06-01", "2024-05-20", "garbage", "2024-06-15", "2023-12-31"];
    let groups = group_by_month(&dates, |d| *d);
    let keys = groups.keys().map(|k| k.to_string()).collect::<Vec<_>>();
    assert_eq!(keys, vec!["2023-12", "2024-05", "2024-06"]);
    let june = MonthKey {
        year: 2024,
        month: 6,
    };
    assert_eq!(groups[&june].len(), 2);
}
