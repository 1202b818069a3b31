pub const MASK: &str = "••••••";
pub const MASK_SHORT: &str = "•••";

fn sep_1000(integral_part: &str, sep: char) -> String {
    if integral_part.len() > 3 {
        let start_idx = integral_part.len() % 3;
        let groups = (start_idx..integral_part.len())
            .step_by(3)
            .map(|idx| &integral_part[idx..idx + 3]);
        if start_idx == 0 {
            groups.collect::<Vec<_>>().join(&sep.to_string())
        } else {
            groups.fold(integral_part[..start_idx].to_string(), |s1, s2| {
                format!("{s1}{sep}{s2}")
            })
        }
    } else {
        integral_part.to_string()
    }
}

/// Brazilian number format with `.` as thousands separator and `,` as decimal mark.
pub fn format_num(x: f64, decimals: usize) -> String {
    if !x.is_finite() {
        return "-".to_string();
    }
    let s = format!("{:.*}", decimals, x.abs());
    let mut s_iter = s.split('.');
    let integral_part = sep_1000(s_iter.next().unwrap_or("0"), '.');
    let sign = if x < 0.0 && s.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    match s_iter.next() {
        Some(fp) => format!("{sign}{integral_part},{fp}"),
        None => format!("{sign}{integral_part}"),
    }
}

pub fn format_money(x: f64) -> String {
    if !x.is_finite() {
        return "R$ 0,00".to_string();
    }
    let s = format_num(x, 2);
    match s.strip_prefix('-') {
        Some(abs) => format!("-R$ {abs}"),
        None => format!("R$ {s}"),
    }
}

/// Leading `+` for non-negative values, as used for profit figures.
pub fn format_signed_money(x: f64) -> String {
    if x > 0.0 {
        format!("+{}", format_money(x))
    } else {
        format_money(x)
    }
}

pub fn format_pct(x: f64, decimals: usize) -> String {
    format!("{}%", format_num(x, decimals))
}

/// Money shown unless privacy mode hides it.
pub fn money(x: f64, hidden: bool) -> String {
    if hidden {
        MASK.to_string()
    } else {
        format_money(x)
    }
}

#[test]
fn test_sep_1000() {
    assert_eq!(&sep_1000("100", '.'), "100");
    assert_eq!(&sep_1000("1000", '.'), "1.000");
    assert_eq!(&sep_1000("92432", '.'), "92.432");
    assert_eq!(&sep_1000("192432", '.'), "192.432");
    assert_eq!(&sep_1000("2192432", '.'), "2.192.432");
}

#[test]
fn test_format_money() {
    assert_eq!(&format_money(0.0), "R$ 0,00");
    assert_eq!(&format_money(1234.5), "R$ 1.234,50");
    assert_eq!(&format_money(-98765.432), "-R$ 98.765,43");
    assert_eq!(&format_money(f64::NAN), "R$ 0,00");
    assert_eq!(&format_money(-0.001), "R$ 0,00");
    assert_eq!(&format_signed_money(10.0), "+R$ 10,00");
    assert_eq!(&format_signed_money(-10.0), "-R$ 10,00");
    assert_eq!(&money(10.0, true), MASK);
}

#[test]
fn test_format_pct() {
    assert_eq!(&format_pct(12.345, 1), "12,3%");
    assert_eq!(&format_pct(-3.0, 0), "-3%");
    assert_eq!(&format_num(1500.0, 0), "1.500");
}
