/// Formats a number with `,` between thousands groups.
///
/// At most six decimals are kept and trailing zeros dropped, but at least one
/// decimal is always shown: `8.5` stays `8.5` and `1234567.0` becomes
/// `1,234,567.0`.
pub fn group_thousands(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let fixed = format!("{:.6}", value);
    let fixed = fixed.trim_end_matches('0').trim_end_matches('.');
    let (sign, digits) = match fixed.strip_prefix('-') {
        // "-0" after rounding
        Some(rest) if rest.bytes().all(|b| b == b'0' || b == b'.') => ("", rest),
        Some(rest) => ("-", rest),
        None => ("", fixed),
    };
    let (int_part, frac_part) = digits.split_at(digits.find('.').unwrap_or(digits.len()));

    let mut out = String::with_capacity(fixed.len() + int_part.len() / 3);
    out.push_str(sign);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if frac_part.is_empty() {
        out.push_str(".0");
    } else {
        out.push_str(frac_part);
    }
    out
}

/// Y tick label: elements per second shown in millions
pub fn millions_tick(per_second: f64) -> String {
    group_thousands(per_second / 1_000_000.0)
}
