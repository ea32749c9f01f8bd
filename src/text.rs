//! Floating-point text format (§6.4)
//!
//! Grounded in `fd_main.c`'s `mpfrToString`/`mpfrToStringShort` and
//! `fd_relerr.cpp`'s `mpfrToStringE`: a base-10 mantissa with a fixed
//! digit count, a `" * 10^EXP"` (or, in the companion tool's short form,
//! `"eEXP"`) suffix, and an optional trailing bit-precision footer.

use rug::Float;

const FULL_DIGITS: u32 = 60;
const SHORT_DIGITS: u32 = 3;

/// Render `f` with up to 60 significant decimal digits, `" * 10^EXP"` suffix.
pub fn format_full(f: &Float) -> String {
    render(f, FULL_DIGITS, " * 10^")
}

/// Render `f` with 3 significant decimal digits, `"eEXP"` suffix — used for
/// compact log lines (`--print-every-error`, mean-error report bodies).
pub fn format_short(f: &Float) -> String {
    render(f, SHORT_DIGITS, "e")
}

/// `format_full` plus a trailing `", used/total bit"` footer, as emitted by
/// `GET_SHADOW`/`GET_RELATIVE_ERROR` client requests.
pub fn format_with_precision_footer(f: &Float, used_bits: u32) -> String {
    format!("{}, {used_bits}/{} bit", format_full(f), f.prec())
}

fn render(f: &Float, digits: u32, exp_sep: &str) -> String {
    if f.is_nan() {
        return "NaN".to_string();
    }
    if f.is_infinite() {
        return if f.is_sign_negative() { "-Inf" } else { "Inf" }.to_string();
    }
    if f.is_zero() {
        return format!("0.{}{exp_sep}0", "0".repeat(digits.saturating_sub(1) as usize));
    }

    let raw = f.to_string_radix(10, Some(digits as usize));
    let negative = raw.starts_with('-');
    let unsigned = raw.strip_prefix('-').unwrap_or(&raw);

    let (mantissa_part, exp_part) = match unsigned.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (unsigned, 0),
    };
    let dot_idx = mantissa_part.find('.').unwrap_or(mantissa_part.len()) as i32;
    let digit_chars: Vec<char> = mantissa_part.chars().filter(|c| c.is_ascii_digit()).collect();

    let mut exp10 = exp_part + dot_idx - 1;
    let mut lead = 0;
    while lead + 1 < digit_chars.len() && digit_chars[lead] == '0' {
        lead += 1;
        exp10 -= 1;
    }
    let significant: String = digit_chars[lead..].iter().collect();
    let padded = pad_or_trim(&significant, digits as usize);
    let (first, rest) = padded.split_at(1);
    let sign = if negative { "-" } else { "" };
    format!("{sign}{first}.{rest}{exp_sep}{exp10}")
}

fn pad_or_trim(s: &str, width: usize) -> String {
    if s.len() >= width {
        s[..width].to_string()
    } else {
        format!("{s}{}", "0".repeat(width - s.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_formats_without_exponent_noise() {
        let z = Float::with_val(53, 0.0);
        assert!(format_full(&z).starts_with("0."));
    }

    #[test]
    fn nan_and_inf_are_literal() {
        let nan = Float::with_val(53, rug::float::Special::Nan);
        let inf = Float::with_val(53, rug::float::Special::Infinity);
        assert_eq!(format_full(&nan), "NaN");
        assert_eq!(format_full(&inf), "Inf");
    }

    #[test]
    fn one_formats_with_leading_digit_one() {
        let one = Float::with_val(53, 1.0);
        let s = format_short(&one);
        assert!(s.starts_with('1'));
        assert!(s.contains('e'));
    }

    #[test]
    fn small_value_normalizes_leading_zeros_away() {
        let v = Float::with_val(53, 0.000123);
        let s = format_short(&v);
        assert!(s.starts_with('1'));
    }
}
