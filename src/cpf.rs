//! CPF (Brazilian individual taxpayer id) checksum validation and formatting
//!
//! A CPF is 11 digits: nine base digits followed by two check digits.
//! Validation never fails loudly; callers decide how to surface a bad id.

/// Number of digits in a CPF
pub const CPF_LEN: usize = 11;

/// Remove every non-digit character ("111.444.777-35" -> "11144477735")
pub fn strip_cpf(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Check a CPF against its two check digits
///
/// Formatting characters are ignored. Returns false for wrong length and for
/// the ten all-identical sequences ("00000000000" through "99999999999"),
/// which pass the arithmetic but are never issued.
pub fn validate_cpf(input: &str) -> bool {
    let digits: Vec<u32> = strip_cpf(input)
        .chars()
        .filter_map(|c| c.to_digit(10))
        .collect();

    if digits.len() != CPF_LEN {
        return false;
    }

    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    check_digit(&digits[..9]) == digits[9] && check_digit(&digits[..10]) == digits[10]
}

/// Weighted-sum check digit over `base`
///
/// Weights run from `base.len() + 1` down to 2. Remainders of 10 map to 0.
fn check_digit(base: &[u32]) -> u32 {
    let top_weight = base.len() as u32 + 1;
    let sum: u32 = base
        .iter()
        .enumerate()
        .map(|(i, &d)| d * (top_weight - i as u32))
        .sum();

    let remainder = (sum * 10) % 11;
    if remainder >= 10 { 0 } else { remainder }
}

/// Render an 11-digit CPF as "NNN.NNN.NNN-NN"
///
/// Input that does not strip down to exactly 11 digits is returned as-is.
pub fn format_cpf(input: &str) -> String {
    let digits = strip_cpf(input);
    if digits.len() != CPF_LEN {
        return input.to_string();
    }

    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_vectors() {
        assert!(validate_cpf("11144477735"));
        assert!(validate_cpf("111.444.777-35"));
        assert!(!validate_cpf("11111111111"));
        assert!(!validate_cpf("123"));
        assert!(!validate_cpf(""));
    }

    #[test]
    fn test_wrong_check_digits() {
        assert!(!validate_cpf("11144477734")); // second digit off
        assert!(!validate_cpf("11144477725")); // first digit off
    }

    #[test]
    fn test_identical_digits_rejected() {
        for d in 0..=9 {
            let cpf = d.to_string().repeat(11);
            assert!(!validate_cpf(&cpf), "{} should be invalid", cpf);
        }
    }

    #[test]
    fn test_check_digit_agrees_with_validator() {
        // Build valid CPFs from arbitrary bases and confirm both directions
        for base in ["123456789", "529982247", "000000001", "987654321"] {
            let mut digits: Vec<u32> = base.chars().filter_map(|c| c.to_digit(10)).collect();
            let first = check_digit(&digits);
            digits.push(first);
            let second = check_digit(&digits);
            digits.push(second);

            let cpf: String = digits.iter().map(|d| d.to_string()).collect();
            assert!(validate_cpf(&cpf), "{} should be valid", cpf);

            let mut broken = digits.clone();
            broken[10] = (broken[10] + 1) % 10;
            let broken: String = broken.iter().map(|d| d.to_string()).collect();
            assert!(!validate_cpf(&broken), "{} should be invalid", broken);
        }
    }

    #[test]
    fn test_known_check_digits() {
        // 529.982.247-25
        assert!(validate_cpf("52998224725"));
        assert_eq!(check_digit(&[5, 2, 9, 9, 8, 2, 2, 4, 7]), 2);
    }

    #[test]
    fn test_format() {
        assert_eq!(format_cpf("11144477735"), "111.444.777-35");
        assert_eq!(format_cpf("111.444.777-35"), "111.444.777-35");
        assert_eq!(format_cpf("123"), "123");
        assert_eq!(format_cpf("abc"), "abc");
    }

    #[test]
    fn test_format_idempotent_after_strip() {
        for input in ["11144477735", "111.444.777-35", "111 444 777 35", "52998224725"] {
            assert_eq!(format_cpf(&strip_cpf(input)), format_cpf(input));
            assert_eq!(format_cpf(&format_cpf(input)), format_cpf(input));
        }
    }
}
