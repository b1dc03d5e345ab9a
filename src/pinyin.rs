//! Pinyin answers: tone marks, tone numbers and the ü spellings all compare equal.

const NEUTRAL_TONE: u8 = 5;

fn strip_tone(c: char) -> Option<(char, u8)> {
    let (base, tone) = match c {
        'ā' => ('a', 1),
        'á' => ('a', 2),
        'ǎ' => ('a', 3),
        'à' => ('a', 4),
        'ē' => ('e', 1),
        'é' => ('e', 2),
        'ě' => ('e', 3),
        'è' => ('e', 4),
        'ī' => ('i', 1),
        'í' => ('i', 2),
        'ǐ' => ('i', 3),
        'ì' => ('i', 4),
        'ō' => ('o', 1),
        'ó' => ('o', 2),
        'ǒ' => ('o', 3),
        'ò' => ('o', 4),
        'ū' => ('u', 1),
        'ú' => ('u', 2),
        'ǔ' => ('u', 3),
        'ù' => ('u', 4),
        'ǖ' => ('ü', 1),
        'ǘ' => ('ü', 2),
        'ǚ' => ('ü', 3),
        'ǜ' => ('ü', 4),
        _ => return None,
    };
    Some((base, tone))
}

/// Canonical `syllable + tone digit` form, e.g. `"lǜ"`, `"lv4"` and `"lu:4"` all
/// become `"lü4"`. A syllable without a tone gets the neutral tone `5`.
pub fn normalize_pinyin(input: &str) -> String {
    let lowered = input.trim().to_lowercase().replace("u:", "ü");
    let mut syllable = String::with_capacity(lowered.len());
    let mut tone = None;
    for c in lowered.chars() {
        if let Some((base, t)) = strip_tone(c) {
            syllable.push(base);
            tone = Some(t);
        } else if let Some(d) = c.to_digit(10).filter(|d| (1..=5).contains(d)) {
            tone = Some(d as u8);
        } else if c == 'v' {
            syllable.push('ü');
        } else if c.is_alphabetic() || c == 'ü' {
            syllable.push(c);
        }
    }
    format!("{syllable}{}", tone.unwrap_or(NEUTRAL_TONE))
}

/// Checks a typed answer. A tone picked separately overrides any digit typed into
/// the text. `canonical` may list alternatives separated by `,` or `/`.
pub fn check_pinyin(typed: &str, selected_tone: Option<u8>, canonical: &str) -> bool {
    if typed.trim().is_empty() {
        return false;
    }
    let mut answer = normalize_pinyin(typed);
    if let Some(tone) = selected_tone.filter(|t| (1..=5).contains(t)) {
        answer.pop();
        answer.push(char::from(b'0' + tone));
    }
    canonical
        .split([',', '/'])
        .filter(|alt| !alt.trim().is_empty())
        .any(|alt| normalize_pinyin(alt) == answer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    pub fn normalizing() {
        assert_eq!(normalize_pinyin("shí"), "shi2");
        assert_eq!(normalize_pinyin("Shi2"), "shi2");
        assert_eq!(normalize_pinyin(" ne "), "ne5");
        assert_eq!(normalize_pinyin("ne5"), "ne5");
        assert_eq!(normalize_pinyin("lǜ"), "lü4");
        assert_eq!(normalize_pinyin("lv4"), "lü4");
        assert_eq!(normalize_pinyin("lu:4"), "lü4");
    }

    #[test]
    pub fn marks_and_numbers_agree() {
        assert!(check_pinyin("shi2", None, "shí"));
        assert!(check_pinyin("shí", None, "shi2"));
        assert!(check_pinyin("shi", Some(2), "shí"));
        assert!(check_pinyin("shi4", Some(2), "shí"));
        assert!(!check_pinyin("shi", Some(4), "shí"));
        assert!(!check_pinyin("shi", None, "shí"));
    }

    #[test]
    pub fn neutral_tone() {
        assert!(check_pinyin("ne", None, "ne"));
        assert!(check_pinyin("ne", Some(5), "ne"));
        assert!(!check_pinyin("ne", Some(1), "ne"));
    }

    #[test]
    pub fn alternatives_and_blanks() {
        assert!(check_pinyin("le", None, "liǎo, le"));
        assert!(check_pinyin("liao3", None, "liǎo/le"));
        assert!(!check_pinyin("  ", Some(3), "liǎo"));
    }
}
