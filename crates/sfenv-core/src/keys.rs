#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LetterCase {
    Lower,
    Upper,
    None,
}

impl LetterCase {
    fn of(ch: char) -> Self {
        if ch.is_lowercase() {
            LetterCase::Lower
        } else if ch.is_uppercase() {
            LetterCase::Upper
        } else {
            LetterCase::None
        }
    }
}

/// Convert a camelCase or mixedCase session key into UPPER_SNAKE_CASE.
///
/// An underscore goes in front of an uppercase letter that follows a lowercase
/// letter (digits carry the case of the letter before them), and in front of the
/// last capital of an acronym when a lowercase letter follows it, so
/// `instanceURL` and `HTTPServer` become `INSTANCE_URL` and `HTTP_SERVER`.
/// Keys that are already upper snake case come back unchanged.
pub fn to_upper_snake(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    let mut out = String::with_capacity(key.len() + 4);
    // Case of the most recent letter, carried across runs of digits.
    let mut context = LetterCase::None;

    for (idx, &ch) in chars.iter().enumerate() {
        let case = LetterCase::of(ch);
        if case == LetterCase::Upper {
            let next_is_lower = chars.get(idx + 1).is_some_and(|next| next.is_lowercase());
            let boundary = match context {
                LetterCase::Lower => true,
                LetterCase::Upper => next_is_lower,
                LetterCase::None => false,
            };
            if boundary {
                out.push('_');
            }
        }
        out.extend(ch.to_uppercase());

        if case != LetterCase::None {
            context = case;
        } else if !ch.is_ascii_digit() {
            context = LetterCase::None;
        }
    }

    out
}
