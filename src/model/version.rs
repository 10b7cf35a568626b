use std::cmp::Ordering;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Numeric(String),
    Alphabetic(String),
}

fn tokenize(version: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current: Option<Token> = None;
    for c in version.chars() {
        if c.is_ascii_digit() {
            match &mut current {
                Some(Token::Numeric(run)) => run.push(c),
                _ => {
                    tokens.extend(current.take());
                    current = Some(Token::Numeric(c.to_string()));
                }
            }
        } else if c.is_alphabetic() {
            match &mut current {
                Some(Token::Alphabetic(run)) => run.extend(c.to_lowercase()),
                _ => {
                    tokens.extend(current.take());
                    current = Some(Token::Alphabetic(c.to_lowercase().collect()));
                }
            }
        } else {
            // `.`, `-`, `_`, `+` and anything else end the current run
            tokens.extend(current.take());
        }
    }
    tokens.extend(current);

    while let Some(last) = tokens.last() {
        let trailing_zero = match last {
            Token::Numeric(run) => run.chars().all(|c| c == '0'),
            Token::Alphabetic(run) => run.is_empty(),
        };
        if !trailing_zero {
            break;
        }
        tokens.pop();
    }
    tokens
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Orders Maven-style version strings.
///
/// Numeric runs compare by value, so `2.0 < 10.0`, and trailing zero components are ignored,
/// so `1.2 == 1.2.0`. A numeric component outranks an alphabetic or missing one; alphabetic
/// components compare case-insensitively, with a missing component sorting first.
pub fn compare_version(a: &str, b: &str) -> Ordering {
    let a = tokenize(a);
    let b = tokenize(b);
    for i in 0..a.len().max(b.len()) {
        let ordering = match (a.get(i), b.get(i)) {
            (Some(Token::Numeric(x)), Some(Token::Numeric(y))) => compare_numeric(x, y),
            (Some(Token::Numeric(_)), _) => Ordering::Greater,
            (_, Some(Token::Numeric(_))) => Ordering::Less,
            (x, y) => text(x).cmp(text(y)),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn text(token: Option<&Token>) -> &str {
    match token {
        Some(Token::Alphabetic(run)) => run,
        _ => "",
    }
}

/// The highest of `versions` according to [`compare_version`].
pub fn highest<'a, I>(versions: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    versions
        .into_iter()
        .fold(None, |best: Option<&str>, candidate| match best {
            Some(best) if compare_version(candidate, best) != Ordering::Greater => Some(best),
            _ => Some(candidate),
        })
}
