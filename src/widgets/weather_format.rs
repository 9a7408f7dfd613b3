/*
 *  widgets/weather_format.rs
 *
 *  lydash - worth the squeeze
 *  (c) 2020-26 Stuart Hunter
 *
 *  Weather format strings, "{name[:param]}" expressions to typed tokens
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, either version 3 of the License, or
 *  (at your option) any later version.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *  Public License.
 *
 */

/// Names that occupy the rest of the row with a panel instead of text
pub const LARGE_NAMES: [&str; 2] = ["forecast", "graph"];

/// Values read from forecast days, `param` selects the day (0 = today)
pub const FORECAST_VALUES: [&str; 4] = ["max", "min", "pop", "day"];
pub const AIR_VALUES: [&str; 3] = ["aqi", "pm25", "pm10"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Value { name: String, param: Option<String> },
    /// `{icon}` current conditions, `{icon:N}` forecast day N
    Icon { param: Option<String> },
    Large { name: String, param: Option<String> },
}

impl Token {
    fn from_expr(name: &str, param: Option<&str>) -> Self {
        let param = param.map(str::to_string);
        if name == "icon" {
            Token::Icon { param }
        } else if LARGE_NAMES.contains(&name) {
            Token::Large { name: name.to_string(), param }
        } else {
            Token::Value { name: name.to_string(), param }
        }
    }
}

fn push_literal(tokens: &mut Vec<Token>, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Token::Literal(prev)) = tokens.last_mut() {
        prev.push_str(text);
    } else {
        tokens.push(Token::Literal(text.to_string()));
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Split a format string into tokens. Anything that is not a well formed
/// `{name[:param]}` stays literal text, so tokenising never fails.
pub fn tokenize(format: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut rest = format;
    while let Some(open) = rest.find('{') {
        push_literal(&mut tokens, &rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            push_literal(&mut tokens, &rest[open..]);
            return tokens;
        };
        let expr = &after[..close];
        // a nested '{' restarts the scan at the inner brace
        if let Some(inner) = expr.find('{') {
            push_literal(&mut tokens, &rest[open..open + 1 + inner]);
            rest = &after[inner..];
            continue;
        }
        let (name, param) = match expr.split_once(':') {
            Some((n, p)) => (n.trim(), Some(p.trim())),
            None => (expr.trim(), None),
        };
        if valid_name(name) {
            tokens.push(Token::from_expr(name, param));
        } else {
            push_literal(&mut tokens, &rest[open..open + close + 2]);
        }
        rest = &after[close + 1..];
    }
    push_literal(&mut tokens, rest);
    tokens
}

/// Re-emit tokens as a format string
pub fn emit(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        let (name, param) = match token {
            Token::Literal(s) => {
                out.push_str(s);
                continue;
            }
            Token::Value { name, param } | Token::Large { name, param } => (name.as_str(), param),
            Token::Icon { param } => ("icon", param),
        };
        out.push('{');
        out.push_str(name);
        if let Some(p) = param {
            out.push(':');
            out.push_str(p);
        }
        out.push('}');
    }
    out
}

/// Data a token list needs fetched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Needs {
    pub forecast: bool,
    pub air_quality: bool,
    pub uv: bool,
}

impl Needs {
    pub fn of(tokens: &[Token]) -> Self {
        let mut needs = Needs::default();
        for token in tokens {
            match token {
                Token::Large { .. } => needs.forecast = true,
                Token::Icon { param } => needs.forecast |= param.is_some(),
                Token::Value { name, .. } => {
                    needs.forecast |= FORECAST_VALUES.contains(&name.as_str());
                    needs.air_quality |= AIR_VALUES.contains(&name.as_str());
                    needs.uv |= name == "uv";
                }
                Token::Literal(_) => {}
            }
        }
        needs
    }

    pub fn union(self, other: Needs) -> Needs {
        Needs {
            forecast: self.forecast || other.forecast,
            air_quality: self.air_quality || other.air_quality,
            uv: self.uv || other.uv,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(name: &str, param: Option<&str>) -> Token {
        Token::Value { name: name.into(), param: param.map(Into::into) }
    }

    #[test]
    fn test_tokenize_mixed() {
        let t = tokenize("{icon} {temp:1}C {forecast}");
        assert_eq!(
            t,
            vec![
                Token::Icon { param: None },
                Token::Literal(" ".into()),
                value("temp", Some("1")),
                Token::Literal("C ".into()),
                Token::Large { name: "forecast".into(), param: None },
            ]
        );
    }

    #[test]
    fn test_literal_round_trip() {
        for s in ["", "plain text", "50% humid }", "a:b:c", "closing } only"] {
            assert_eq!(tokenize(s), if s.is_empty() { vec![] } else { vec![Token::Literal(s.into())] });
            assert_eq!(emit(&tokenize(s)), s);
        }
    }

    #[test]
    fn test_malformed_stays_literal() {
        assert_eq!(tokenize("{unterminated"), vec![Token::Literal("{unterminated".into())]);
        assert_eq!(tokenize("{}"), vec![Token::Literal("{}".into())]);
        assert_eq!(tokenize("{bad name}"), vec![Token::Literal("{bad name}".into())]);
        assert_eq!(
            tokenize("{{humidity}"),
            vec![Token::Literal("{".into()), value("humidity", None)]
        );
    }

    #[test]
    fn test_emit_round_trips_expressions() {
        let s = "{desc} {max:1}/{min:1} {icon:2}{graph}";
        assert_eq!(emit(&tokenize(s)), s);
    }

    #[test]
    fn test_needs() {
        assert_eq!(Needs::of(&tokenize("{temp} {desc}")), Needs::default());
        let n = Needs::of(&tokenize("{max:1} {aqi} {uv}"));
        assert!(n.forecast && n.air_quality && n.uv);
        assert!(Needs::of(&tokenize("{icon:1}")).forecast);
        assert!(!Needs::of(&tokenize("{icon}")).forecast);
    }
}
