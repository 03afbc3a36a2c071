use logos::Logos;

/// An opening (or self-closing) tag with its attributes. Names are
/// lowercased and attribute values have entities decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct StartTag {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub self_closing: bool,
}

/// Tokens of an HTML document
#[derive(Logos, Debug, Clone, PartialEq)]
pub enum Token {
    #[token("<!--", skip_comment)]
    Comment,

    #[regex(r"<![a-zA-Z][^>]*>")]
    Doctype,

    #[regex(r#"<[a-zA-Z][a-zA-Z0-9-]*([^>"']|"[^"]*"|'[^']*')*>"#, |lex| start_tag(lex.slice()))]
    StartTag(StartTag),

    #[regex(r"</[a-zA-Z][a-zA-Z0-9-]*[^>]*>", |lex| end_tag(lex.slice()))]
    EndTag(String),

    #[regex(r"[^<]+", |lex| decode_entities(lex.slice()))]
    Text(String),

    /// A `<` that does not start a tag.
    #[token("<")]
    Lt,
}

fn skip_comment(lex: &mut logos::Lexer<Token>) {
    let rest = lex.remainder();
    let end = rest.find("-->").map_or(rest.len(), |i| i + 3);
    lex.bump(end);
}

fn end_tag(slice: &str) -> String {
    slice[2..]
        .trim_end_matches('>')
        .trim()
        .to_ascii_lowercase()
}

fn start_tag(slice: &str) -> StartTag {
    let inner = &slice[1..slice.len() - 1];
    let name_end = inner
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
        .unwrap_or(inner.len());
    let name = inner[..name_end].to_ascii_lowercase();
    let mut rest = inner[name_end..].trim_end();
    let self_closing = rest.ends_with('/');
    if self_closing {
        rest = &rest[..rest.len() - 1];
    }
    StartTag {
        name,
        attrs: attributes(rest),
        self_closing,
    }
}

fn attributes(mut rest: &str) -> Vec<(String, String)> {
    let mut attrs = Vec::new();
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '/');
        if rest.is_empty() {
            return attrs;
        }
        let name_end = rest
            .find(|c: char| c.is_whitespace() || c == '=' || c == '/')
            .unwrap_or(rest.len());
        let name = rest[..name_end].to_ascii_lowercase();
        rest = rest[name_end..].trim_start();

        let mut value = String::new();
        if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let end = body.find(quote).unwrap_or(body.len());
                    value = decode_entities(&body[..end]);
                    rest = body.get(end + 1..).unwrap_or("");
                }
                _ => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    value = decode_entities(&after_eq[..end]);
                    rest = &after_eq[end..];
                }
            }
        }
        if !name.is_empty() {
            attrs.push((name, value));
        }
    }
}

/// Decode character references. Unknown named references are kept as
/// written.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest.find(';').filter(|&end| end <= 10).and_then(|end| {
            let entity = &rest[1..end];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16).ok().and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            ch.map(|c| (c, end))
        });
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Tokenize HTML. Never fails: anything that is not markup is text.
pub fn tokenize(source: &str) -> Vec<Token> {
    let mut lex = Token::lexer(source);
    let mut tokens = Vec::new();
    while let Some(result) = lex.next() {
        match result {
            Ok(token) => tokens.push(token),
            Err(()) => tokens.push(Token::Text(lex.slice().to_string())),
        }
    }
    tokens
}
