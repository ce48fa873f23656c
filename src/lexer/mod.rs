use logos::Logos;

/// Tokens of the compiler's reply-literal grammar
///
/// Replies are a small expression language: quoted strings with backslash
/// escapes, numbers, booleans, brace-delimited lists, paren-delimited
/// tuples and `record ... end Name;` blocks.
#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    // Keywords
    #[token("record")]
    Record,

    #[token("end")]
    End,

    #[token("true")]
    True,

    #[token("false")]
    False,

    // Punctuation
    #[token("{")]
    LeftBrace,

    #[token("}")]
    RightBrace,

    #[token("(")]
    LeftParen,

    #[token(")")]
    RightParen,

    #[token(",")]
    Comma,

    #[token("=")]
    Equals,

    #[token(";")]
    Semicolon,

    // String literals (escapes kept verbatim, unescaped by the parser)
    #[regex(r#""([^"\\]|\\.)*""#, |lex| lex.slice().to_string())]
    String(String),

    // Numbers
    #[regex(r"-?[0-9]+\.[0-9]+([eE][+-]?[0-9]+)?", |lex| lex.slice().parse().ok(), priority = 3)]
    #[regex(r"-?[0-9]+[eE][+-]?[0-9]+", |lex| lex.slice().parse().ok())]
    Real(f64),

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse().ok())]
    Integer(i64),

    // Identifiers and dotted paths (Modelica.Blocks.Continuous)
    #[regex(r"[a-zA-Z_$][a-zA-Z0-9_$]*(\.[a-zA-Z_$][a-zA-Z0-9_$]*)*", |lex| lex.slice().to_string())]
    Ident(String),
}

pub struct Lexer<'a> {
    inner: logos::Lexer<'a, Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            inner: Token::lexer(input),
        }
    }

    pub fn tokenize(input: &str) -> Result<Vec<Token>, LexerError> {
        let mut tokens = Vec::new();
        let mut lexer = Token::lexer(input);

        while let Some(token_result) = lexer.next() {
            match token_result {
                Ok(token) => tokens.push(token),
                Err(_) => {
                    return Err(LexerError::InvalidToken {
                        position: lexer.span().start,
                        text: lexer.slice().to_string(),
                    });
                }
            }
        }

        Ok(tokens)
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token, LexerError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|result| {
            result.map_err(|_| LexerError::InvalidToken {
                position: self.inner.span().start,
                text: self.inner.slice().to_string(),
            })
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LexerError {
    #[error("Invalid token at position {position}: '{text}'")]
    InvalidToken { position: usize, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_reply() {
        let tokens = Lexer::tokenize("{Modelica,ModelicaReference}").unwrap();
        assert_eq!(tokens.len(), 5);
        assert_eq!(tokens[0], Token::LeftBrace);
        assert!(matches!(tokens[1], Token::Ident(_)));
        assert_eq!(tokens[2], Token::Comma);
    }

    #[test]
    fn test_dotted_path() {
        let tokens = Lexer::tokenize("Modelica.Blocks.Continuous").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0], Token::Ident("Modelica.Blocks.Continuous".into()));
    }

    #[test]
    fn test_string_with_escapes() {
        let tokens = Lexer::tokenize(r#""a \"quoted\" part""#).unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0], Token::String(r#""a \"quoted\" part""#.into()));
    }

    #[test]
    fn test_numbers() {
        let tokens = Lexer::tokenize("42 -7 1.5 -2.5e-3 1e6").unwrap();
        assert_eq!(tokens[0], Token::Integer(42));
        assert_eq!(tokens[1], Token::Integer(-7));
        assert_eq!(tokens[2], Token::Real(1.5));
        assert_eq!(tokens[3], Token::Real(-2.5e-3));
        assert_eq!(tokens[4], Token::Real(1e6));
    }

    #[test]
    fn test_booleans_and_keywords() {
        let tokens = Lexer::tokenize("record true false end x;").unwrap();
        assert_eq!(tokens[0], Token::Record);
        assert_eq!(tokens[1], Token::True);
        assert_eq!(tokens[2], Token::False);
        assert_eq!(tokens[3], Token::End);
        assert_eq!(tokens[4], Token::Ident("x".into()));
        assert_eq!(tokens[5], Token::Semicolon);
    }

    #[test]
    fn test_tuple_reply() {
        let tokens = Lexer::tokenize("(\"model\",false,3)").unwrap();
        assert_eq!(tokens.len(), 7);
        assert_eq!(tokens[0], Token::LeftParen);
        assert_eq!(tokens[3], Token::False);
        assert_eq!(tokens[5], Token::Integer(3));
        assert_eq!(tokens[6], Token::RightParen);
    }

    #[test]
    fn test_invalid_token() {
        assert!(Lexer::tokenize("{a,#}").is_err());
    }
}
