//! Tokens of the simulated expression language

use logos::Logos;

use crate::error::EvalError;

fn char_literal(lex: &mut logos::Lexer<Token>) -> Option<char> {
    let slice = lex.slice();
    let inner = &slice[1..slice.len() - 1];
    let mut chars = inner.chars();
    match (chars.next()?, chars.next()) {
        ('\\', Some(escaped)) => match escaped {
            'n' => Some('\n'),
            't' => Some('\t'),
            '0' => Some('\0'),
            '\\' | '\'' => Some(escaped),
            _ => None,
        },
        (c, None) => Some(c),
        _ => None,
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum Token {
    #[token("struct")]
    Struct,
    #[token("union")]
    Union,
    #[token("class")]
    Class,

    #[regex(r"[A-Za-z_$][A-Za-z0-9_$]*", |lex| lex.slice().to_string())]
    Ident(String),
    #[regex(r"0[xX][0-9a-fA-F]+", |lex| i128::from_str_radix(&lex.slice()[2..], 16).ok())]
    #[regex(r"[0-9]+", |lex| lex.slice().parse::<i128>().ok())]
    Int(i128),
    #[regex(r"'([^'\\]|\\.)'", char_literal)]
    Char(char),

    #[token("->")]
    Arrow,
    #[token(".")]
    Dot,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("*")]
    Star,
    #[token("&")]
    Amp,
    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
}

/// Split `input` into tokens.
pub fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut lexer = Token::lexer(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next() {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(EvalError::parse(format!(
                    "Invalid character '{}' in expression.",
                    lexer.slice()
                )))
            }
        }
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_path() {
        let tokens = tokenize("(p)->next[0x10]").unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::LParen,
                Token::Ident("p".to_string()),
                Token::RParen,
                Token::Arrow,
                Token::Ident("next".to_string()),
                Token::LBracket,
                Token::Int(16),
                Token::RBracket,
            ]
        );
    }

    #[test]
    fn test_keywords_and_chars() {
        let tokens = tokenize("(struct node *) 'a'").unwrap();
        assert_eq!(tokens[1], Token::Struct);
        assert_eq!(tokens[3], Token::Star);
        assert_eq!(tokens[5], Token::Char('a'));
        assert_eq!(tokenize("'\\n'").unwrap(), vec![Token::Char('\n')]);
    }

    #[test]
    fn test_invalid_character() {
        assert!(matches!(tokenize("a # b"), Err(EvalError::ParseError { .. })));
    }
}
