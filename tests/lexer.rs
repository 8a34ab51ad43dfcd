#[cfg(test)]
mod lexer_tests {
    use typthon as tp;

    use tp::error::TypthonError;
    use tp::lexer::Lexer;
    use tp::token::*;

    fn tokens(source: &str) -> Vec<Token> {
        Lexer::new(source)
            .map(|result| result.expect("lexing should succeed"))
            .collect()
    }

    fn assert_token_sequence(source: &str, expected: &[(TokenType, &str)]) {
        let tokens = tokens(source);

        assert_eq!(
            tokens.len(),
            expected.len(),
            "token count mismatch: {:?}",
            tokens
        );

        for (actual, (expected_kind, expected_text)) in tokens.iter().zip(expected.iter()) {
            assert_eq!(actual.kind, *expected_kind, "at token {}", actual);
            assert_eq!(actual.text, *expected_text, "at token {}", actual);
        }
    }

    #[test]
    fn test_lexer_01_block_layout() {
        assert_token_sequence(
            "if x:\n    y = 1\nz = 2\n",
            &[
                (TokenType::KEYWORD, "if"),
                (TokenType::IDENTIFIER, "x"),
                (TokenType::SYMBOL, ":"),
                (TokenType::NEWLINE, ""),
                (TokenType::INDENT, ""),
                (TokenType::IDENTIFIER, "y"),
                (TokenType::OPERATOR, "="),
                (TokenType::NUMBER, "1"),
                (TokenType::NEWLINE, ""),
                (TokenType::DEDENT, ""),
                (TokenType::IDENTIFIER, "z"),
                (TokenType::OPERATOR, "="),
                (TokenType::NUMBER, "2"),
                (TokenType::NEWLINE, ""),
                (TokenType::END, ""),
            ],
        );
    }

    #[test]
    fn test_indent_dedent_balanced() {
        let programs = [
            "def f(x):\n    if x:\n        return 1\n    return 2\n",
            "while a:\n  b",
            "class A:\n    def m(self):\n        for i in y:\n            pass\n\n\nprint(1)\n",
        ];

        for program in programs {
            let tokens = tokens(program);
            let indents = tokens.iter().filter(|t| t.kind == TokenType::INDENT).count();
            let dedents = tokens.iter().filter(|t| t.kind == TokenType::DEDENT).count();

            assert!(indents > 0, "expected indentation in {:?}", program);
            assert_eq!(indents, dedents, "unbalanced layout in {:?}", program);
            assert_eq!(tokens.last().map(|t| t.kind), Some(TokenType::END));
        }
    }

    #[test]
    fn test_missing_trailing_newline_is_synthesised() {
        assert_token_sequence(
            "while a:\n  b",
            &[
                (TokenType::KEYWORD, "while"),
                (TokenType::IDENTIFIER, "a"),
                (TokenType::SYMBOL, ":"),
                (TokenType::NEWLINE, ""),
                (TokenType::INDENT, ""),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::NEWLINE, ""),
                (TokenType::DEDENT, ""),
                (TokenType::END, ""),
            ],
        );
    }

    #[test]
    fn test_dedent_to_unknown_column_is_error() {
        let results: Vec<_> = Lexer::new("if x:\n    y = 1\n  z = 2\n").collect();

        let error = results
            .iter()
            .find_map(|r| r.as_ref().err())
            .expect("expected a lexical error");

        match error {
            TypthonError::Lex { line, message } => {
                assert_eq!(*line, 3);
                assert!(message.contains("does not match"), "got: {}", message);
            }
            other => panic!("expected Lex error, got {:?}", other),
        }
    }

    #[test]
    fn test_multi_character_operators() {
        assert_token_sequence(
            "a **= b // c -> d != e <= f",
            &[
                (TokenType::IDENTIFIER, "a"),
                (TokenType::OPERATOR, "**="),
                (TokenType::IDENTIFIER, "b"),
                (TokenType::OPERATOR, "//"),
                (TokenType::IDENTIFIER, "c"),
                (TokenType::OPERATOR, "->"),
                (TokenType::IDENTIFIER, "d"),
                (TokenType::OPERATOR, "!="),
                (TokenType::IDENTIFIER, "e"),
                (TokenType::OPERATOR, "<="),
                (TokenType::IDENTIFIER, "f"),
                (TokenType::NEWLINE, ""),
                (TokenType::END, ""),
            ],
        );
    }

    #[test]
    fn test_keywords_need_exact_match() {
        assert_token_sequence(
            "def define None none",
            &[
                (TokenType::KEYWORD, "def"),
                (TokenType::IDENTIFIER, "define"),
                (TokenType::KEYWORD, "None"),
                (TokenType::IDENTIFIER, "none"),
                (TokenType::NEWLINE, ""),
                (TokenType::END, ""),
            ],
        );
    }

    #[test]
    fn test_string_escapes_and_triple_quotes() {
        let tokens = tokens("s = 'a\\tb\\n'\nt = \"\"\"one\ntwo\"\"\"\n");
        let strings: Vec<&str> = tokens
            .iter()
            .filter(|t| t.kind == TokenType::STRING)
            .map(|t| t.text.as_str())
            .collect();

        assert_eq!(strings, vec!["a\tb\n", "one\ntwo"]);
    }

    #[test]
    fn test_brackets_join_lines() {
        assert_token_sequence(
            "x = [1,\n     2]\n",
            &[
                (TokenType::IDENTIFIER, "x"),
                (TokenType::OPERATOR, "="),
                (TokenType::SYMBOL, "["),
                (TokenType::NUMBER, "1"),
                (TokenType::SYMBOL, ","),
                (TokenType::NUMBER, "2"),
                (TokenType::SYMBOL, "]"),
                (TokenType::NEWLINE, ""),
                (TokenType::END, ""),
            ],
        );
    }

    #[test]
    fn test_blank_and_comment_lines_emit_nothing() {
        assert_token_sequence(
            "x = 1  # trailing\n\n# only a comment\n    \ny = 2.5\n",
            &[
                (TokenType::IDENTIFIER, "x"),
                (TokenType::OPERATOR, "="),
                (TokenType::NUMBER, "1"),
                (TokenType::NEWLINE, ""),
                (TokenType::IDENTIFIER, "y"),
                (TokenType::OPERATOR, "="),
                (TokenType::NUMBER, "2.5"),
                (TokenType::NEWLINE, ""),
                (TokenType::END, ""),
            ],
        );
    }

    #[test]
    fn test_end_repeats_and_iterator_is_fused() {
        let mut lexer = Lexer::new("x");

        while lexer.next_token().unwrap().kind != TokenType::END {}

        assert_eq!(lexer.next_token().unwrap().kind, TokenType::END);
        assert_eq!(lexer.next_token().unwrap().kind, TokenType::END);

        let mut iter = Lexer::new("x");
        assert_eq!(iter.by_ref().count(), 3);
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let error = Lexer::new("x = 'abc\n")
            .find_map(|r| r.err())
            .expect("expected a lexical error");

        assert!(error.to_string().contains("Unterminated string."));
    }

    #[test]
    fn test_line_numbers() {
        let tokens = tokens("a\n\nb\n");
        let lines: Vec<usize> = tokens
            .iter()
            .filter(|t| t.kind == TokenType::IDENTIFIER)
            .map(|t| t.line)
            .collect();

        assert_eq!(lines, vec![1, 3]);
    }
}
