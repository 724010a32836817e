// tests/property_parse.rs

use proptest::prelude::*;

use fqs_dispatch::types::parse_command_text;

// Command words are drawn without whitespace so the expected split is
// unambiguous.
fn word() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_-]{0,12}"
}

proptest! {
    #[test]
    fn whitespace_only_input_is_empty(ws in "[ \t\r\n]{0,16}") {
        prop_assert_eq!(parse_command_text(&ws), None);
    }

    #[test]
    fn command_is_first_word_lowercased(
        lead in "[ \t]{0,4}",
        command in word(),
        args in proptest::collection::vec(word(), 0..5),
        trail in "[ \t]{0,4}",
    ) {
        let text = format!("{lead}{command} {}{trail}", args.join(" "));
        let (parsed_command, parsed_args) = parse_command_text(&text).unwrap();

        prop_assert_eq!(parsed_command, command.to_lowercase());
        prop_assert_eq!(parsed_args, args.join(" "));
    }

    #[test]
    fn args_keep_their_spelling(command in word(), arg in "[A-Z]{1,8}") {
        let text = format!("{command}   {arg}");
        let (_, parsed_args) = parse_command_text(&text).unwrap();
        prop_assert_eq!(parsed_args, arg);
    }
}
