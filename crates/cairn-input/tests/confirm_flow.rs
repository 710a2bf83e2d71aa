//! Confirmation prompts driven the way commands drive them.

use cairn_input::{Confirm, Confirmation, InputError, MockTerminal, TerminalIO};

fn overwrite(term: &dyn TerminalIO) -> Result<Confirmation, InputError> {
    Confirm::new("export target 'out.js' already exists, overwrite?")
        .default(false)
        .ask(term)
}

#[test]
fn same_answer_gives_same_outcome() {
    for _ in 0..2 {
        let term = MockTerminal::with_response("n");
        assert_eq!(overwrite(&term).unwrap(), Confirmation::Answered(false));
    }
}

#[test]
fn prompt_text_is_shown_once_per_attempt() {
    let term = MockTerminal::with_responses(["what", "yes"]);
    assert!(overwrite(&term).unwrap().value());
    assert_eq!(
        term.written()
            .matches("export target 'out.js' already exists, overwrite? [y/N] ")
            .count(),
        2
    );
}

#[test]
fn closed_input_never_blocks() {
    let term = MockTerminal::eof();
    assert!(matches!(overwrite(&term), Err(InputError::PromptCancelled)));

    let term = MockTerminal::non_interactive();
    assert_eq!(overwrite(&term).unwrap(), Confirmation::Defaulted(false));
}
