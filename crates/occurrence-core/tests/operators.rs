use std::cell::RefCell;
use std::rc::Rc;

use occurrence_core::{
    BufferId, Host, Location, MemoryHost, Motion, Operator, OperatorConfig, OperatorMode,
    OperatorOutcome, PatternKind, RunOptions, Session, Span, Step, TransformOutput, WindowId,
};
use pretty_assertions::assert_eq;

fn span(l0: usize, c0: usize, l1: usize, c1: usize) -> Span {
    Span::new(Location::new(l0, c0), Location::new(l1, c1)).unwrap()
}

/// A buffer with every whole-word `foo` marked.
fn marked(text: &str) -> (MemoryHost, Session, BufferId, WindowId) {
    let mut host = MemoryHost::new();
    let buffer = host.add_buffer(text);
    let window = host.open_window(buffer);
    let mut session = Session::default();
    session
        .add_pattern(&mut host, buffer, "foo", PatternKind::Word)
        .unwrap();
    session
        .get_mut(buffer)
        .unwrap()
        .mark_all(&mut host, None)
        .unwrap();
    (host, session, buffer, window)
}

fn replace_with(text: &'static str) -> Operator {
    Operator::transform(move |_, _| TransformOutput::from(text).into())
}

#[test]
fn test_matches_are_found_in_buffer_order() {
    let (host, session, buffer, _) = marked("foo bar\nbaz foo");
    let occurrence = session.get(buffer).unwrap();
    let found: Vec<Span> = occurrence
        .matches(&host, None, None, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(found, vec![span(0, 0, 0, 3), span(1, 4, 1, 7)]);
    assert_eq!(occurrence.mark_count(), 2);
}

#[test]
fn test_inner_transform_replaces_every_mark() {
    let (mut host, mut session, buffer, window) = marked("foo bar\nbaz foo");
    let outcome = session
        .run_operator_blocking(
            &mut host,
            window,
            replace_with("qux"),
            RunOptions::default().inner(true),
        )
        .unwrap();

    assert_eq!(host.lines(buffer).unwrap(), vec!["qux bar", "baz qux"]);
    assert_eq!(
        outcome,
        OperatorOutcome {
            collected: 2,
            applied: 2,
            unmarked: 2,
            undo_recorded: true,
            disposed: true,
            ..OperatorOutcome::default()
        }
    );
    assert_eq!(host.register("\""), None);
    assert!(session.get(buffer).is_none());
}

#[test]
fn test_outer_transform_takes_adjoining_whitespace() {
    let (mut host, mut session, buffer, window) = marked("foo bar foo");
    session
        .run_operator_blocking(&mut host, window, replace_with(""), RunOptions::default())
        .unwrap();
    assert_eq!(host.buffer_text(buffer).unwrap(), "bar");
}

#[test]
fn test_default_options_replace_around_whitespace() {
    let (mut host, mut session, buffer, window) = marked("foo bar\nbaz foo");
    session
        .run_operator_blocking(&mut host, window, replace_with("qux"), RunOptions::default())
        .unwrap();
    assert_eq!(host.lines(buffer).unwrap(), vec!["quxbar", "bazqux"]);
}

#[test]
fn test_neighbours_never_share_around_whitespace() {
    let (mut host, mut session, buffer, window) = marked("a foo foo");
    let op = OperatorConfig::new(replace_with("X")).uses_register(true);
    let outcome = session
        .run_operator_blocking(&mut host, window, op.into(), RunOptions::default())
        .unwrap();

    assert_eq!(outcome.applied, 2);
    assert_eq!(host.buffer_text(buffer).unwrap(), "a XX");
    assert_eq!(host.register("\"").unwrap().text, "foo \nfoo");
}

#[test]
fn test_multiline_replacement_keeps_earlier_marks_valid() {
    let (mut host, mut session, buffer, window) = marked("foo foo\nfoo");
    let split = Operator::transform(|item, _| {
        TransformOutput::Lines(vec![format!("<{}", item.index), ">".to_string()]).into()
    });
    session
        .run_operator_blocking(&mut host, window, split, RunOptions::default().inner(true))
        .unwrap();
    assert_eq!(
        host.lines(buffer).unwrap(),
        vec!["<0", "> <1", ">", "<2", ">"]
    );
}

#[test]
fn test_empty_line_list_is_rejected() {
    let (mut host, mut session, _, window) = marked("foo");
    let bad = Operator::transform(|_, _| TransformOutput::Lines(Vec::new()).into());
    let err = session
        .run_operator_blocking(&mut host, window, bad, RunOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        occurrence_core::OccurrenceError::InvalidTransformResult { index: 0, .. }
    ));
}

#[test]
fn test_motion_limits_the_marks_processed() {
    let (mut host, mut session, buffer, window) = marked("foo foo\nfoo foo");
    let outcome = session
        .run_operator_blocking(
            &mut host,
            window,
            replace_with("x"),
            RunOptions::over(Motion::Span(span(1, 0, 1, 7))).inner(true),
        )
        .unwrap();

    assert_eq!(outcome.collected, 2);
    assert_eq!(host.lines(buffer).unwrap(), vec!["foo foo", "x x"]);
    assert_eq!(session.get(buffer).unwrap().mark_count(), 2);
}

#[test]
fn test_selection_motion_in_visual_mode() {
    let (mut host, mut session, buffer, window) = marked("foo foo\nfoo foo");
    host.set_selection(window, span(0, 4, 1, 3)).unwrap();
    session
        .run_operator_blocking(
            &mut host,
            window,
            replace_with("x"),
            RunOptions::over(Motion::Selection)
                .mode(OperatorMode::Visual)
                .inner(true),
        )
        .unwrap();
    assert_eq!(host.lines(buffer).unwrap(), vec!["foo x", "x foo"]);
}

#[test]
fn test_pending_mode_honors_the_typed_count() {
    let (mut host, mut session, buffer, window) = marked("foo foo foo");
    host.set_count(2);
    let outcome = session
        .run_operator_blocking(
            &mut host,
            window,
            replace_with("x"),
            RunOptions::default().mode(OperatorMode::Pending).inner(true),
        )
        .unwrap();
    assert_eq!(outcome.collected, 2);
    assert_eq!(host.buffer_text(buffer).unwrap(), "x x foo");
}

#[test]
fn test_unresolved_motion_does_nothing() {
    let (mut host, mut session, buffer, window) = marked("foo");
    let outcome = session
        .run_operator_blocking(
            &mut host,
            window,
            replace_with("x"),
            RunOptions::over(Motion::from_cursor(|_| None)),
        )
        .unwrap();
    assert_eq!(outcome, OperatorOutcome::default());
    assert_eq!(host.buffer_text(buffer).unwrap(), "foo");
}

#[test]
fn test_unchanged_and_handled_items_are_unmarked_without_edits() {
    let (mut host, mut session, buffer, window) = marked("foo foo foo");
    let op = Operator::transform(|item, _| match item.index {
        0 => TransformOutput::Unchanged.into(),
        1 => true.into(),
        _ => TransformOutput::from("x").into(),
    });
    let outcome = session
        .run_operator_blocking(&mut host, window, op, RunOptions::default().inner(true))
        .unwrap();

    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.unmarked, 3);
    assert_eq!(host.buffer_text(buffer).unwrap(), "foo foo x");
}

#[test]
fn test_register_starts_at_first_handled_item() {
    let (mut host, mut session, _, window) = marked("foo foo foo");
    let op = OperatorConfig::new(Operator::transform(|item, _| {
        if item.index == 0 {
            TransformOutput::Unchanged.into()
        } else {
            TransformOutput::from("x").into()
        }
    }))
    .uses_register(true);
    let outcome = session
        .run_operator_blocking(
            &mut host,
            window,
            op.into(),
            RunOptions::default().register("a").inner(true),
        )
        .unwrap();

    assert!(outcome.register_written);
    assert_eq!(host.register("a").unwrap().text, "foo\nfoo");
    assert_eq!(host.register("\""), None);
}

#[test]
fn test_cancellation_leaves_the_buffer_untouched() {
    let text = "foo bar foo\nfoo";
    let (mut host, mut session, buffer, window) = marked(text);
    let op = OperatorConfig::new(Operator::transform(|item, _| {
        if item.index == 1 {
            Step::Cancelled
        } else {
            TransformOutput::from("x").into()
        }
    }))
    .uses_register(true);
    let outcome = session
        .run_operator_blocking(&mut host, window, op.into(), RunOptions::default())
        .unwrap();

    assert!(outcome.cancelled);
    assert_eq!(outcome.applied, 0);
    assert!(!outcome.register_written);
    assert!(!outcome.undo_recorded);
    assert_eq!(host.buffer_text(buffer).unwrap(), text);
    assert_eq!(host.undo_seq(buffer).unwrap(), 0);
}

#[test]
fn test_before_hook_veto_skips_everything() {
    let (mut host, mut session, buffer, window) = marked("foo foo");
    let seen = Rc::new(RefCell::new(0));
    let counter = Rc::clone(&seen);
    let op = OperatorConfig::new(replace_with("x")).before(move |items, _| {
        *counter.borrow_mut() = items.len();
        Step::Cancelled
    });
    let outcome = session
        .run_operator_blocking(&mut host, window, op.into(), RunOptions::default())
        .unwrap();

    assert_eq!(*seen.borrow(), 2);
    assert!(outcome.vetoed);
    assert_eq!(outcome.applied, 0);
    assert_eq!(host.buffer_text(buffer).unwrap(), "foo foo");
    assert_eq!(session.get(buffer).unwrap().mark_count(), 2);
}

#[test]
fn test_after_hook_sees_applied_spans() {
    let (mut host, mut session, _, window) = marked("foo bar\nbaz foo");
    let applied = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&applied);
    let op = OperatorConfig::new(replace_with("x")).after(move |spans, context| {
        assert_eq!(context.marks.len(), 2);
        sink.borrow_mut()
            .extend(spans.iter().map(|(_, span)| *span));
    });
    session
        .run_operator_blocking(
            &mut host,
            window,
            op.into(),
            RunOptions::default().inner(true),
        )
        .unwrap();

    assert_eq!(
        *applied.borrow(),
        vec![span(1, 4, 1, 7), span(0, 0, 0, 3)]
    );
}

#[test]
fn test_replay_deletes_into_register_and_restores_repeat_handler() {
    let (mut host, mut session, buffer, window) = marked("foo bar foo");
    host.set_repeat_handler(Some("user".to_string()));
    let op = OperatorConfig::new(Operator::replay("d")).uses_register(true);
    let outcome = session
        .run_operator_blocking(&mut host, window, op.into(), RunOptions::default())
        .unwrap();

    assert_eq!(outcome.applied, 2);
    assert_eq!(host.buffer_text(buffer).unwrap(), "bar");
    assert_eq!(host.register("\"").unwrap().text, "foo \n foo");
    assert_eq!(host.repeat_handler().as_deref(), Some("user"));

    // Both deletions form one undo step.
    assert_eq!(host.undo_seq(buffer).unwrap(), 1);
    host.undo(buffer).unwrap();
    assert_eq!(host.buffer_text(buffer).unwrap(), "foo bar foo");
}

#[test]
fn test_replay_of_unknown_keys_reports_host_error() {
    let (mut host, mut session, _, window) = marked("foo");
    let err = session
        .run_operator_blocking(
            &mut host,
            window,
            Operator::replay("zz"),
            RunOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, occurrence_core::OccurrenceError::Host(_)));
}

#[test]
fn test_operator_without_occurrence_is_a_no_op() {
    let mut host = MemoryHost::new();
    let buffer = host.add_buffer("foo");
    let window = host.open_window(buffer);
    let mut session = Session::default();
    let outcome = session
        .run_operator_blocking(&mut host, window, replace_with("x"), RunOptions::default())
        .unwrap();
    assert_eq!(outcome, OperatorOutcome::default());
    assert_eq!(host.buffer_text(buffer).unwrap(), "foo");
}
