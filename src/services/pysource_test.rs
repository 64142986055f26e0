use super::*;

// =============================================================================
// extraction
// =============================================================================

#[test]
fn extract_code_prefers_fenced_block() {
    let text = "Can you check this?\n```python\nx = 1\nprint(x)\n```\nthanks";
    assert_eq!(extract_code(text).as_deref(), Some("x = 1\nprint(x)"));
}

#[test]
fn extract_code_accepts_untagged_fence() {
    let text = "```\nfor i in range(3):\n    print(i)\n```";
    assert_eq!(extract_code(text).as_deref(), Some("for i in range(3):\n    print(i)"));
}

#[test]
fn extract_code_accepts_single_line_fence() {
    let text = "Here is my solution: ```print('Hello, World!')```";
    assert_eq!(extract_code(text).as_deref(), Some("print('Hello, World!')"));
    assert_eq!(extract_code("```python print(1)```").as_deref(), Some("print(1)"));
}

#[test]
fn extract_code_keeps_identifiers_that_start_like_a_tag() {
    assert_eq!(extract_code("```pyramid = 3```").as_deref(), Some("pyramid = 3"));
}

#[test]
fn extract_code_drops_leading_prose() {
    let text = "Here is my attempt\ndef add(a, b):\n    return a + b";
    assert_eq!(extract_code(text).as_deref(), Some("def add(a, b):\n    return a + b"));
}

#[test]
fn extract_code_ignores_plain_questions() {
    assert_eq!(extract_code("What is a variable?"), None);
    assert_eq!(extract_code("Tell me about loops\nand lists please"), None);
}

#[test]
fn extract_error_keeps_whole_traceback() {
    let text = "I got this:\nTraceback (most recent call last):\n  File \"main.py\", line 2, in <module>\nNameError: name 'x' is not defined";
    let err = extract_error(text).unwrap();
    assert!(err.starts_with("Traceback"));
    assert!(err.ends_with("is not defined"));
}

#[test]
fn extract_error_falls_back_to_error_line() {
    let text = "my code says\nTypeError: can only concatenate str (not \"int\") to str\nwhat do I do";
    assert_eq!(
        extract_error(text).as_deref(),
        Some("TypeError: can only concatenate str (not \"int\") to str")
    );
}

#[test]
fn parse_error_line_takes_last_error_and_strips_module() {
    let report = "Traceback (most recent call last):\n  File \"a.py\", line 4, in f\nbuiltins.ZeroDivisionError: division by zero";
    assert_eq!(
        parse_error_line(report),
        Some(("ZeroDivisionError".to_string(), "division by zero".to_string()))
    );
    assert_eq!(traceback_line(report), Some(4));
}

#[test]
fn traceback_line_uses_innermost_frame() {
    let report = "  File \"a.py\", line 9, in <module>\n  File \"a.py\", line 3, in f\nValueError: bad";
    assert_eq!(traceback_line(report), Some(3));
    assert_eq!(traceback_line("no frames here"), None);
}

// =============================================================================
// scanner
// =============================================================================

#[test]
fn logical_lines_join_brackets_and_blank_strings() {
    let code = "items = [\n    1,\n    2,\n]\nname = \"a # not a comment\"  # real comment\n\n";
    let lines = logical_lines(code).unwrap();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].number, 1);
    assert!(lines[0].text.starts_with("items = ["));
    assert_eq!(lines[1].number, 5);
    assert_eq!(lines[1].text, "name = \"\"");
}

#[test]
fn logical_lines_handle_triple_quotes_and_continuations() {
    let code = "doc = \"\"\"line one\nline (two\n\"\"\"\ntotal = 1 + \\\n    2\nprint(total)";
    let lines = logical_lines(code).unwrap();
    let numbers: Vec<usize> = lines.iter().map(|l| l.number).collect();
    assert_eq!(numbers, vec![1, 4, 6]);
}

#[test]
fn logical_lines_measure_indent() {
    let lines = logical_lines("if x:\n    y = 1\n\ty = 2").unwrap();
    assert_eq!(lines[1].indent, 4);
    assert_eq!(lines[2].indent, 8);
}

#[test]
fn escaped_quotes_stay_inside_strings() {
    assert!(check_syntax("s = 'it\\'s'\nprint(s)").is_ok());
    assert!(check_syntax("pattern = r\"\\d+\\\"\"\nprint(pattern)").is_ok());
}

// =============================================================================
// syntax check
// =============================================================================

#[test]
fn valid_program_passes() {
    let code = "\
def greet(name):
    if name:
        return f\"hi {name}\"
    else:
        return \"hi\"

class Box:
    pass

for i, v in enumerate([1, 2]):
    print(greet(str(v)))
";
    assert_eq!(check_syntax(code), Ok(()));
}

#[test]
fn unclosed_paren_reports_opening_position() {
    let issue = check_syntax("x = 1\nprint((x)\n").unwrap_err();
    assert_eq!(issue.line, 2);
    assert_eq!(issue.column, 6);
    assert_eq!(issue.message, "'(' was never closed");
}

#[test]
fn unmatched_and_mismatched_closers() {
    assert_eq!(check_syntax("x = 1)").unwrap_err().message, "unmatched ')'");
    assert_eq!(
        check_syntax("x = [1, 2)").unwrap_err().message,
        "closing parenthesis ')' does not match opening parenthesis '['"
    );
}

#[test]
fn unterminated_string_is_reported() {
    let issue = check_syntax("print('hello)\n").unwrap_err();
    assert_eq!(issue.message, "unterminated string literal");
    assert_eq!(issue.line, 1);
    assert_eq!(
        check_syntax("s = \"\"\"open").unwrap_err().message,
        "unterminated triple-quoted string literal"
    );
}

#[test]
fn missing_colon_is_reported() {
    let issue = check_syntax("for i in range(3)\n    print(i)").unwrap_err();
    assert_eq!(issue.line, 1);
    assert_eq!(issue.message, "expected ':'");
}

#[test]
fn lambda_and_slice_colons_do_not_count_as_header() {
    assert!(check_syntax("if f(lambda v: v):\n    pass").is_ok());
    assert!(check_syntax("if items[1:2]:\n    pass").is_ok());
    assert!(check_syntax("if (n := 3) > 2:\n    pass").is_ok());
}

#[test]
fn missing_body_is_reported() {
    let issue = check_syntax("def f():\nprint(1)").unwrap_err();
    assert_eq!(issue.line, 2);
    assert_eq!(issue.message, "expected an indented block after function definition on line 1");

    let issue = check_syntax("x = 1\nif x:").unwrap_err();
    assert_eq!(issue.message, "expected an indented block after 'if' statement on line 2");
}

#[test]
fn one_line_bodies_are_accepted() {
    assert!(check_syntax("if x: y = 1\nprint(y)").is_ok());
}

#[test]
fn stray_indent_is_reported() {
    let issue = check_syntax("x = 1\n    y = 2").unwrap_err();
    assert_eq!(issue.line, 2);
    assert_eq!(issue.message, "unexpected indent");
}

#[test]
fn inconsistent_dedent_is_reported() {
    let issue = check_syntax("if x:\n        y = 1\n    z = 2").unwrap_err();
    assert_eq!(issue.line, 3);
    assert_eq!(issue.message, "unindent does not match any outer indentation level");
}

#[test]
fn python2_print_is_reported() {
    let issue = check_syntax("print \"hello\"").unwrap_err();
    assert_eq!(issue.message, "Missing parentheses in call to 'print'. Did you mean print(...)?");
    assert!(check_syntax("printer = 1\nprint(printer)").is_ok());
}

#[test]
fn assignment_in_condition_is_reported() {
    let issue = check_syntax("if x = 5:\n    pass").unwrap_err();
    assert!(issue.message.contains("Maybe you meant '==' or ':='"));
    assert!(check_syntax("if x <= 5 and f(a=1):\n    pass").is_ok());
}

#[test]
fn match_statement_opens_blocks() {
    let code = "x = 1\nmatch x:\n    case 1:\n        print('one')\n    case _:\n        print('other')\n";
    assert_eq!(check_syntax(code), Ok(()));
}

#[test]
fn match_and_case_remain_ordinary_names() {
    assert!(check_syntax("match = re.match('a', s)\ncase = match.group(0)\nprint(case)").is_ok());
    let issue = check_syntax("match x:\nprint(x)").unwrap_err();
    assert!(issue.message.starts_with("expected an indented block after 'match' statement"));
}

#[test]
fn comments_and_blank_lines_do_not_affect_blocks() {
    let code = "def f():\n    # comment\n\n    return 1\n";
    assert!(check_syntax(code).is_ok());
}

// =============================================================================
// names
// =============================================================================

#[test]
fn assignments_find_plain_and_tuple_targets() {
    let code = "a = 1\nb, c = 2, 3\nd += 1\nif a == 1:\n    e: int = 4\n";
    let names: Vec<String> = assignments(code).into_iter().map(|b| b.name).collect();
    assert_eq!(names, vec!["a", "b", "c", "e"]);
}

#[test]
fn definitions_are_collected_with_lines() {
    let code = "class Shape:\n    def area(self):\n        return 0\n\nasync def fetch():\n    pass\n";
    assert_eq!(class_defs(code), vec![Binding { line: 1, name: "Shape".into() }]);
    let fns: Vec<(usize, String)> = function_defs(code)
        .into_iter()
        .map(|b| (b.line, b.name))
        .collect();
    assert_eq!(fns, vec![(2, "area".to_string()), (5, "fetch".to_string())]);
}

#[test]
fn for_loops_report_targets() {
    let loops = for_loops("for k, v in d.items():\n    print(k)\n");
    assert_eq!(loops.len(), 1);
    assert_eq!(loops[0].1, vec!["k", "v"]);
}

#[test]
fn code_lines_fall_back_on_scan_errors() {
    let lines = code_lines("x = (1\ny = 2");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[1].text, "y = 2");
}

#[test]
fn stored_names_cover_augmented_assignment() {
    assert_eq!(stored_names("i += 1"), vec!["i"]);
    assert_eq!(stored_names("total //= 2"), vec!["total"]);
    assert_eq!(stored_names("a, b = b, a"), vec!["a", "b"]);
    assert!(stored_names("if i == 1:").is_empty());
    assert!(stored_names("print(i)").is_empty());
}

#[test]
fn strip_strings_and_comments_blanks_literals() {
    assert_eq!(strip_strings_and_comments("x = \"a # b\"  # note"), "x = \"\"");
    assert_eq!(strip_strings_and_comments("s = 'it\\'s' + y"), "s = '' + y");
    assert_eq!(strip_strings_and_comments("# only a comment"), "");
}
