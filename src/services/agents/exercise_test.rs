use std::time::Duration;

use super::*;
use crate::services::executor::ExecutorConfig;

fn shell_executor(timeout: Duration) -> CodeExecutor {
    CodeExecutor::new(ExecutorConfig {
        interpreter: "sh".into(),
        interpreter_args: vec![],
        timeout,
        max_output_bytes: 4096,
    })
}

fn missing_executor() -> CodeExecutor {
    CodeExecutor::new(ExecutorConfig { interpreter: "/nonexistent/python".into(), ..ExecutorConfig::default() })
}

// =============================================================================
// catalog
// =============================================================================

#[test]
fn catalog_ids_are_unique_and_findable() {
    for exercise in EXERCISES {
        assert_eq!(find(exercise.id).map(|e| e.id), Some(exercise.id));
    }
    assert_eq!(find(" Print-Statement ").map(|e| e.id), Some("print-statement"));
    assert!(find("nope").is_none());
    assert_eq!(categories(), vec!["basics", "conditionals", "loops", "functions"]);
}

#[test]
fn reference_solutions_pass_the_heuristic_syntax_check() {
    for exercise in EXERCISES {
        assert_eq!(pysource::check_syntax(exercise.solution), Ok(()), "{}", exercise.id);
    }
}

#[test]
fn solution_and_stdin_are_not_serialized() {
    let json = serde_json::to_value(find("even-or-odd").unwrap()).unwrap();
    assert!(json.get("solution").is_none());
    assert!(json.get("stdin").is_none());
    assert_eq!(json["expected_output"], "odd");
    assert_eq!(json["difficulty"], "beginner");
}

#[test]
fn detection_reads_plain_words() {
    assert_eq!(detect_difficulty("give me something easy"), Some(Difficulty::Beginner));
    assert_eq!(detect_difficulty("a HARD one"), Some(Difficulty::Advanced));
    assert_eq!(detect_difficulty("anything"), None);

    assert_eq!(detect_category("practice with if statements"), Some("conditionals"));
    assert_eq!(detect_category("a loop exercise"), Some("loops"));
    assert_eq!(detect_category("something different"), None, "'if' inside a word does not count");
}

#[test]
fn pick_honours_filters_and_falls_back() {
    for _ in 0..10 {
        assert_eq!(pick(None, Some("loops")).id, "sum-of-numbers");
    }
    // No advanced exercises exist, so any exercise may come back.
    let any = pick(Some(Difficulty::Advanced), None);
    assert!(EXERCISES.iter().any(|e| e.id == any.id));
}

// =============================================================================
// grading
// =============================================================================

#[test]
fn output_matching_trims_and_allows_prompts() {
    assert!(output_matches("55\n", "55"));
    assert!(output_matches("Enter a number: odd\n", "odd"));
    assert!(!output_matches("odd man out\n", "odd"));
    assert!(!output_matches("155", "55"));
}

#[test]
fn heuristic_scores_structure() {
    let evaluation = heuristic("def f(n):\n    for i in range(n):\n        if i:\n            print(i)\n");
    assert!((evaluation.score - 100.0).abs() < f64::EPSILON);
    assert!(evaluation.is_correct);
    assert!(evaluation.feedback.contains("🎉 Well done!"));

    let evaluation = heuristic("x = 1\nprint(x)\n");
    assert!((evaluation.score - 50.0).abs() < f64::EPSILON);
    assert!(!evaluation.is_correct);
    assert!(evaluation.feedback.contains("Keep working on it!"));
    assert_eq!(evaluation.method, EvaluationMethod::Heuristic);
}

#[test]
fn heuristic_rejects_bad_syntax() {
    let evaluation = heuristic("print('hi'");
    assert!(!evaluation.is_correct);
    assert!(evaluation.score.abs() < f64::EPSILON);
    assert!(evaluation.feedback.starts_with("✗ Syntax error"));
}

#[tokio::test]
async fn unknown_exercise_is_an_error() {
    let err = evaluate(&missing_executor(), "missing", "print(1)").await.unwrap_err();
    assert_eq!(err.error_code(), "E_EXERCISE_NOT_FOUND");
}

#[tokio::test]
async fn exercise_without_expected_output_uses_heuristic() {
    let evaluation = evaluate(&missing_executor(), "variable-assignment", "name = 'Ada'\nprint(name)").await.unwrap();
    assert_eq!(evaluation.method, EvaluationMethod::Heuristic);
    assert_eq!(evaluation.exercise_id.as_deref(), Some("variable-assignment"));
}

#[tokio::test]
async fn unavailable_executor_falls_back_to_heuristic() {
    let evaluation = evaluate(&missing_executor(), "print-statement", "print('Hello, World!')").await.unwrap();
    assert_eq!(evaluation.method, EvaluationMethod::Heuristic);
    assert!(evaluation.feedback.contains("Could not run your code"));
}

#[cfg(unix)]
#[tokio::test]
async fn matching_output_is_correct() {
    let executor = shell_executor(Duration::from_secs(5));
    let evaluation = evaluate(&executor, "print-statement", "echo 'Hello, World!'").await.unwrap();
    assert_eq!(evaluation.method, EvaluationMethod::Execution);
    assert!(evaluation.is_correct);
    assert!((evaluation.score - 100.0).abs() < f64::EPSILON);
    assert_eq!(evaluation.output.as_deref(), Some("Hello, World!\n"));
}

#[cfg(unix)]
#[tokio::test]
async fn stdin_is_fed_to_the_program() {
    let executor = shell_executor(Duration::from_secs(5));
    let evaluation = evaluate(&executor, "even-or-odd", "read n; echo \"got $n odd\"").await.unwrap();
    assert!(evaluation.is_correct, "{}", evaluation.feedback);
}

#[cfg(unix)]
#[tokio::test]
async fn wrong_output_is_capped() {
    let executor = shell_executor(Duration::from_secs(5));
    let evaluation = evaluate(&executor, "sum-of-numbers", "echo 54").await.unwrap();
    assert!(!evaluation.is_correct);
    assert!(evaluation.score <= MISMATCH_SCORE_CAP);
    assert!(evaluation.feedback.contains("Expected output '55' but got '54'"));
}

#[cfg(unix)]
#[tokio::test]
async fn runtime_errors_are_reported() {
    let executor = shell_executor(Duration::from_secs(5));
    let evaluation = evaluate(&executor, "sum-of-numbers", "echo \"NameError: name 'totl' is not defined\" >&2; exit 1")
        .await
        .unwrap();
    assert!(!evaluation.is_correct);
    assert!(evaluation.score.abs() < f64::EPSILON);
    assert!(evaluation.feedback.contains("NameError: name 'totl' is not defined"));
}

#[cfg(unix)]
#[tokio::test]
async fn timeouts_score_zero() {
    let executor = shell_executor(Duration::from_millis(200));
    let evaluation = evaluate(&executor, "sum-of-numbers", "sleep 5").await.unwrap();
    assert!(!evaluation.is_correct);
    assert!(evaluation.feedback.contains("did not finish in time"));
}

// =============================================================================
// agent
// =============================================================================

#[tokio::test]
async fn request_hands_out_an_exercise() {
    let reply = respond(&missing_executor(), "give me a function exercise", None).await;
    assert_eq!(reply.message, "Here's an exercise for you: Simple Function");
    assert!(matches!(reply.payload, ReplyPayload::Exercise { exercise } if exercise.id == "simple-function"));
}

#[tokio::test]
async fn submission_without_exercise_uses_heuristic() {
    let input = "here is my solution\n```python\nfor i in range(3):\n    print(i)\n```";
    let reply = respond(&missing_executor(), input, None).await;
    let ReplyPayload::Evaluation(evaluation) = reply.payload else {
        panic!("expected evaluation payload");
    };
    assert_eq!(evaluation.method, EvaluationMethod::Heuristic);
    assert!((evaluation.score - 75.0).abs() < f64::EPSILON);
    assert_eq!(reply.message, evaluation.feedback);
}

#[cfg(unix)]
#[tokio::test]
async fn submission_with_exercise_runs_it() {
    let executor = shell_executor(Duration::from_secs(5));
    let input = "my answer:\n```\necho 55\n```";
    let reply = respond(&executor, input, Some("sum-of-numbers")).await;
    let ReplyPayload::Evaluation(evaluation) = reply.payload else {
        panic!("expected evaluation payload");
    };
    assert!(evaluation.is_correct);
    assert_eq!(evaluation.exercise_id.as_deref(), Some("sum-of-numbers"));
}

#[tokio::test]
async fn single_line_fenced_submission_is_graded() {
    let input = "Here is my solution: ```print('Hello, World!')```";
    let reply = respond(&missing_executor(), input, Some("print-statement")).await;
    assert!(matches!(reply.payload, ReplyPayload::Evaluation(_)), "got {:?}", reply.message);
}
