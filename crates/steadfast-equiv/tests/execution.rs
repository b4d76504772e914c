use std::collections::HashMap;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use steadfast_equiv::{
    EquivalenceChecker, EquivalenceConfig, ExecutionError, ExecutionRequest, Implementation,
    ProcessSandbox, Sandbox,
};

type Behavior = fn(&Value) -> Result<Value, ExecutionError>;

/// Deterministic in-process stand-in for a sandbox, keyed by source text.
struct ScriptedSandbox {
    behaviors: HashMap<&'static str, Behavior>,
    calls: AtomicUsize,
}

impl ScriptedSandbox {
    fn new(entries: &[(&'static str, Behavior)]) -> Self {
        Self {
            behaviors: entries.iter().copied().collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl Sandbox for ScriptedSandbox {
    fn execute(&self, request: &ExecutionRequest) -> Result<Value, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let behavior = self
            .behaviors
            .get(request.source.as_str())
            .ok_or_else(|| ExecutionError::MalformedOutput("unknown source".into()))?;
        behavior(&request.input)
    }
}

const AVG_BUILTIN: &str = "def average(nums):\n    return sum(nums) / len(nums)\n";
const AVG_LOOP: &str = "\
def average(nums):
    total = 0.0
    for n in nums:
        total += n
    return total / len(nums)
";
const ADD: &str = "def combine(a, b):\n    return a + b\n";
const SUB: &str = "def combine(a, b):\n    return a - b\n";
const HANG: &str = "def spin(x):\n    while True:\n        pass\n";
const CRASH: &str = "def boom(x):\n    raise ValueError(x)\n";

fn numbers(input: &Value) -> Vec<f64> {
    input["nums"]
        .as_array()
        .map(|xs| xs.iter().filter_map(Value::as_f64).collect())
        .unwrap_or_default()
}

fn avg_builtin(input: &Value) -> Result<Value, ExecutionError> {
    let xs = numbers(input);
    Ok(json!(xs.iter().sum::<f64>() / xs.len() as f64))
}

fn avg_loop(input: &Value) -> Result<Value, ExecutionError> {
    let xs = numbers(input);
    let mut total = 0.0;
    for x in xs.iter().rev() {
        total += x;
    }
    Ok(json!(total / xs.len() as f64))
}

fn add(input: &Value) -> Result<Value, ExecutionError> {
    Ok(json!(input["a"].as_i64().unwrap_or(0) + input["b"].as_i64().unwrap_or(0)))
}

fn sub(input: &Value) -> Result<Value, ExecutionError> {
    Ok(json!(input["a"].as_i64().unwrap_or(0) - input["b"].as_i64().unwrap_or(0)))
}

fn hang(_: &Value) -> Result<Value, ExecutionError> {
    Err(ExecutionError::Timeout {
        after: Duration::from_millis(100),
    })
}

fn scripted_checker() -> (EquivalenceChecker, Arc<ScriptedSandbox>) {
    let sandbox = Arc::new(ScriptedSandbox::new(&[
        (AVG_BUILTIN, avg_builtin as Behavior),
        (AVG_LOOP, avg_loop),
        (ADD, add),
        (SUB, sub),
        (HANG, hang),
    ]));
    let checker = EquivalenceChecker::new(EquivalenceConfig::default())
        .expect("valid config")
        .with_sandbox(sandbox.clone());
    (checker, sandbox)
}

fn average_inputs() -> Vec<Value> {
    vec![json!({"nums": [1, 2, 3]}), json!({"nums": [10.5, 20.3, 15.7]})]
}

#[test]
fn summation_strategy_does_not_matter() {
    let (checker, sandbox) = scripted_checker();
    assert!(checker.code_equivalent_by_execution(
        &AVG_BUILTIN.into(),
        &AVG_LOOP.into(),
        &average_inputs(),
        Duration::from_secs(5),
    ));
    assert_eq!(sandbox.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn different_arithmetic_is_detected() {
    let (checker, _) = scripted_checker();
    assert!(!checker.code_equivalent_by_execution(
        &ADD.into(),
        &SUB.into(),
        &[json!({"a": 1, "b": 2})],
        Duration::from_secs(5),
    ));
}

#[test]
fn first_difference_short_circuits() {
    let (checker, sandbox) = scripted_checker();
    let inputs = vec![json!({"a": 1, "b": 0}), json!({"a": 1, "b": 2}), json!({"a": 5, "b": 5})];
    assert!(!checker.code_equivalent_by_execution(
        &ADD.into(),
        &SUB.into(),
        &inputs,
        Duration::from_secs(5),
    ));
    // a + 0 == a - 0, so the second input is the first to differ.
    assert_eq!(sandbox.calls.load(Ordering::SeqCst), 4);
}

#[test]
fn identical_implementations_need_evidence() {
    let (checker, sandbox) = scripted_checker();
    assert!(!checker.code_equivalent_by_execution(
        &ADD.into(),
        &ADD.into(),
        &[],
        Duration::from_secs(5),
    ));
    assert_eq!(sandbox.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn failure_on_either_side_is_non_equivalent() {
    let (checker, _) = scripted_checker();
    let inputs = [json!({"nums": [1]})];
    assert!(!checker.code_equivalent_by_execution(
        &AVG_BUILTIN.into(),
        &HANG.into(),
        &inputs,
        Duration::from_secs(5),
    ));
    // Both sides failing the same way still is not evidence of equivalence.
    assert!(!checker.code_equivalent_by_execution(
        &HANG.into(),
        &HANG.into(),
        &inputs,
        Duration::from_secs(5),
    ));
}

#[test]
fn explicit_entry_points_are_passed_through() {
    let (checker, _) = scripted_checker();
    let a = Implementation::new(ADD).with_entry_point("combine");
    assert!(checker.code_equivalent_by_execution(
        &a,
        &ADD.into(),
        &[json!({"a": 2, "b": 3})],
        Duration::from_secs(5),
    ));
}

// ---------------------------------------------------------------
// Real interpreter: skipped when python3 is not installed
// ---------------------------------------------------------------

fn python_available() -> bool {
    Command::new("python3")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

fn python_checker() -> Option<EquivalenceChecker> {
    if !python_available() {
        eprintln!("python3 not found; skipping");
        return None;
    }
    Some(EquivalenceChecker::new(EquivalenceConfig::default()).expect("valid config"))
}

#[test]
fn python_averages_agree_within_tolerance() {
    let Some(checker) = python_checker() else {
        return;
    };
    assert!(checker.code_equivalent_by_execution(
        &AVG_BUILTIN.into(),
        &AVG_LOOP.into(),
        &average_inputs(),
        Duration::from_secs(10),
    ));
}

#[test]
fn python_add_and_sub_differ() {
    let Some(checker) = python_checker() else {
        return;
    };
    assert!(!checker.code_equivalent_by_execution(
        &ADD.into(),
        &SUB.into(),
        &[json!({"a": 1, "b": 2})],
        Duration::from_secs(10),
    ));
}

#[test]
fn python_timeout_kills_the_child() {
    if !python_available() {
        return;
    }
    let sandbox = ProcessSandbox::default();
    let started = Instant::now();
    let result = sandbox.execute(&ExecutionRequest {
        source: HANG.into(),
        function_name: "spin".into(),
        input: json!(1),
        timeout: Duration::from_millis(500),
    });
    assert!(matches!(result, Err(ExecutionError::Timeout { .. })), "{result:?}");
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn python_exception_is_non_zero_exit() {
    if !python_available() {
        return;
    }
    let result = ProcessSandbox::default().execute(&ExecutionRequest {
        source: CRASH.into(),
        function_name: "boom".into(),
        input: json!(3),
        timeout: Duration::from_secs(10),
    });
    match result {
        Err(ExecutionError::NonZeroExit { stderr, .. }) => {
            assert!(stderr.contains("ValueError"), "{stderr}");
        }
        other => panic!("expected non-zero exit, got {other:?}"),
    }
}

#[test]
fn python_prints_do_not_corrupt_the_result() {
    if !python_available() {
        return;
    }
    let source = "def chatty(x):\n    print('working on', x)\n    return {'double': x * 2, 'tags': (1, 2)}\n";
    let value = ProcessSandbox::default()
        .execute(&ExecutionRequest {
            source: source.into(),
            function_name: "chatty".into(),
            input: json!(21),
            timeout: Duration::from_secs(10),
        })
        .expect("execution succeeds");
    assert_eq!(value, json!({"double": 42, "tags": [1, 2]}));
}
