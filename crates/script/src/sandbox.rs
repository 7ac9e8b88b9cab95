//! 脚本沙箱
//!
//! 每次执行都创建一个全新的 [`ScriptContext`]：独立的 Rhai 引擎与作用域，
//! 宿主能力通过 [`ScriptHost`] 显式注册进去，执行结束即销毁，不在执行之间复用。

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use hoststat_core::{config::ScriptingConfig, HostStatError, HostStatResult};
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, Scope, AST};
use tracing::debug;

/// 脚本入口函数名
pub const ENTRY_POINT: &str = "execute";

/// 注册进脚本的宿主能力
///
/// 脚本中可用：
/// - `persist(value)`：记录一个数值（浮点或整数）
/// - `getCounterValue()`：读取脚本绑定的计数器，不可读时为 `0.0`
pub trait ScriptHost: Send + Sync {
    fn persist(&self, value: f64);

    fn counter_value(&self) -> f64;
}

/// 脚本上下文计数，用于观察同一脚本同时存活的上下文数量
#[derive(Debug, Default)]
pub struct ContextGauge {
    live: AtomicUsize,
    peak: AtomicUsize,
    created: AtomicU64,
}

impl ContextGauge {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前存活的上下文数
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// 历史最大同时存活数
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// 累计创建的上下文数
    pub fn created(&self) -> u64 {
        self.created.load(Ordering::SeqCst)
    }

    fn enter(self: &Arc<Self>) -> ContextLease {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
        self.created.fetch_add(1, Ordering::SeqCst);
        ContextLease {
            gauge: Arc::clone(self),
        }
    }
}

struct ContextLease {
    gauge: Arc<ContextGauge>,
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.gauge.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// 单次执行的资源限制
#[derive(Debug, Clone, Default)]
pub struct SandboxLimits {
    pub execution_timeout: Option<Duration>,
    pub max_operations: Option<u64>,
}

impl From<&ScriptingConfig> for SandboxLimits {
    fn from(config: &ScriptingConfig) -> Self {
        Self {
            execution_timeout: config.execution_timeout(),
            max_operations: config.max_operations,
        }
    }
}

/// 一次性的脚本执行上下文
pub struct ScriptContext {
    script_name: String,
    engine: Engine,
    scope: Scope<'static>,
    _lease: ContextLease,
}

impl ScriptContext {
    pub fn new(
        script_name: &str,
        host: Arc<dyn ScriptHost>,
        limits: &SandboxLimits,
        gauge: &Arc<ContextGauge>,
    ) -> Self {
        let lease = gauge.enter();
        let mut engine = Engine::new();

        bind_host(&mut engine, host);

        if let Some(max_operations) = limits.max_operations {
            engine.set_max_operations(max_operations);
        }

        // 超时从上下文创建时开始计算，上下文只在执行前创建
        if let Some(timeout) = limits.execution_timeout {
            let deadline = Instant::now() + timeout;
            engine.on_progress(move |_| {
                if Instant::now() >= deadline {
                    Some(Dynamic::from("timeout"))
                } else {
                    None
                }
            });
        }

        let name = script_name.to_string();
        engine.on_print(move |text| debug!(script = %name, "{}", text));

        Self {
            script_name: script_name.to_string(),
            engine,
            scope: Scope::new(),
            _lease: lease,
        }
    }

    /// 编译并求值脚本，然后调用 `execute()`
    pub fn run(&mut self, source: &str) -> HostStatResult<()> {
        let ast = compile(&self.engine, &self.script_name, source)?;

        self.engine
            .run_ast_with_scope(&mut self.scope, &ast)
            .map_err(|e| self.runtime_error(&e))?;

        if !has_entry_point(&ast) {
            return Err(HostStatError::ScriptEntryPointMissing {
                name: self.script_name.clone(),
            });
        }

        let options = CallFnOptions::new().eval_ast(false);
        self.engine
            .call_fn_with_options::<Dynamic>(options, &mut self.scope, &ast, ENTRY_POINT, ())
            .map_err(|e| self.runtime_error(&e))?;

        Ok(())
    }

    fn runtime_error(&self, err: &EvalAltResult) -> HostStatError {
        match root_cause(err) {
            EvalAltResult::ErrorTerminated(..) => HostStatError::ScriptTimeout {
                name: self.script_name.clone(),
            },
            EvalAltResult::ErrorFunctionNotFound(signature, _)
                if signature.split_whitespace().next() == Some(ENTRY_POINT) =>
            {
                HostStatError::ScriptEntryPointMissing {
                    name: self.script_name.clone(),
                }
            }
            _ => HostStatError::ScriptRuntime {
                name: self.script_name.clone(),
                message: err.to_string(),
            },
        }
    }
}

fn bind_host(engine: &mut Engine, host: Arc<dyn ScriptHost>) {
    let persist_float = Arc::clone(&host);
    engine.register_fn("persist", move |value: f64| persist_float.persist(value));

    let persist_int = Arc::clone(&host);
    engine.register_fn("persist", move |value: i64| persist_int.persist(value as f64));

    engine.register_fn("getCounterValue", move || host.counter_value());
}

fn compile(engine: &Engine, script_name: &str, source: &str) -> HostStatResult<AST> {
    engine
        .compile(source)
        .map_err(|e| HostStatError::ScriptCompile {
            name: script_name.to_string(),
            message: e.to_string(),
        })
}

fn has_entry_point(ast: &AST) -> bool {
    ast.iter_functions()
        .any(|f| f.name == ENTRY_POINT && f.params.is_empty())
}

fn root_cause(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => root_cause(inner),
        other => other,
    }
}

/// 只做语法检查，不执行
pub fn check_syntax(script_name: &str, source: &str) -> HostStatResult<()> {
    compile(&Engine::new_raw(), script_name, source).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct TestHost {
        counter: f64,
        persisted: Mutex<Vec<f64>>,
    }

    impl TestHost {
        fn new(counter: f64) -> Arc<Self> {
            Arc::new(Self {
                counter,
                persisted: Mutex::new(Vec::new()),
            })
        }

        fn persisted(&self) -> Vec<f64> {
            self.persisted.lock().unwrap().clone()
        }
    }

    impl ScriptHost for TestHost {
        fn persist(&self, value: f64) {
            self.persisted.lock().unwrap().push(value);
        }

        fn counter_value(&self) -> f64 {
            self.counter
        }
    }

    fn run(source: &str, host: Arc<TestHost>, limits: &SandboxLimits) -> HostStatResult<()> {
        let gauge = Arc::new(ContextGauge::new());
        let mut context = ScriptContext::new("test_script", host, limits, &gauge);
        context.run(source)
    }

    #[test]
    fn test_host_functions_are_bound() {
        let host = TestHost::new(21.0);
        run(
            "fn execute() { persist(getCounterValue() * 2.0); persist(7); }",
            host.clone(),
            &SandboxLimits::default(),
        )
        .unwrap();

        assert_eq!(host.persisted(), vec![42.0, 7.0]);
    }

    #[test]
    fn test_top_level_statements_run_before_execute() {
        let host = TestHost::new(0.0);
        run(
            "persist(1.0);\nfn execute() { persist(2.0); }",
            host.clone(),
            &SandboxLimits::default(),
        )
        .unwrap();

        assert_eq!(host.persisted(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_parse_error() {
        let err = run("fn execute( {", TestHost::new(0.0), &SandboxLimits::default()).unwrap_err();
        assert!(matches!(err, HostStatError::ScriptCompile { ref name, .. } if name == "test_script"));
    }

    #[test]
    fn test_missing_entry_point() {
        let host = TestHost::new(0.0);
        let err = run("fn other() { persist(1.0); }", host.clone(), &SandboxLimits::default())
            .unwrap_err();
        assert!(matches!(err, HostStatError::ScriptEntryPointMissing { .. }));
        assert!(host.persisted().is_empty());
    }

    #[test]
    fn test_runtime_error_carries_script_name() {
        let err = run(
            r#"fn execute() { throw "counter exploded"; }"#,
            TestHost::new(0.0),
            &SandboxLimits::default(),
        )
        .unwrap_err();

        match err {
            HostStatError::ScriptRuntime { name, message } => {
                assert_eq!(name, "test_script");
                assert!(message.contains("counter exploded"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_terminates_script() {
        let limits = SandboxLimits {
            execution_timeout: Some(Duration::from_millis(50)),
            max_operations: None,
        };
        let started = Instant::now();
        let err = run("fn execute() { loop { } }", TestHost::new(0.0), &limits).unwrap_err();

        assert!(matches!(err, HostStatError::ScriptTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_operation_limit() {
        let limits = SandboxLimits {
            execution_timeout: None,
            max_operations: Some(1_000),
        };
        let err = run("fn execute() { loop { } }", TestHost::new(0.0), &limits).unwrap_err();
        assert!(matches!(err, HostStatError::ScriptRuntime { .. }));
    }

    #[test]
    fn test_context_gauge_tracks_lifetime() {
        let gauge = Arc::new(ContextGauge::new());
        {
            let _first = ScriptContext::new("a", TestHost::new(0.0), &SandboxLimits::default(), &gauge);
            assert_eq!(gauge.live(), 1);
            let _second =
                ScriptContext::new("a", TestHost::new(0.0), &SandboxLimits::default(), &gauge);
            assert_eq!(gauge.live(), 2);
        }
        assert_eq!(gauge.live(), 0);
        assert_eq!(gauge.peak(), 2);
        assert_eq!(gauge.created(), 2);
    }

    #[test]
    fn test_contexts_do_not_share_state() {
        let host = TestHost::new(0.0);
        let source = "let counter = if is_def_var(\"counter\") { counter + 1 } else { 1 };\nfn execute() {}";
        let gauge = Arc::new(ContextGauge::new());

        for _ in 0..2 {
            let mut context =
                ScriptContext::new("s", host.clone(), &SandboxLimits::default(), &gauge);
            context.run(source).unwrap();
            let value = context.scope.get_value::<i64>("counter");
            assert_eq!(value, Some(1));
        }
    }

    #[test]
    fn test_check_syntax() {
        assert!(check_syntax("ok", "fn execute() { persist(1.0); }").is_ok());
        assert!(matches!(
            check_syntax("bad", "fn execute() {"),
            Err(HostStatError::ScriptCompile { .. })
        ));
    }
}
