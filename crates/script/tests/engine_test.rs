#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use hoststat_core::{
        config::{ScriptingConfig, WorkerPoolConfig},
        models::{Epoch, ScriptDefinition},
        traits::ScriptRepository,
        HostStatError,
    };
    use hoststat_script::ScriptEngine;
    use hoststat_testing_utils::{
        CounterGate, FixedCounterProvider, InMemoryMetricStore, InMemoryScriptRepository, TestEnv,
        TestScripts,
    };
    use hoststat_worker::WorkerPool;

    const WAIT: Duration = Duration::from_secs(5);
    const PROMPT: Duration = Duration::from_secs(1);

    /// 读取该计数器的脚本会停在执行中，直到 `gate` 打开
    const GATED_COUNTER: &str = "load/one";

    struct Harness {
        engine: ScriptEngine,
        repository: InMemoryScriptRepository,
        store: InMemoryMetricStore,
        pool: Arc<WorkerPool>,
        gate: CounterGate,
    }

    impl Drop for Harness {
        fn drop(&mut self) {
            // 断言失败时也要放行阻塞的脚本线程
            self.gate.open();
        }
    }

    impl Harness {
        async fn new(config: ScriptingConfig) -> Self {
            Self::with_repository(InMemoryScriptRepository::new(), config).await
        }

        async fn with_repository(
            repository: InMemoryScriptRepository,
            config: ScriptingConfig,
        ) -> Self {
            let store = InMemoryMetricStore::new();
            let gate = CounterGate::new();
            let counters = FixedCounterProvider::new()
                .with_gated_counter(GATED_COUNTER, 5.0, &gate)
                .with_counter("cpu/usage", 21.0)
                .with_counter("memory/available", 1024.0)
                .with_unreadable_counter("disk[/missing]/used");
            let pool = Arc::new(
                WorkerPool::start(&WorkerPoolConfig {
                    pool_size: 4,
                    reserved_workers: 1,
                })
                .unwrap(),
            );
            let engine = ScriptEngine::new(
                Arc::new(repository.clone()),
                Arc::new(store.clone()),
                Arc::new(counters),
                pool.clone(),
                &config,
            );
            engine.register_all().await.unwrap();

            Self {
                engine,
                repository,
                store,
                pool,
                gate,
            }
        }

        /// 等到 `count` 次门控读取进入执行
        async fn wait_for_gated_reads(&self, count: usize) -> bool {
            let gate = self.gate.clone();
            TestEnv::wait_for(move || gate.arrivals() >= count, WAIT).await
        }

        async fn wait_for_values(&self, count: usize) -> bool {
            let store = self.store.clone();
            TestEnv::wait_for(move || store.script_values().len() >= count, WAIT).await
        }

        fn values_for(&self, name: &str) -> Vec<(u64, f64)> {
            self.store
                .script_values()
                .into_iter()
                .filter(|(script, _, _)| script == name)
                .map(|(_, epoch, value)| (epoch, value))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_script_persists_scaled_counter_with_epoch() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::scaling("doubler", "cpu/usage", 2.0))
            .await
            .unwrap();

        assert_eq!(h.engine.process(Epoch(7)).await.unwrap(), 1);
        assert!(h.wait_for_values(1).await);
        assert_eq!(h.values_for("doubler"), vec![(7, 42.0)]);

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_save_update_and_list() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::constant("mem", "cpu/usage", 1.0))
            .await
            .unwrap();
        h.engine
            .update(
                "mem",
                "fn execute() { persist(getCounterValue()); }".to_string(),
                "memory/available".to_string(),
            )
            .await
            .unwrap();

        let listed = h.engine.list_as_json().await.unwrap();
        let scripts = listed["scripts"].as_array().unwrap();
        assert_eq!(scripts.len(), 1);
        assert_eq!(scripts[0]["name"], "mem");
        assert_eq!(scripts[0]["counterPath"], "memory/available");
        assert_eq!(
            scripts[0]["sourceText"],
            "fn execute() { persist(getCounterValue()); }"
        );

        h.engine.process(Epoch(1)).await.unwrap();
        assert!(h.wait_for_values(1).await);
        assert_eq!(h.values_for("mem"), vec![(1, 1024.0)]);

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_duplicate_save_rejected_and_original_kept() {
        let h = Harness::new(ScriptingConfig::default()).await;
        let original = TestScripts::constant("dup", "cpu/usage", 1.0);
        h.engine.save(original.clone()).await.unwrap();

        let err = h
            .engine
            .save(TestScripts::constant("dup", "memory/available", 2.0))
            .await
            .unwrap_err();

        assert!(matches!(err, HostStatError::ScriptAlreadyExists { ref name } if name == "dup"));
        assert_eq!(h.repository.get("dup"), Some(original));
        assert_eq!(h.engine.registered_names().await, vec!["dup".to_string()]);

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_save_rejects_parse_error_and_unknown_counter() {
        let h = Harness::new(ScriptingConfig::default()).await;

        let err = h
            .engine
            .save(ScriptDefinition::new("broken", "fn execute( {", "cpu/usage"))
            .await
            .unwrap_err();
        assert!(matches!(err, HostStatError::ScriptCompile { .. }));

        let err = h
            .engine
            .save(TestScripts::constant("nowhere", "gpu/usage", 1.0))
            .await
            .unwrap_err();
        assert!(matches!(err, HostStatError::CounterUnavailable { .. }));

        assert_eq!(h.repository.count(), 0);
        assert!(h.engine.registered_names().await.is_empty());

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_delete_removes_script_from_fan_out() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::constant("a", "cpu/usage", 1.0))
            .await
            .unwrap();
        h.engine
            .save(TestScripts::constant("b", "cpu/usage", 2.0))
            .await
            .unwrap();

        h.engine.delete("a").await.unwrap();
        assert_eq!(h.repository.count(), 1);
        assert_eq!(h.engine.process(Epoch(3)).await.unwrap(), 1);
        assert!(h.wait_for_values(1).await);
        assert!(h.values_for("a").is_empty());

        assert!(matches!(
            h.engine.delete("a").await,
            Err(HostStatError::ScriptNotFound { .. })
        ));
        assert!(matches!(
            h.engine
                .update("a", "fn execute() {}".to_string(), "cpu/usage".to_string())
                .await,
            Err(HostStatError::ScriptNotFound { .. })
        ));

        h.pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_delete_while_script_runs() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::scaling("held", GATED_COUNTER, 1.0))
            .await
            .unwrap();
        h.engine
            .save(TestScripts::constant("steady", "cpu/usage", 2.0))
            .await
            .unwrap();

        assert_eq!(h.engine.process(Epoch(1)).await.unwrap(), 2);
        assert!(h.wait_for_gated_reads(1).await);
        let gauge = h.engine.context_gauge("held").await.unwrap();
        assert_eq!(gauge.live(), 1);

        tokio::time::timeout(PROMPT, h.engine.delete("held"))
            .await
            .expect("delete must not wait for the running script")
            .unwrap();
        assert_eq!(h.repository.count(), 1);
        assert_eq!(h.engine.registered_names().await, vec!["steady".to_string()]);

        // 删除之后开始的周期看不到该脚本
        assert_eq!(h.engine.process(Epoch(2)).await.unwrap(), 1);

        h.gate.open();
        assert!(h.wait_for_values(3).await);
        // 删除前已开始的执行照常完成并写入
        assert_eq!(h.values_for("held"), vec![(1, 5.0)]);
        assert_eq!(gauge.live(), 0);

        let mut steady: Vec<u64> = h.values_for("steady").into_iter().map(|(e, _)| e).collect();
        steady.sort();
        assert_eq!(steady, vec![1, 2]);

        h.pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_update_while_script_runs_keeps_registry_available() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::scaling("held", GATED_COUNTER, 1.0))
            .await
            .unwrap();
        h.engine
            .save(TestScripts::constant("steady", "cpu/usage", 2.0))
            .await
            .unwrap();

        assert_eq!(h.engine.process(Epoch(1)).await.unwrap(), 2);
        assert!(h.wait_for_gated_reads(1).await);

        tokio::time::timeout(
            PROMPT,
            h.engine.update(
                "held",
                "fn execute() { persist(100.0); }".to_string(),
                "cpu/usage".to_string(),
            ),
        )
        .await
        .expect("update must not wait for the running script")
        .unwrap();

        // 其他脚本的增删与下一个周期的投递都不受影响
        tokio::time::timeout(
            PROMPT,
            h.engine.save(TestScripts::constant("other", "cpu/usage", 3.0)),
        )
        .await
        .expect("save must not wait for the running script")
        .unwrap();
        let submitted = tokio::time::timeout(PROMPT, h.engine.process(Epoch(2)))
            .await
            .expect("process must not wait for the running script")
            .unwrap();
        assert_eq!(submitted, 3);

        let gauge = h.engine.context_gauge("held").await.unwrap();
        assert_eq!(gauge.live(), 1);

        h.gate.open();
        assert!(h.wait_for_values(5).await);

        // 旧执行用旧内容完成，下一个周期使用新内容
        let mut held = h.values_for("held");
        held.sort_by_key(|(epoch, _)| *epoch);
        assert_eq!(held, vec![(1, 5.0), (2, 100.0)]);
        assert_eq!(gauge.peak(), 1);
        assert_eq!(h.values_for("other"), vec![(2, 3.0)]);
        assert_eq!(
            h.repository.get("held").unwrap().source_text,
            "fn execute() { persist(100.0); }"
        );

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_failing_scripts_do_not_affect_others() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::throwing("thrower", "cpu/usage"))
            .await
            .unwrap();
        h.engine
            .save(ScriptDefinition::new(
                "no_entry",
                "fn other() { persist(99.0); }",
                "cpu/usage",
            ))
            .await
            .unwrap();
        for name in ["one", "two", "three"] {
            h.engine
                .save(TestScripts::constant(name, "cpu/usage", 5.0))
                .await
                .unwrap();
        }

        assert_eq!(h.engine.process(Epoch(1)).await.unwrap(), 5);
        assert!(h.wait_for_values(3).await);

        // 等待失败的脚本也执行完毕
        let engine = &h.engine;
        for name in ["thrower", "no_entry"] {
            let gauge = engine.context_gauge(name).await.unwrap();
            assert!(
                TestEnv::wait_for(|| gauge.created() == 1 && gauge.live() == 0, WAIT).await
            );
        }

        let mut persisted: Vec<String> = h
            .store
            .script_values()
            .into_iter()
            .map(|(name, _, _)| name)
            .collect();
        persisted.sort();
        assert_eq!(persisted, vec!["one", "three", "two"]);

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_unreadable_counter_reads_as_zero() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(ScriptDefinition::new(
                "zero",
                "fn execute() { persist(getCounterValue() + 1.0); }",
                "disk[/missing]/used",
            ))
            .await
            .unwrap();

        h.engine.process(Epoch(2)).await.unwrap();
        assert!(h.wait_for_values(1).await);
        assert_eq!(h.values_for("zero"), vec![(2, 1.0)]);

        h.pool.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_at_most_one_context_per_script() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::busy("slow", "cpu/usage", 20_000))
            .await
            .unwrap();

        for epoch in 1..=6 {
            h.engine.process(Epoch(epoch)).await.unwrap();
        }
        assert!(h.wait_for_values(6).await);

        let gauge = h.engine.context_gauge("slow").await.unwrap();
        assert_eq!(gauge.created(), 6);
        assert_eq!(gauge.peak(), 1);
        assert_eq!(gauge.live(), 0);

        let mut epochs: Vec<u64> = h.values_for("slow").into_iter().map(|(e, _)| e).collect();
        epochs.sort();
        assert_eq!(epochs, vec![1, 2, 3, 4, 5, 6]);

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_runaway_script_times_out() {
        let config = ScriptingConfig {
            execution_timeout_ms: Some(50),
            ..ScriptingConfig::default()
        };
        let h = Harness::new(config).await;
        h.engine
            .save(ScriptDefinition::new(
                "runaway",
                "fn execute() { persist(1.0); loop { } }",
                "cpu/usage",
            ))
            .await
            .unwrap();

        h.engine.process(Epoch(1)).await.unwrap();

        let gauge = h.engine.context_gauge("runaway").await.unwrap();
        assert!(TestEnv::wait_for(|| gauge.created() == 1 && gauge.live() == 0, WAIT).await);
        // 超时前写入的值仍然保留
        assert!(h.wait_for_values(1).await);
        assert_eq!(h.values_for("runaway"), vec![(1, 1.0)]);

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_register_all_loads_persisted_scripts() {
        let repository = InMemoryScriptRepository::with_scripts(vec![
            TestScripts::constant("kept", "cpu/usage", 1.0),
            TestScripts::constant("orphan", "gpu/usage", 1.0),
        ]);
        let h = Harness::with_repository(repository, ScriptingConfig::default()).await;

        assert_eq!(h.engine.registered_names().await, vec!["kept".to_string()]);
        assert!(h.store.has_table("script_data"));
        // 无法注册的脚本仍保留在仓库中
        assert!(h.repository.find_by_name("orphan").await.unwrap().is_some());

        h.pool.shutdown().await;
    }

    #[tokio::test]
    async fn test_stopped_engine_skips_work() {
        let h = Harness::new(ScriptingConfig::default()).await;
        h.engine
            .save(TestScripts::constant("idle", "cpu/usage", 1.0))
            .await
            .unwrap();

        h.engine.stop();
        assert!(h.engine.is_stopping());
        assert_eq!(h.engine.process(Epoch(1)).await.unwrap(), 0);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.store.script_values().is_empty());

        h.pool.shutdown().await;
    }
}
