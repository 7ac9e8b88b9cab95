//! In-memory implementations of the storage, counter and tick traits
//!
//! These let the script engine and the collection scheduler be tested
//! without a SQLite file or real host counters.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Instant;

use async_trait::async_trait;
use hoststat_core::models::{
    AggregateSummary, Epoch, MetricSample, SampleValue, ScriptDefinition, TableSchema,
};
use hoststat_core::traits::{
    CounterHandle, CounterProvider, MetricSource, MetricStore, ScriptRepository, TickProcessor,
};
use hoststat_core::{HostStatError, HostStatResult};
use hoststat_worker::current_worker;
use serde_json::{Map, Value};

/// Mock implementation of ScriptRepository for testing
#[derive(Debug, Clone, Default)]
pub struct InMemoryScriptRepository {
    scripts: Arc<Mutex<BTreeMap<String, ScriptDefinition>>>,
}

impl InMemoryScriptRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scripts(scripts: Vec<ScriptDefinition>) -> Self {
        let repository = Self::new();
        {
            let mut map = repository.scripts.lock().unwrap();
            for script in scripts {
                map.insert(script.name.clone(), script);
            }
        }
        repository
    }

    pub fn count(&self) -> usize {
        self.scripts.lock().unwrap().len()
    }

    pub fn get(&self, name: &str) -> Option<ScriptDefinition> {
        self.scripts.lock().unwrap().get(name).cloned()
    }
}

#[async_trait]
impl ScriptRepository for InMemoryScriptRepository {
    async fn list(&self) -> HostStatResult<Vec<ScriptDefinition>> {
        Ok(self.scripts.lock().unwrap().values().cloned().collect())
    }

    async fn find_by_name(&self, name: &str) -> HostStatResult<Option<ScriptDefinition>> {
        Ok(self.get(name))
    }

    async fn create(&self, definition: &ScriptDefinition) -> HostStatResult<()> {
        let mut scripts = self.scripts.lock().unwrap();
        if scripts.contains_key(&definition.name) {
            return Err(HostStatError::ScriptAlreadyExists {
                name: definition.name.clone(),
            });
        }
        scripts.insert(definition.name.clone(), definition.clone());
        Ok(())
    }

    async fn update(&self, definition: &ScriptDefinition) -> HostStatResult<bool> {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(&definition.name) {
            Some(existing) => {
                *existing = definition.clone();
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete(&self, name: &str) -> HostStatResult<bool> {
        Ok(self.scripts.lock().unwrap().remove(name).is_some())
    }
}

/// Mock implementation of MetricStore that keeps every sample per table
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricStore {
    tables: Arc<Mutex<HashMap<String, Vec<MetricSample>>>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All samples written to `table`, oldest first
    pub fn samples(&self, table: &str) -> Vec<MetricSample> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, table: &str) -> usize {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.lock().unwrap().contains_key(table)
    }

    /// `(script_name, epoch, value)` rows written to `script_data`
    pub fn script_values(&self) -> Vec<(String, u64, f64)> {
        self.samples("script_data")
            .into_iter()
            .filter_map(|sample| {
                let name = match sample.values.get("script_name") {
                    Some(SampleValue::Text(name)) => name.clone(),
                    _ => return None,
                };
                let value = match sample.values.get("value") {
                    Some(SampleValue::Real(v)) => *v,
                    Some(SampleValue::Integer(v)) => *v as f64,
                    _ => return None,
                };
                Some((name, sample.epoch.value(), value))
            })
            .collect()
    }
}

fn sample_to_json(schema: &TableSchema, id: usize, sample: &MetricSample) -> Value {
    let mut object = Map::new();
    object.insert("id".to_string(), Value::from(id as i64));
    object.insert("epoch".to_string(), Value::from(sample.epoch.as_i64()));
    for column in schema.columns {
        let value = match sample.value_for(column) {
            SampleValue::Integer(v) => Value::from(v),
            SampleValue::Real(v) => Value::from(v),
            SampleValue::Text(v) => Value::from(v),
        };
        object.insert(column.name.to_string(), value);
    }
    object.insert("timestamp".to_string(), Value::from(sample.timestamp));
    Value::Object(object)
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn ensure_table(&self, schema: &TableSchema) -> HostStatResult<()> {
        self.tables
            .lock()
            .unwrap()
            .entry(schema.table.to_string())
            .or_default();
        Ok(())
    }

    async fn insert_sample(
        &self,
        schema: &TableSchema,
        sample: &MetricSample,
    ) -> HostStatResult<i64> {
        if let Some(column) = sample.unknown_columns(schema).first() {
            return Err(HostStatError::InvalidColumn {
                table: schema.table.to_string(),
                column: column.to_string(),
            });
        }

        let mut tables = self.tables.lock().unwrap();
        let rows = tables.entry(schema.table.to_string()).or_default();
        rows.push(sample.clone());
        Ok(rows.len() as i64)
    }

    async fn recent_samples(&self, schema: &TableSchema, limit: u32) -> HostStatResult<Vec<Value>> {
        let rows = self.samples(schema.table);
        Ok(rows
            .iter()
            .enumerate()
            .rev()
            .take(limit as usize)
            .map(|(index, sample)| sample_to_json(schema, index + 1, sample))
            .collect())
    }

    async fn aggregate(&self, schema: &TableSchema, column: &str) -> HostStatResult<AggregateSummary> {
        let column = schema.numeric_column(column)?;
        let values: Vec<f64> = self
            .samples(schema.table)
            .iter()
            .filter_map(|sample| match sample.value_for(column) {
                SampleValue::Real(v) => Some(v),
                SampleValue::Integer(v) => Some(v as f64),
                SampleValue::Text(_) => None,
            })
            .collect();

        if values.is_empty() {
            return Ok(AggregateSummary::default());
        }

        let total: f64 = values.iter().sum();
        Ok(AggregateSummary {
            max: values.iter().copied().reduce(f64::max),
            min: values.iter().copied().reduce(f64::min),
            avg: Some(total / values.len() as f64),
            total,
            count: values.len() as i64,
        })
    }
}

/// Holds counter reads until opened
///
/// A script that reads a gated counter stays inside its run, with its
/// context alive, until the test calls [`CounterGate::open`].
#[derive(Debug, Clone, Default)]
pub struct CounterGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    arrivals: usize,
}

impl CounterGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Release every blocked and future read
    pub fn open(&self) {
        let (state, wakeup) = &*self.inner;
        state.lock().unwrap_or_else(PoisonError::into_inner).open = true;
        wakeup.notify_all();
    }

    /// Number of reads that reached the gate so far
    pub fn arrivals(&self) -> usize {
        self.inner
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .arrivals
    }

    fn pass(&self) {
        let (state, wakeup) = &*self.inner;
        let mut state = state.lock().unwrap_or_else(PoisonError::into_inner);
        state.arrivals += 1;
        while !state.open {
            state = wakeup.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }
}

#[derive(Debug, Clone)]
struct Reading {
    value: Option<f64>,
    gate: Option<CounterGate>,
}

/// Counter returning a fixed reading, or nothing when `value` is `None`
#[derive(Debug, Clone)]
pub struct FixedCounter {
    path: String,
    reading: Reading,
}

impl CounterHandle for FixedCounter {
    fn path(&self) -> &str {
        &self.path
    }

    fn sample(&mut self) -> Option<f64> {
        if let Some(gate) = &self.reading.gate {
            gate.pass();
        }
        self.reading.value
    }
}

/// Mock implementation of CounterProvider with a preset table of readings
///
/// Paths that were never registered fail to open with `CounterUnavailable`.
#[derive(Debug, Clone, Default)]
pub struct FixedCounterProvider {
    readings: Arc<Mutex<HashMap<String, Reading>>>,
}

impl FixedCounterProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_counter(self, path: &str, value: f64) -> Self {
        self.set(path, Some(value));
        self
    }

    /// Register a counter that opens fine but never yields a reading
    pub fn with_unreadable_counter(self, path: &str) -> Self {
        self.set(path, None);
        self
    }

    /// Register a counter whose reads wait on `gate`
    pub fn with_gated_counter(self, path: &str, value: f64, gate: &CounterGate) -> Self {
        self.insert(
            path,
            Reading {
                value: Some(value),
                gate: Some(gate.clone()),
            },
        );
        self
    }

    pub fn set(&self, path: &str, value: Option<f64>) {
        self.insert(path, Reading { value, gate: None });
    }

    fn insert(&self, path: &str, reading: Reading) {
        self.readings
            .lock()
            .unwrap()
            .insert(path.to_string(), reading);
    }
}

impl CounterProvider for FixedCounterProvider {
    fn open(&self, path: &str) -> HostStatResult<Box<dyn CounterHandle>> {
        match self.readings.lock().unwrap().get(path) {
            Some(reading) => Ok(Box::new(FixedCounter {
                path: path.to_string(),
                reading: reading.clone(),
            })),
            None => Err(HostStatError::CounterUnavailable {
                path: path.to_string(),
                message: "no such counter".to_string(),
            }),
        }
    }
}

/// Records every epoch it is asked to process
#[derive(Debug, Clone)]
pub struct RecordingTickProcessor {
    name: String,
    calls: Arc<Mutex<Vec<(Epoch, Option<usize>, Instant)>>>,
    fail: bool,
}

impl RecordingTickProcessor {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    /// A processor that records the call and then returns an error
    pub fn failing(name: &str) -> Self {
        Self {
            fail: true,
            ..Self::new(name)
        }
    }

    pub fn epochs(&self) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(epoch, _, _)| epoch.value())
            .collect()
    }

    /// Worker index each call ran on
    pub fn workers(&self) -> Vec<Option<usize>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, worker, _)| *worker)
            .collect()
    }

    pub fn instants(&self) -> Vec<Instant> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, _, at)| *at)
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl TickProcessor for RecordingTickProcessor {
    fn name(&self) -> &str {
        &self.name
    }

    async fn process(&self, epoch: Epoch) -> HostStatResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push((epoch, current_worker(), Instant::now()));
        if self.fail {
            return Err(HostStatError::Internal(format!(
                "{} failed at epoch {}",
                self.name, epoch
            )));
        }
        Ok(())
    }
}

/// Metric source that records the epochs it was asked to retrieve
#[derive(Debug, Clone)]
pub struct RecordingMetricSource {
    name: String,
    schema: &'static TableSchema,
    calls: Arc<Mutex<Vec<(Epoch, Option<usize>)>>>,
    fail: bool,
}

impl RecordingMetricSource {
    pub fn new(name: &str, schema: &'static TableSchema) -> Self {
        Self {
            name: name.to_string(),
            schema,
            calls: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing(name: &str, schema: &'static TableSchema) -> Self {
        Self {
            fail: true,
            ..Self::new(name, schema)
        }
    }

    pub fn epochs(&self) -> Vec<u64> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(epoch, _)| epoch.value())
            .collect()
    }

    pub fn workers(&self) -> Vec<Option<usize>> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, worker)| *worker)
            .collect()
    }
}

#[async_trait]
impl MetricSource for RecordingMetricSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &TableSchema {
        self.schema
    }

    async fn initialize(&self) -> HostStatResult<()> {
        Ok(())
    }

    async fn retrieve(&self, epoch: Epoch) -> HostStatResult<()> {
        self.calls.lock().unwrap().push((epoch, current_worker()));
        if self.fail {
            return Err(HostStatError::Internal(format!("{} unavailable", self.name)));
        }
        Ok(())
    }

    async fn data_as_json(&self, limit: u32) -> HostStatResult<Vec<Value>> {
        Ok(self
            .epochs()
            .into_iter()
            .rev()
            .take(limit as usize)
            .map(|epoch| serde_json::json!({ "epoch": epoch }))
            .collect())
    }

    async fn aggregate_as_json(&self, column: &str) -> HostStatResult<AggregateSummary> {
        self.schema.numeric_column(column)?;
        Ok(AggregateSummary {
            count: self.calls.lock().unwrap().len() as i64,
            ..AggregateSummary::default()
        })
    }
}
