//! Opcode-level execution observers: a structured in-memory collector and a
//! JSON-per-line streamer, both fed by the dispatch loop.

use std::collections::BTreeMap;
use std::io::Write;
use std::time::Duration;

use serde::Serialize;

use crate::opcodes::Opcode;

/// Which heavy fields step records carry.
#[derive(Debug, Clone, Copy, Default)]
pub struct TraceConfig {
    pub disable_memory: bool,
    pub disable_stack: bool,
    pub disable_storage: bool,
}

/// One executed opcode. Stack is rendered top-last; memory as one hex
/// string.
#[derive(Debug, Clone, Serialize)]
pub struct StructLog {
    pub pc: u64,
    pub op: u8,
    pub gas: u64,
    #[serde(rename = "gasCost")]
    pub gas_cost: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<String, String>>,
    pub depth: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub err: Option<String>,
}

/// The frame-termination record.
#[derive(Debug, Clone, Serialize)]
pub struct EndLog {
    pub output: String,
    #[serde(rename = "gasUsed")]
    pub gas_used: String,
    /// Wall-clock execution time in nanoseconds.
    pub time: u128,
}

/// Observer of execution. The interpreter invokes [`Tracer::capture_state`]
/// once per executed opcode and [`Tracer::capture_end`] when the outermost
/// frame terminates. Pure observation: tracers never mutate the machine.
pub trait Tracer {
    /// Disabled tracers skip snapshot construction entirely.
    fn enabled(&self) -> bool {
        true
    }

    fn config(&self) -> TraceConfig {
        TraceConfig::default()
    }

    fn capture_state(&mut self, log: StructLog);

    fn capture_end(&mut self, output: &[u8], gas_used: u64, time: Duration);
}

/// The tracer used when tracing is not wanted.
pub struct NoOpTracer;

impl Tracer for NoOpTracer {
    fn enabled(&self) -> bool {
        false
    }

    fn capture_state(&mut self, _log: StructLog) {}

    fn capture_end(&mut self, _output: &[u8], _gas_used: u64, _time: Duration) {}
}

/// Collects step records in memory; `--debug` renders them afterwards.
pub struct StructLogger {
    config: TraceConfig,
    pub logs: Vec<StructLog>,
    pub output: Vec<u8>,
    pub gas_used: u64,
    pub time: Duration,
    /// Storage writes observed so far, keyed for the step records.
    storage: BTreeMap<String, String>,
}

impl StructLogger {
    pub fn new(config: TraceConfig) -> Self {
        StructLogger {
            config,
            logs: Vec::new(),
            output: Vec::new(),
            gas_used: 0,
            time: Duration::ZERO,
            storage: BTreeMap::new(),
        }
    }

    /// Renders the collected trace in a human-readable layout.
    pub fn write_trace(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        for log in &self.logs {
            write!(
                writer,
                "{:<14} pc={:05} gas={} cost={}",
                Opcode::from(log.op).to_string(),
                log.pc,
                log.gas,
                log.gas_cost
            )?;
            if let Some(err) = &log.err {
                write!(writer, " err={err}")?;
            }
            writeln!(writer)?;
            if let Some(stack) = &log.stack {
                for (i, value) in stack.iter().rev().enumerate() {
                    writeln!(writer, "  stack[{i}] {value}")?;
                }
            }
        }
        writeln!(
            writer,
            "output: 0x{} gasUsed: {} time: {:?}",
            hex::encode(&self.output),
            self.gas_used,
            self.time
        )
    }
}

impl Tracer for StructLogger {
    fn config(&self) -> TraceConfig {
        self.config
    }

    fn capture_state(&mut self, mut log: StructLog) {
        // SSTORE's operands are on the stack snapshot; mirror them into the
        // per-contract storage view.
        if log.op == Opcode::SSTORE as u8 {
            if let Some(stack) = &log.stack {
                if stack.len() >= 2 {
                    let key = stack[stack.len() - 1].clone();
                    let value = stack[stack.len() - 2].clone();
                    self.storage.insert(key, value);
                }
            }
        }
        if !self.config.disable_storage {
            log.storage = Some(self.storage.clone());
        }
        self.logs.push(log);
    }

    fn capture_end(&mut self, output: &[u8], gas_used: u64, time: Duration) {
        self.output = output.to_vec();
        self.gas_used = gas_used;
        self.time = time;
    }
}

/// Streams each step as one JSON line, geth's machine-readable format. The
/// final end record carries output, gas used and wall time.
pub struct JsonLogger<W: Write> {
    config: TraceConfig,
    writer: W,
}

impl<W: Write> JsonLogger<W> {
    pub fn new(writer: W, config: TraceConfig) -> Self {
        JsonLogger { config, writer }
    }
}

impl<W: Write> Tracer for JsonLogger<W> {
    fn config(&self) -> TraceConfig {
        self.config
    }

    fn capture_state(&mut self, log: StructLog) {
        if let Ok(line) = serde_json::to_string(&log) {
            let _ = writeln!(self.writer, "{line}");
        }
    }

    fn capture_end(&mut self, output: &[u8], gas_used: u64, time: Duration) {
        let end = EndLog {
            output: format!("0x{}", hex::encode(output)),
            gas_used: format!("{gas_used:#x}"),
            time: time.as_nanos(),
        };
        if let Ok(line) = serde_json::to_string(&end) {
            let _ = writeln!(self.writer, "{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(op: u8, stack: Option<Vec<String>>) -> StructLog {
        StructLog {
            pc: 0,
            op,
            gas: 100,
            gas_cost: 3,
            memory: None,
            stack,
            storage: None,
            depth: 1,
            err: None,
        }
    }

    #[test]
    fn json_lines_use_the_trace_field_names() {
        let mut buffer = Vec::new();
        {
            let mut logger = JsonLogger::new(&mut buffer, TraceConfig::default());
            logger.capture_state(step(0x01, Some(vec!["0x3".into(), "0x5".into()])));
            logger.capture_end(&[0x08], 9, Duration::from_micros(5));
        }
        let text = String::from_utf8(buffer).unwrap();
        let mut lines = text.lines();
        let first: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(first["op"], 1);
        assert_eq!(first["gasCost"], 3);
        assert_eq!(first["stack"][1], "0x5");
        assert!(first.get("memory").is_none());
        let last: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(last["output"], "0x08");
        assert_eq!(last["gasUsed"], "0x9");
    }

    #[test]
    fn struct_logger_tracks_sstore_writes() {
        let mut logger = StructLogger::new(TraceConfig::default());
        logger.capture_state(step(
            Opcode::SSTORE as u8,
            Some(vec!["0x10".into(), "0x1".into()]),
        ));
        let storage = logger.logs[0].storage.as_ref().unwrap();
        assert_eq!(storage.get("0x1"), Some(&"0x10".to_string()));
    }
}
