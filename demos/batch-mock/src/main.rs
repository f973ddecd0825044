//! Run a batch of circuits through the job manager against an in-memory
//! backend that accepts at most four experiments per job.
//!
//! Set `RUST_LOG=hal_jobmanager=debug` to watch each job being submitted.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hal_jobmanager::{
    Assembler, Backend, Capabilities, Counts, ExecutionResult, Experiment, ExperimentKind,
    ExperimentRange, HalError, HalResult, JobId, JobManager, JobResult, JobStatus, PassThrough,
    RunOptions, SubJob,
};
use tracing_subscriber::EnvFilter;

/// A simple circuit type for demonstration.
#[derive(Clone)]
struct SimpleCircuit {
    num_qubits: u32,
    shift: u32,
}

impl Experiment for SimpleCircuit {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::Circuit
    }
}

/// Assembled job payload.
#[derive(Debug, Clone)]
struct Payload {
    circuits: Vec<(u32, u32)>,
    shots: u32,
}

struct PayloadAssembler;

impl Assembler<MockBackend> for PayloadAssembler {
    fn assemble(
        &self,
        experiments: &[SimpleCircuit],
        backend: &MockBackend,
        shots: u32,
    ) -> HalResult<Payload> {
        if shots == 0 || shots > backend.capabilities.max_shots {
            return Err(HalError::InvalidShots(format!(
                "shots must be 1..={}",
                backend.capabilities.max_shots
            )));
        }
        Ok(Payload {
            circuits: experiments.iter().map(|c| (c.num_qubits, c.shift)).collect(),
            shots,
        })
    }
}

/// In-memory backend; every job completes immediately.
struct MockBackend {
    capabilities: Capabilities,
    next_id: AtomicU64,
}

impl MockBackend {
    fn new() -> Self {
        Self {
            capabilities: Capabilities::simulator().with_max_experiments(4),
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl Backend for MockBackend {
    type Experiment = SimpleCircuit;
    type Payload = Payload;
    type Job = MockJob;

    fn name(&self) -> &str {
        "mock-simulator"
    }

    fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    async fn submit(
        &self,
        payload: Payload,
        name: Option<String>,
        range: ExperimentRange,
    ) -> HalResult<MockJob> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(MockJob {
            id: JobId::new(format!("mock-{id}")),
            name,
            range,
            payload,
            status: Mutex::new(JobStatus::Completed),
        })
    }
}

struct MockJob {
    id: JobId,
    name: Option<String>,
    range: ExperimentRange,
    payload: Payload,
    status: Mutex<JobStatus>,
}

#[async_trait]
impl SubJob for MockJob {
    type Payload = Payload;

    fn job_id(&self) -> &JobId {
        &self.id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn index_range(&self) -> ExperimentRange {
        self.range
    }

    fn payload(&self) -> &Payload {
        &self.payload
    }

    async fn status(&self) -> HalResult<JobStatus> {
        Ok(*self.status.lock().unwrap())
    }

    async fn result(&self, _timeout: Option<Duration>) -> HalResult<JobResult> {
        let shots = self.payload.shots;
        let experiments = self
            .payload
            .circuits
            .iter()
            .map(|&(num_qubits, shift)| {
                // Deterministic split between |0..0> and |1..1>.
                let zeros = u64::from(shots / 2 + shift.min(shots / 2));
                let mut counts = Counts::new();
                counts.insert("0".repeat(num_qubits as usize), zeros);
                counts.insert("1".repeat(num_qubits as usize), u64::from(shots) - zeros);
                ExecutionResult::new(counts, shots)
            })
            .collect();
        Ok(JobResult::new(self.id.clone(), "mock-simulator", experiments))
    }

    async fn cancel(&self) -> HalResult<()> {
        let mut status = self.status.lock().unwrap();
        if !status.is_terminal() {
            *status = JobStatus::Cancelled;
        }
        Ok(())
    }

    async fn error_message(&self) -> HalResult<String> {
        Err(HalError::JobQuery(format!("job {} has not failed", self.id)))
    }

    async fn queue_position(&self) -> HalResult<Option<u32>> {
        Ok(None)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let backend = Arc::new(MockBackend::new());
    let manager: JobManager<MockBackend> =
        JobManager::new(Arc::new(PassThrough), Arc::new(PayloadAssembler));

    let circuits: Vec<_> = (0..10)
        .map(|shift| SimpleCircuit {
            num_qubits: 2,
            shift: shift * 10,
        })
        .collect();

    let options = RunOptions::default().with_name_prefix("demo").with_shots(1000);
    let expected = manager.run(circuits, backend, &options).await?;
    println!("Submitting {expected} jobs");

    manager.submission().await?;
    println!("{}", manager.report(true).await?);
    println!();

    let results = manager.result(Some(Duration::from_secs(30))).await?;
    for (job, result) in manager.jobs().await?.iter().zip(results) {
        let Some(result) = result else {
            println!("{}: no result", job.job_id());
            continue;
        };
        println!("{} (experiments {}):", job.job_id(), job.index_range());
        for exp in &result.experiments {
            println!("  00: {:>4}  11: {:>4}", exp.counts.get("00"), exp.counts.get("11"));
        }
    }

    if let Some(errors) = manager.error_message().await? {
        println!("\nErrors:\n{errors}");
    }

    Ok(())
}
